//! Event loop lifecycle: run, spawn ordering, shutdown, stalls, failure
//! isolation and the unobserved-failure hook.

mod common;

use common::{lab_loop, shared_log};
use soliton::{Clock, Error, EventLoop, TaskState, VirtualClock};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

#[test]
fn run_returns_entry_value() {
    let (event_loop, _clock) = lab_loop();
    let result = event_loop.run(|_cx| async move { Ok(42) });
    assert_eq!(result, Ok(42));
}

#[test]
fn run_propagates_entry_failure() {
    let (event_loop, _clock) = lab_loop();
    let result: Result<(), Error> = event_loop.run(|_cx| async move { Err(Error::app("boom")) });
    assert_eq!(result, Err(Error::app("boom")));
}

#[test]
fn run_rejects_reentrancy() {
    common::init_logging();
    let event_loop = Rc::new(EventLoop::with_clock(Rc::new(VirtualClock::new())));
    let inner = event_loop.clone();
    let result = event_loop.run(move |_cx| async move {
        let nested: Result<(), Error> = inner.run(|_cx| async move { Ok(()) });
        Ok(nested == Err(Error::ReentrantRun))
    });
    assert_eq!(result, Ok(true));

    // The loop is usable again after run returns.
    let again = event_loop.run(|_cx| async move { Ok(7) });
    assert_eq!(again, Ok(7));
}

#[test]
fn spawn_before_run_executes() {
    let (event_loop, _clock) = lab_loop();
    let log = shared_log();
    let log_task = log.clone();
    let handle = event_loop.spawn(move |_cx| async move {
        log_task.borrow_mut().push("background");
        Ok(7)
    });

    let log_entry = log.clone();
    let result = event_loop.run(move |cx| async move {
        cx.yield_now().await?;
        log_entry.borrow_mut().push("entry");
        Ok(())
    });

    assert_eq!(result, Ok(()));
    // The pre-spawned task was queued first and ran first.
    assert_eq!(*log.borrow(), vec!["background", "entry"]);
    assert_eq!(handle.state(), TaskState::Done);
    assert_eq!(handle.try_outcome().map(|o| o.ok()), Some(Some(7)));
}

#[test]
fn spawn_does_not_run_inline() {
    let (event_loop, _clock) = lab_loop();
    let result = event_loop.run(|cx| async move {
        let log = shared_log();
        let log_child = log.clone();
        let child = cx.spawn(move |_cx| async move {
            log_child.borrow_mut().push("child");
            Ok(())
        });
        // Nothing ran yet: spawn only enqueues.
        assert!(log.borrow().is_empty());
        assert_eq!(child.state(), TaskState::Scheduled);

        cx.yield_now().await?;
        assert_eq!(*log.borrow(), vec!["child"]);
        Ok(())
    });
    assert_eq!(result, Ok(()));
}

#[test]
fn tasks_resume_in_spawn_order() {
    let (event_loop, _clock) = lab_loop();
    let log = shared_log();
    let entry_log = log.clone();
    let result = event_loop.run(move |cx| async move {
        for name in ["a", "b", "c"] {
            let task_log = entry_log.clone();
            cx.spawn(move |_cx| async move {
                task_log.borrow_mut().push(name);
                Ok(())
            });
        }
        cx.yield_now().await?;
        Ok(())
    });
    assert_eq!(result, Ok(()));
    assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
}

#[test]
fn leftover_tasks_are_cancelled_at_shutdown() {
    let (event_loop, clock) = lab_loop();
    let stash: Rc<RefCell<Option<soliton::TaskHandle<()>>>> = Rc::new(RefCell::new(None));
    let stash_entry = stash.clone();
    let result = event_loop.run(move |cx| async move {
        let sleeper = cx.spawn(|cx| async move {
            cx.sleep(Duration::from_secs(10)).await?;
            Ok(())
        });
        cx.yield_now().await?;
        *stash_entry.borrow_mut() = Some(sleeper);
        Ok("done")
    });
    assert_eq!(result, Ok("done"));

    let stash = stash.borrow();
    let sleeper = stash.as_ref().expect("handle stashed");
    assert_eq!(sleeper.state(), TaskState::Cancelled);
    assert!(sleeper.cancel_requested());
    // The sleeper was woken for cancellation, not by its deadline.
    assert!(clock.now().as_millis() < 10_000);
}

#[test]
fn shutdown_drains_promise_waiters() {
    let (event_loop, _clock) = lab_loop();
    let stash: Rc<RefCell<Option<soliton::TaskHandle<i32>>>> = Rc::new(RefCell::new(None));
    let stash_entry = stash.clone();
    let result = event_loop.run(move |cx| async move {
        // Waits on a promise nobody ever resolves; the shutdown sweep must
        // still get it to a terminal state.
        let promise = cx.promise::<i32>();
        let waiter = cx.spawn({
            let promise = promise.clone();
            move |cx| async move { promise.wait(&cx).await }
        });
        *stash_entry.borrow_mut() = Some(waiter);
        cx.sleep(Duration::from_millis(1)).await?;
        Ok(())
    });

    assert_eq!(result, Ok(()));
    let stash = stash.borrow();
    assert_eq!(stash.as_ref().expect("stashed").state(), TaskState::Cancelled);
}

#[test]
fn stall_with_stuck_entry_returns_error() {
    let (event_loop, _clock) = lab_loop();
    let result: Result<i32, Error> = event_loop.run(|cx| async move {
        let promise = cx.promise::<i32>();
        promise.wait(&cx).await
    });
    assert_eq!(result, Err(Error::Stalled { suspended: 1 }));
}

#[test]
fn task_panic_does_not_crash_the_loop() {
    let (event_loop, _clock) = lab_loop();
    let result = event_loop.run(|cx| async move {
        let bomb = cx.spawn(|_cx| async move {
            if [1].len() == 1 {
                panic!("kaboom");
            }
            Ok(())
        });
        let outcome = bomb.join(&cx).await;
        match outcome {
            soliton::Outcome::Err(Error::Panicked(message)) => Ok(message),
            other => Ok(format!("unexpected: {other:?}")),
        }
    });
    assert_eq!(result, Ok("kaboom".to_string()));
}

#[test]
fn unobserved_failure_reaches_the_hook() {
    let (event_loop, _clock) = lab_loop();
    let seen = shared_log();
    let seen_hook = seen.clone();
    event_loop.on_unobserved_failure(move |task, error| {
        seen_hook.borrow_mut().push((task, error.clone()));
    });

    let result = event_loop.run(|cx| async move {
        // Handle dropped immediately: nobody will ever see this failure.
        drop(cx.spawn(|_cx| async move {
            Err::<(), _>(Error::app("lost"))
        }));
        cx.yield_now().await?;
        Ok(())
    });
    assert_eq!(result, Ok(()));
    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].1, Error::app("lost"));
}

#[test]
fn observed_failure_does_not_reach_the_hook() {
    let (event_loop, _clock) = lab_loop();
    let seen = shared_log();
    let seen_hook = seen.clone();
    event_loop.on_unobserved_failure(move |task, error| {
        seen_hook.borrow_mut().push((task, error.clone()));
    });

    let result = event_loop.run(|cx| async move {
        let failing = cx.spawn(|_cx| async move { Err::<(), _>(Error::app("seen")) });
        let outcome = failing.join(&cx).await;
        Ok(outcome.is_err())
    });
    assert_eq!(result, Ok(true));
    assert!(seen.borrow().is_empty());
}

#[test]
fn externally_resolved_promise_feeds_the_loop() {
    let (event_loop, _clock) = lab_loop();
    let readiness = event_loop.promise::<&'static str>();
    // An external source (out of scope for the runtime) resolves before run.
    readiness.resolve("io-complete").expect("first resolution");

    let waiter = readiness.clone();
    let result = event_loop.run(move |cx| async move { waiter.wait(&cx).await });
    assert_eq!(result, Ok("io-complete"));
}
