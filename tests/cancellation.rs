//! Cooperative cancellation: delivery at suspension points, idempotence,
//! cleanup, suppression, and waiter-list removal.

mod common;

use common::{lab_loop, shared_log};
use soliton::{CancelKind, CancelReason, Error, Lock, TaskState};
use std::time::Duration;

#[test]
fn cancel_is_idempotent() {
    let (event_loop, _clock) = lab_loop();
    let result = event_loop.run(|cx| async move {
        let sleeper = cx.spawn(|cx| async move {
            cx.sleep(Duration::from_secs(1)).await?;
            Ok(())
        });
        cx.yield_now().await?;

        assert!(sleeper.cancel());
        assert!(!sleeper.cancel()); // same observable effect as one call
        let outcome = sleeper.join(&cx).await;
        assert!(outcome.is_cancelled());
        assert_eq!(sleeper.state(), TaskState::Cancelled);

        // Cancelling a terminal task changes nothing.
        assert!(!sleeper.cancel());
        assert_eq!(sleeper.state(), TaskState::Cancelled);
        Ok(())
    });
    assert_eq!(result, Ok(()));
}

#[test]
fn cancel_before_first_resume_delivers_at_first_suspension() {
    let (event_loop, _clock) = lab_loop();
    let log = shared_log();
    let entry_log = log.clone();
    let result = event_loop.run(move |cx| async move {
        let task_log = entry_log.clone();
        let victim = cx.spawn(move |cx| async move {
            task_log.borrow_mut().push("before suspension");
            cx.sleep(Duration::from_secs(1)).await?;
            task_log.borrow_mut().push("after suspension");
            Ok(())
        });
        victim.cancel();

        let outcome = victim.join(&cx).await;
        assert!(outcome.is_cancelled());
        Ok(())
    });
    assert_eq!(result, Ok(()));
    // Cooperative: the code up to the first suspension point ran; nothing
    // after it did.
    assert_eq!(*log.borrow(), vec!["before suspension"]);
}

#[test]
fn checkpoint_delivers_cancellation_directly() {
    let (event_loop, _clock) = lab_loop();
    let result = event_loop.run(|cx| async move {
        let victim = cx.spawn(|cx| async move {
            cx.checkpoint()?;
            Ok("survived")
        });
        victim.cancel_with(CancelReason::user("test"));

        let outcome = victim.join(&cx).await;
        match outcome {
            soliton::Outcome::Cancelled(reason) => {
                assert_eq!(reason.kind(), CancelKind::User);
                assert_eq!(reason.message(), Some("test"));
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
        Ok(())
    });
    assert_eq!(result, Ok(()));
}

#[test]
fn cleanup_code_can_catch_and_reraise() {
    let (event_loop, _clock) = lab_loop();
    let log = shared_log();
    let entry_log = log.clone();
    let result = event_loop.run(move |cx| async move {
        let task_log = entry_log.clone();
        let victim = cx.spawn(move |cx| async move {
            match cx.sleep(Duration::from_secs(5)).await {
                Ok(()) => Ok(()),
                Err(condition) => {
                    // Cleanup runs, then the condition is re-raised.
                    task_log.borrow_mut().push("cleanup");
                    Err(condition)
                }
            }
        });
        cx.yield_now().await?;
        victim.cancel();

        let outcome = victim.join(&cx).await;
        assert!(outcome.is_cancelled());
        assert_eq!(victim.state(), TaskState::Cancelled);
        Ok(())
    });
    assert_eq!(result, Ok(()));
    assert_eq!(*log.borrow(), vec!["cleanup"]);
}

#[test]
fn suppressed_cancellation_is_detectable() {
    let (event_loop, _clock) = lab_loop();
    let result = event_loop.run(|cx| async move {
        let victim = cx.spawn(|cx| async move {
            match cx.sleep(Duration::from_secs(5)).await {
                // Swallows the condition: legal, but the task ends Done.
                Ok(()) | Err(_) => Ok(5),
            }
        });
        cx.yield_now().await?;
        victim.cancel();

        let outcome = victim.join(&cx).await;
        assert_eq!(outcome, soliton::Outcome::Ok(5));
        assert_eq!(victim.state(), TaskState::Done);
        // The request is still visible, so callers can detect suppression.
        assert!(victim.cancel_requested());
        Ok(())
    });
    assert_eq!(result, Ok(()));
}

#[test]
fn cancelled_lock_waiter_leaves_the_queue() {
    let (event_loop, _clock) = lab_loop();
    let result = event_loop.run(|cx| async move {
        let lock = Lock::new(&cx);
        lock.acquire(&cx).await?;

        let waiter = cx.spawn({
            let lock = lock.clone();
            move |cx| async move {
                lock.acquire(&cx).await?;
                lock.release(&cx)?;
                Ok(())
            }
        });
        cx.yield_now().await?;
        assert_eq!(lock.waiters(), 1);

        waiter.cancel();
        let outcome = waiter.join(&cx).await;
        assert!(outcome.is_cancelled());
        // Removed from the waiter list without disturbing the lock.
        assert_eq!(lock.waiters(), 0);
        assert!(lock.is_held());
        lock.release(&cx)?;
        Ok(())
    });
    assert_eq!(result, Ok(()));
}

#[test]
fn cancellation_reason_strengthens_by_severity() {
    let (event_loop, _clock) = lab_loop();
    let result = event_loop.run(|cx| async move {
        let sleeper = cx.spawn(|cx| async move {
            cx.sleep(Duration::from_secs(1)).await?;
            Ok(())
        });
        cx.yield_now().await?;

        sleeper.cancel_with(CancelReason::user("first"));
        sleeper.cancel_with(CancelReason::shutdown());

        let outcome = sleeper.join(&cx).await;
        match outcome {
            soliton::Outcome::Cancelled(reason) => {
                assert_eq!(reason.kind(), CancelKind::Shutdown);
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
        Ok(())
    });
    assert_eq!(result, Ok(()));
}

#[test]
fn joining_a_cancelled_task_raises_the_condition() {
    let (event_loop, _clock) = lab_loop();
    let result: Result<(), Error> = event_loop.run(|cx| async move {
        let sleeper = cx.spawn(|cx| async move {
            cx.sleep(Duration::from_secs(1)).await?;
            Ok(())
        });
        cx.yield_now().await?;
        sleeper.cancel();

        // into_result re-raises the condition into the awaiting task.
        sleeper.join(&cx).await.into_result()
    });
    match result {
        Err(Error::Cancelled(reason)) => assert_eq!(reason.kind(), CancelKind::User),
        other => panic!("expected cancellation to propagate, got {other:?}"),
    }
}
