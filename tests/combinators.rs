//! Aggregate combinators: gather (fail-fast and collect-all), wait_for
//! deadline races, and retry.

mod common;

use common::lab_loop;
use soliton::{gather, gather_all, retry, wait_for, Clock, Error, Outcome, TaskState};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

#[test]
fn gather_preserves_input_order() {
    let (event_loop, _clock) = lab_loop();
    let result = event_loop.run(|cx| async move {
        let mut handles = Vec::new();
        for (value, millis) in [(0, 30u64), (1, 10), (2, 20)] {
            handles.push(cx.spawn(move |cx| async move {
                cx.sleep(Duration::from_millis(millis)).await?;
                Ok(value)
            }));
        }
        gather(&cx, &handles).await
    });
    // Results follow the input list, not completion order.
    assert_eq!(result, Ok(vec![0, 1, 2]));
}

#[test]
fn gather_fails_fast_and_cancels_siblings() {
    let (event_loop, clock) = lab_loop();
    let result = event_loop.run(move |cx| async move {
        let mut handles = Vec::new();
        handles.push(cx.spawn(|_cx| async move { Err::<i32, _>(Error::app("broken")) }));
        handles.push(cx.spawn(|cx| async move {
            cx.sleep(Duration::from_secs(10)).await?;
            Ok(1)
        }));

        let aggregate = gather(&cx, &handles).await;
        assert_eq!(aggregate, Err(Error::app("broken")));

        // The sibling was asked to stop and winds up Cancelled.
        let slow_outcome = handles[1].join(&cx).await;
        assert!(slow_outcome.is_cancelled());
        assert_eq!(handles[1].state(), TaskState::Cancelled);
        Ok(cx.now().as_millis())
    });
    // The aggregate failed promptly, nowhere near the 10s sleep.
    let elapsed = result.expect("entry succeeds");
    assert!(elapsed < 1_000, "aggregate should fail well under 10s, took {elapsed}ms");
    assert!(clock.now().as_millis() < 1_000);
}

#[test]
fn gather_all_collects_every_outcome_in_place() {
    let (event_loop, _clock) = lab_loop();
    let result = event_loop.run(|cx| async move {
        let ok = cx.spawn(|_cx| async move { Ok(10) });
        let failing = cx.spawn(|_cx| async move { Err::<i32, _>(Error::app("bad")) });
        let cancelled = cx.spawn(|cx| async move {
            cx.sleep(Duration::from_secs(10)).await?;
            Ok(30)
        });
        cx.yield_now().await?;
        cancelled.cancel();

        gather_all(&cx, &[ok, failing, cancelled]).await
    });
    let outcomes = result.expect("aggregate itself was not cancelled");
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0], Outcome::Ok(10));
    assert_eq!(outcomes[1], Outcome::Err(Error::app("bad")));
    assert!(outcomes[2].is_cancelled());
}

#[test]
fn wait_for_times_out_and_cancels_the_task() {
    let (event_loop, clock) = lab_loop();
    let result = event_loop.run(move |cx| async move {
        let slow = cx.spawn(|cx| async move {
            cx.sleep(Duration::from_secs(5)).await?;
            Ok("too late")
        });

        let raced = wait_for(&cx, &slow, Duration::from_secs(1)).await;
        assert_eq!(raced, Err(Error::Timeout(Duration::from_secs(1))));

        // The loser got a timeout cancellation.
        let outcome = slow.join(&cx).await;
        assert!(outcome.is_cancelled());
        assert_eq!(slow.state(), TaskState::Cancelled);
        Ok(cx.now().as_millis())
    });
    let elapsed = result.expect("entry succeeds");
    // The timeout fired at the deadline, not at the task's 5s sleep.
    assert_eq!(elapsed, 1_000);
    assert!(clock.now().as_millis() < 5_000);
}

#[test]
fn wait_for_returns_result_when_task_beats_deadline() {
    let (event_loop, clock) = lab_loop();
    let result = event_loop.run(|cx| async move {
        let quick = cx.spawn(|cx| async move {
            cx.sleep(Duration::from_millis(100)).await?;
            Ok("made it")
        });

        let raced = wait_for(&cx, &quick, Duration::from_secs(1)).await?;
        assert_eq!(raced, "made it");
        // Done, not Cancelled: exactly one of {timeout, result} happened.
        assert_eq!(quick.state(), TaskState::Done);
        assert!(!quick.cancel_requested());
        Ok(())
    });
    assert_eq!(result, Ok(()));
    // The pending 1s deadline was disarmed; the loop never idled to it.
    assert_eq!(clock.now().as_millis(), 100);
}

#[test]
fn retry_returns_first_success() {
    let (event_loop, _clock) = lab_loop();
    let attempts = Rc::new(Cell::new(0u32));
    let attempts_entry = attempts.clone();
    let result = event_loop.run(move |cx| async move {
        let attempts = attempts_entry.clone();
        retry(&cx, 5, move |cx| {
            let attempts = attempts.clone();
            async move {
                cx.yield_now().await?;
                let n = attempts.get() + 1;
                attempts.set(n);
                if n < 3 {
                    Err(Error::app("flaky"))
                } else {
                    Ok(n)
                }
            }
        })
        .await
    });
    assert_eq!(result, Ok(3));
    assert_eq!(attempts.get(), 3);
}

#[test]
fn retry_exhausts_attempts_with_last_error() {
    let (event_loop, _clock) = lab_loop();
    let attempts = Rc::new(Cell::new(0u32));
    let attempts_entry = attempts.clone();
    let result: Result<(), Error> = event_loop.run(move |cx| async move {
        let attempts = attempts_entry.clone();
        retry(&cx, 3, move |_cx| {
            let attempts = attempts.clone();
            async move {
                let n = attempts.get() + 1;
                attempts.set(n);
                Err::<(), _>(Error::app(format!("attempt {n}")))
            }
        })
        .await
    });
    assert_eq!(result, Err(Error::app("attempt 3")));
    assert_eq!(attempts.get(), 3);
}

#[test]
fn retry_never_retries_cancellation() {
    let (event_loop, _clock) = lab_loop();
    let attempts = Rc::new(Cell::new(0u32));
    let attempts_entry = attempts.clone();
    let result = event_loop.run(move |cx| async move {
        let attempts = attempts_entry.clone();
        let retrier = cx.spawn(move |cx| async move {
            retry(&cx, 10, move |cx| {
                let attempts = attempts.clone();
                async move {
                    attempts.set(attempts.get() + 1);
                    cx.sleep(Duration::from_secs(1)).await?;
                    Err::<(), _>(Error::app("never reached"))
                }
            })
            .await
        });
        cx.yield_now().await?;
        retrier.cancel();

        let outcome = retrier.join(&cx).await;
        assert!(outcome.is_cancelled());
        Ok(())
    });
    assert_eq!(result, Ok(()));
    // Cancellation stopped the loop inside the first attempt.
    assert_eq!(attempts.get(), 1);
}
