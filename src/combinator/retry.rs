//! Retrying a fallible continuation.

use crate::cx::Cx;
use crate::error::Error;
use std::future::Future;

/// Runs `factory` up to `attempts` times, returning the first success.
///
/// Each attempt runs inline in the calling task. Ordinary failures are
/// retried until the attempts are exhausted, in which case the last error is
/// returned; the cancellation condition is never retried, it propagates
/// immediately.
///
/// # Errors
///
/// The last attempt's error, or the cancellation condition.
pub async fn retry<F, Fut, T>(cx: &Cx, attempts: u32, mut factory: F) -> Result<T, Error>
where
    F: FnMut(Cx) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut last_error = None;
    for _ in 0..attempts {
        match factory(cx.clone()).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| Error::app("retry: zero attempts requested")))
}
