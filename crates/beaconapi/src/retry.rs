//! Retry logic with exponential backoff for transient errors.
//!
//! Waiting between attempts honours the caller's cancel flag and deadline:
//! a retry that could not start before the deadline is not attempted.

use crate::error::{Error, Result};
use crate::types::{CallOptions, RetryConfig};
use std::thread;
use std::time::Duration;

/// Polling interval while waiting between attempts.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Execute an operation with retry logic.
///
/// # Arguments
/// * `config` - Retry configuration
/// * `opts` - Cancellation and deadline for the whole call
/// * `should_retry` - Decides whether an error is worth another attempt
/// * `operation` - The operation to execute
///
/// # Returns
/// The result of the operation, or the last error if all attempts failed.
pub fn with_retry<T, R, F>(
    config: &RetryConfig,
    opts: &CallOptions<'_>,
    should_retry: R,
    mut operation: F,
) -> Result<T>
where
    R: Fn(&Error) -> bool,
    F: FnMut() -> Result<T>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        opts.check()?;

        let err = match operation() {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        if !should_retry(&err) || attempt + 1 >= max_attempts {
            return Err(err);
        }

        let delay = config.delay_for_attempt(attempt);
        if opts.remaining().is_some_and(|r| r <= delay) {
            return Err(err);
        }

        log::debug!(
            "Attempt {}/{} failed: {}. Retrying in {:?}",
            attempt + 1,
            max_attempts,
            err,
            delay
        );
        sleep(delay, opts)?;
        attempt += 1;
    }
}

/// Sleep for `delay`, waking early on cancellation.
fn sleep(delay: Duration, opts: &CallOptions<'_>) -> Result<()> {
    let mut left = delay;
    while !left.is_zero() {
        if opts.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let step = left.min(SLEEP_SLICE);
        thread::sleep(step);
        left = left.saturating_sub(step);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(10),
        }
    }

    fn server_error() -> Error {
        Error::from_response(503, "unavailable")
    }

    #[test]
    fn test_success_first_try() {
        let result = with_retry(&RetryConfig::no_retry(), &CallOptions::new(), Error::is_retryable, || {
            Ok::<_, Error>(42)
        });
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_non_retryable_error() {
        let attempts = Cell::new(0);
        let result: Result<()> = with_retry(&fast(), &CallOptions::new(), Error::is_retryable, || {
            attempts.set(attempts.get() + 1);
            Err(Error::from_response(404, ""))
        });
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_eventual_success() {
        let attempts = Cell::new(0);
        let result = with_retry(&fast(), &CallOptions::new(), Error::is_retryable, || {
            let current = attempts.get();
            attempts.set(current + 1);
            if current < 2 { Err(server_error()) } else { Ok(42) }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_all_attempts_fail() {
        let attempts = Cell::new(0);
        let result: Result<()> = with_retry(&fast(), &CallOptions::new(), Error::is_retryable, || {
            attempts.set(attempts.get() + 1);
            Err(server_error())
        });
        assert_eq!(result.unwrap_err().status(), Some(503));
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_cancelled_before_first_attempt() {
        let flag = AtomicBool::new(true);
        let opts = CallOptions::new().with_cancel(&flag);
        let attempts = Cell::new(0);
        let result: Result<()> = with_retry(&fast(), &opts, Error::is_retryable, || {
            attempts.set(attempts.get() + 1);
            Ok(())
        });
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(attempts.get(), 0);
    }

    #[test]
    fn test_cancel_stops_retrying() {
        let flag = AtomicBool::new(false);
        let opts = CallOptions::new().with_cancel(&flag);
        let attempts = Cell::new(0);
        let result: Result<()> = with_retry(&fast(), &opts, Error::is_retryable, || {
            attempts.set(attempts.get() + 1);
            flag.store(true, Ordering::SeqCst);
            Err(server_error())
        });
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_no_retry_past_deadline() {
        let config = RetryConfig {
            base_delay: Duration::from_secs(60),
            ..fast()
        };
        let opts = CallOptions::new().with_deadline(Some(Instant::now() + Duration::from_secs(5)));
        let attempts = Cell::new(0);
        let result: Result<()> = with_retry(&config, &opts, Error::is_retryable, || {
            attempts.set(attempts.get() + 1);
            Err(server_error())
        });
        assert_eq!(result.unwrap_err().status(), Some(503));
        assert_eq!(attempts.get(), 1);
    }
}
