use std::fmt;
use std::thread;
use std::time::Duration;

use crv_core::config::PipelineConfig;
use crv_core::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    None,
    Fixed(Duration),
}

impl Backoff {
    pub fn delay(&self, _attempt: u32) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(d) => *d,
        }
    }
}

/// Bounded retry around calls to an external service.
///
/// An operation is attempted until it succeeds, fails with an error the predicate rejects, or
/// `max_attempts` attempts have been made. The last error is returned on exhaustion.
#[derive(Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub retryable: fn(&AppError) -> bool,
}

fn retryable_flag(err: &AppError) -> bool {
    err.retryable
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
            retryable: retryable_flag,
        }
    }

    /// No sleeping between attempts. Used by tests and offline fakes.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::None,
            retryable: retryable_flag,
        }
    }

    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self::fixed(
            cfg.retry_max_attempts,
            Duration::from_millis(cfg.retry_backoff_ms),
        )
    }

    pub fn run<T>(
        &self,
        label: &str,
        mut op: impl FnMut() -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            match op() {
                Ok(v) => return Ok(v),
                Err(e) if attempt < attempts && (self.retryable)(&e) => {
                    log::warn!("{label}: attempt {attempt}/{attempts} failed: {e}; retrying");
                    let delay = self.backoff.delay(attempt);
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    attempt += 1;
                }
                Err(e) => {
                    if (self.retryable)(&e) {
                        log::warn!("{label}: giving up after {attempt} attempts: {e}");
                    }
                    return Err(e);
                }
            }
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn transient() -> AppError {
        AppError::new("COMPLETION_UNREACHABLE", "down").with_retryable(true)
    }

    #[test]
    fn retries_transient_errors_until_success() {
        let calls = Cell::new(0);
        let out = RetryPolicy::immediate(5).run("test", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(transient())
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(out, Ok(3));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn stops_at_max_attempts_and_returns_last_error() {
        let calls = Cell::new(0);
        let out: Result<(), AppError> = RetryPolicy::immediate(4).run("test", || {
            calls.set(calls.get() + 1);
            Err(transient())
        });
        assert_eq!(out.unwrap_err().code, "COMPLETION_UNREACHABLE");
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn non_retryable_errors_fail_fast() {
        let calls = Cell::new(0);
        let out: Result<(), AppError> = RetryPolicy::immediate(5).run("test", || {
            calls.set(calls.get() + 1);
            Err(AppError::new("COMPLETION_REJECTED", "bad key"))
        });
        assert!(out.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn custom_predicate_overrides_flag() {
        let calls = Cell::new(0);
        let policy = RetryPolicy {
            retryable: |_| true,
            ..RetryPolicy::immediate(3)
        };
        let _ = policy.run("test", || -> Result<(), AppError> {
            calls.set(calls.get() + 1);
            Err(AppError::new("X", "y"))
        });
        assert_eq!(calls.get(), 3);
    }
}
