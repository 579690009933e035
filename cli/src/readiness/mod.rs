//! Readiness state machines
//!
//! Bounded poll-until-success-or-timeout loops shared by the deployment
//! steps. Every loop has the same shape: a fixed attempt budget, a fixed
//! sleep between attempts, early exit on success, and a cancellation check
//! on every wait.

pub mod certificate;
pub mod dns;
pub mod https;

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::cancel::CancelSignal;
use crate::errors::DeployError;

/// Bound/interval pair for one polling loop
#[derive(Debug, Clone, Copy)]
pub struct PollSpec {
    /// Maximum number of checks before timing out
    pub max_attempts: u32,

    /// Seconds to sleep between checks
    pub interval_secs: u64,

    /// Seconds to sleep after the first failed check; lets a loop absorb
    /// known propagation delay without inflating every later interval
    pub first_interval_secs: u64,
}

impl PollSpec {
    /// Sleep duration after the given (1-based) completed attempt
    pub fn interval_after(&self, attempt: u32) -> Duration {
        if attempt == 1 {
            Duration::from_secs(self.first_interval_secs)
        } else {
            Duration::from_secs(self.interval_secs)
        }
    }
}

/// Run a bounded polling loop.
///
/// `check` is invoked once per attempt and reports `Ok(Some(value))` on
/// success, `Ok(None)` to keep waiting, or an error to abort immediately.
/// A successful attempt exits without sleeping again. Cancellation during
/// a sleep returns [`DeployError::Cancelled`] promptly.
pub async fn poll<F, Fut, T>(
    spec: &PollSpec,
    cancel: &CancelSignal,
    what: &str,
    mut check: F,
) -> Result<T, DeployError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, DeployError>>,
{
    for attempt in 1..=spec.max_attempts {
        if cancel.is_cancelled() {
            return Err(DeployError::Cancelled);
        }

        if let Some(value) = check(attempt).await? {
            return Ok(value);
        }

        if attempt < spec.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return Err(DeployError::Cancelled),
                _ = sleep(spec.interval_after(attempt)) => {}
            }
        }
    }

    Err(DeployError::Timeout {
        what: what.to_string(),
        attempts: spec.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: PollSpec = PollSpec {
        max_attempts: 5,
        interval_secs: 0,
        first_interval_secs: 0,
    };

    #[tokio::test]
    async fn test_poll_succeeds_on_third_attempt() {
        let cancel = CancelSignal::new();
        let result = poll(&FAST, &cancel, "thing", |attempt| async move {
            Ok(if attempt == 3 { Some(attempt) } else { None })
        })
        .await
        .unwrap();
        assert_eq!(result, 3);
    }

    #[tokio::test]
    async fn test_poll_times_out_after_exact_budget() {
        let cancel = CancelSignal::new();
        let mut attempts = 0u32;
        let result: Result<(), _> = poll(&FAST, &cancel, "thing", |_| {
            attempts += 1;
            async { Ok(None) }
        })
        .await;

        assert_eq!(attempts, 5);
        match result {
            Err(DeployError::Timeout { attempts, .. }) => assert_eq!(attempts, 5),
            other => panic!("expected timeout, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_poll_returns_cancelled_when_signalled() {
        let cancel = CancelSignal::new();
        cancel.cancel();
        let result: Result<(), _> = poll(&FAST, &cancel, "thing", |_| async { Ok(None) }).await;
        assert!(matches!(result, Err(DeployError::Cancelled)));
    }

    #[test]
    fn test_first_interval_only_applies_once() {
        let spec = PollSpec {
            max_attempts: 30,
            interval_secs: 10,
            first_interval_secs: 20,
        };
        assert_eq!(spec.interval_after(1), Duration::from_secs(20));
        assert_eq!(spec.interval_after(2), Duration::from_secs(10));
    }
}
