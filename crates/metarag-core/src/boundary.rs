//! Deadline and cancellation guard for calls that leave the process.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Caller-supplied limits for one boundary call.
#[derive(Debug, Clone)]
pub struct CallGuard {
    pub cancel: CancellationToken,
    pub timeout: Duration,
}

impl CallGuard {
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self { cancel, timeout }
    }

    /// A guard that is never cancelled externally.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(CancellationToken::new(), timeout)
    }

    pub async fn run<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        guarded(&self.cancel, self.timeout, what, fut).await
    }
}

/// Race `fut` against the token and the deadline.
///
/// The in-flight future is dropped on cancellation or timeout.
pub async fn guarded<T, F>(cancel: &CancellationToken, timeout: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(Error::Cancelled(what.to_string()));
    }
    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::warn!(call = what, "cancelled");
            Err(Error::Cancelled(what.to_string()))
        }
        res = tokio::time::timeout(timeout, fut) => match res {
            Ok(inner) => inner,
            Err(_) => {
                tracing::warn!(call = what, timeout_ms = timeout.as_millis() as u64, "deadline exceeded");
                Err(Error::Timeout { what: what.to_string(), millis: timeout.as_millis() })
            }
        },
    }
}
