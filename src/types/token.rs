use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;

use crate::types::error::ArmrmError;

/// A cancellation token used to signal run shutdown.
///
/// This is a type alias for [`tokio_util::sync::CancellationToken`]. Call
/// [`cancel()`](tokio_util::sync::CancellationToken::cancel) on it to request
/// graceful shutdown of a running cleanup (e.g., in a Ctrl+C handler).
pub type RunCancellationToken = tokio_util::sync::CancellationToken;

/// Create a new [`RunCancellationToken`].
///
/// # Example
///
/// ```
/// use armrm_rs::create_run_cancellation_token;
///
/// let token = create_run_cancellation_token();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
pub fn create_run_cancellation_token() -> RunCancellationToken {
    tokio_util::sync::CancellationToken::new()
}

/// The single deadline and cancellation signal shared by one run.
///
/// Every network call and every sleep inside the cleanup is raced against
/// both, so an expired deadline or a ctrl-c surfaces as
/// [`ArmrmError::DeadlineExceeded`] or [`ArmrmError::Cancelled`] promptly.
#[derive(Debug, Clone)]
pub struct RunContext {
    cancellation_token: RunCancellationToken,
    deadline: Instant,
}

/// Deadline used when the requested timeout does not fit in an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

impl RunContext {
    pub fn new(cancellation_token: RunCancellationToken, timeout: Duration) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        RunContext {
            cancellation_token,
            deadline,
        }
    }

    pub fn cancellation_token(&self) -> &RunCancellationToken {
        &self.cancellation_token
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_interrupted(&self) -> bool {
        self.cancellation_token.is_cancelled() || Instant::now() >= self.deadline
    }

    /// The error describing why the run stopped. Deadline expiry wins over
    /// cancellation when both happened.
    pub fn interruption_error(&self) -> ArmrmError {
        if Instant::now() >= self.deadline {
            ArmrmError::DeadlineExceeded
        } else {
            ArmrmError::Cancelled
        }
    }

    /// Runs `future` unless the run is interrupted first.
    pub async fn guard<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_interrupted() {
            return Err(self.interruption_error().into());
        }
        tokio::select! {
            result = future => result,
            _ = self.cancellation_token.cancelled() => Err(self.interruption_error().into()),
            _ = tokio::time::sleep_until(self.deadline) => Err(ArmrmError::DeadlineExceeded.into()),
        }
    }

    /// Sleeps for `duration`, returning early with an error on interruption.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        if duration.is_zero() {
            if self.is_interrupted() {
                return Err(self.interruption_error().into());
            }
            return Ok(());
        }
        self.guard(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}
