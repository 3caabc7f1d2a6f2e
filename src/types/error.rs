use anyhow::Error;
use thiserror::Error;

/// Application-level error types for armrm-rs.
///
/// Per-node failures (everything except `Authentication` and
/// `InvalidConfig`) are caught by the cleaner and coordinator and end up in
/// the run's [`ErrorAggregate`](crate::types::ErrorAggregate).
///
/// ## Exit Codes
///
/// - 0: Cancelled by the user
/// - 1: General errors
/// - 2: Configuration and identifier errors (InvalidConfig, InvalidResourceId)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArmrmError {
    /// The provider answered with an unexpected status.
    #[error("provider returned HTTP {status} ({code}): {message}")]
    Provider {
        status: u16,
        code: String,
        message: String,
    },

    /// The provider response broke the async-operation contract.
    #[error("provider contract violated: {0}")]
    ProviderContract(String),

    #[error("invalid resource id: {0}")]
    InvalidResourceId(String),

    /// The long-running operation reached the terminal `Failed` state.
    #[error("long-running operation failed: {0}")]
    OperationFailed(String),

    /// The status payload carried a status outside the known vocabulary.
    #[error("unexpected operation status {0:?}")]
    UnexpectedOperationStatus(String),

    /// A 5xx (or transport failure) on a status check. The status check may be retried.
    #[error("transient failure checking operation status: {0}")]
    TransientStatusCheck(String),

    /// The provider reported success but the resource is still visible.
    #[error("{0} still exists after delete attempt")]
    StillExists(String),

    /// Nested resources could not be removed, so the parent was left in place.
    #[error("{id} was not deleted because {failed} nested resource(s) failed")]
    ChildrenFailed { id: String, failed: usize },

    /// Refused to mutate a resource outside the configured prefix.
    #[error("{id} is outside resource group prefix {prefix:?}")]
    OutOfScope { id: String, prefix: String },

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("run deadline exceeded")]
    DeadlineExceeded,

    #[error("Operation cancelled by user")]
    Cancelled,
}

impl ArmrmError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ArmrmError::Cancelled => 0,
            ArmrmError::InvalidConfig(_) | ArmrmError::InvalidResourceId(_) => 2,
            _ => 1,
        }
    }

    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ArmrmError::TransientStatusCheck(_) => true,
            ArmrmError::Provider { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// Throttling and server-side failures.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

pub fn is_cancelled_error(e: &Error) -> bool {
    if let Some(err) = e.downcast_ref::<ArmrmError>() {
        return *err == ArmrmError::Cancelled;
    }
    false
}

/// True for both user cancellation and run-deadline expiry.
pub fn is_run_interrupted_error(e: &Error) -> bool {
    matches!(
        e.downcast_ref::<ArmrmError>(),
        Some(ArmrmError::Cancelled) | Some(ArmrmError::DeadlineExceeded)
    )
}

/// Credentials were rejected. No further progress is possible in this run.
pub fn is_authentication_error(e: &Error) -> bool {
    matches!(
        e.downcast_ref::<ArmrmError>(),
        Some(ArmrmError::Authentication(_))
    )
}

pub fn is_transient_status_error(e: &Error) -> bool {
    matches!(
        e.downcast_ref::<ArmrmError>(),
        Some(ArmrmError::TransientStatusCheck(_))
    )
}

/// Extract the exit code from an anyhow::Error, defaulting to 1.
pub fn exit_code_from_error(e: &Error) -> i32 {
    if let Some(err) = e.downcast_ref::<ArmrmError>() {
        return err.exit_code();
    }
    1
}
