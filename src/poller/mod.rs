//! Async operation polling.
//!
//! A delete (or a pre-delete mutation) that the provider accepts returns a
//! status-check locator. [`OperationPoller::poll`] issues exactly one status
//! check and classifies it; [`OperationPoller::poll_until_done`] is the
//! driving loop that sleeps the returned interval between checks until a
//! terminal state, bounded by the run's deadline and cancellation.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::provider::{AZURE_ASYNC_OPERATION_HEADER, LOCATION_HEADER, Provider, ProviderResponse};
use crate::types::ResourceRef;
use crate::types::error::{ArmrmError, is_run_interrupted_error, is_transient_status_error};
use crate::types::token::RunContext;

/// Provider message that signals a dependency race rather than a real failure.
const NESTED_RESOURCES_MESSAGE: &str = "nested resources exist";

/// Where the status of an accepted operation is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationLocator {
    /// Returns a `{ "status": ... }` payload.
    AzureAsyncOperation(Url),
    /// Returns 202 while running and the final result when done.
    Location(Url),
}

impl OperationLocator {
    pub fn url(&self) -> &Url {
        match self {
            OperationLocator::AzureAsyncOperation(url) | OperationLocator::Location(url) => url,
        }
    }

    /// Extract the locator from an immediate response. `Azure-AsyncOperation`
    /// wins over `Location`. A locator that is not an absolute http(s) URL
    /// violates the provider contract.
    pub fn from_response(response: &ProviderResponse) -> Result<Option<Self>> {
        let (header, constructor): (_, fn(Url) -> Self) =
            match response.header(AZURE_ASYNC_OPERATION_HEADER) {
                Some(value) => (value, OperationLocator::AzureAsyncOperation),
                None => match response.header(LOCATION_HEADER) {
                    Some(value) => (value, OperationLocator::Location),
                    None => return Ok(None),
                },
            };

        let url = Url::parse(header).map_err(|e| {
            anyhow!(ArmrmError::ProviderContract(format!(
                "invalid operation locator {header:?}: {e}"
            )))
        })?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(anyhow!(ArmrmError::ProviderContract(format!(
                "operation locator {header:?} is not an http(s) URL"
            ))));
        }
        Ok(Some(constructor(url)))
    }
}

impl fmt::Display for OperationLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.url().fmt(f)
    }
}

/// An accepted asynchronous operation, owned by the poll loop driving it.
#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub target: ResourceRef,
    pub locator: OperationLocator,
    pub created_at: DateTime<Utc>,
}

impl PendingOperation {
    pub fn new(target: ResourceRef, locator: OperationLocator) -> Self {
        PendingOperation {
            target,
            locator,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollResult {
    /// Not done yet; poll again after the carried interval.
    InProgress(Duration),
    Succeeded,
    Failed(String),
}

impl PollResult {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollResult::InProgress(_))
    }
}

#[derive(Deserialize)]
struct StatusPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<StatusError>,
}

#[derive(Deserialize)]
struct StatusError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

fn is_nested_resources_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains(NESTED_RESOURCES_MESSAGE)
}

/// Classify one status-check response.
///
/// 404 means the target is gone. 5xx is a transient status-check failure the
/// driving loop may retry. A message saying nested resources still exist is
/// reported as in progress whatever the status code. Any other 4xx is fatal.
pub fn classify_status(
    locator: &OperationLocator,
    response: &ProviderResponse,
    interval: Duration,
) -> Result<PollResult> {
    if response.status == 404 {
        return Ok(PollResult::Succeeded);
    }
    if response.status >= 500 {
        return Err(anyhow!(ArmrmError::TransientStatusCheck(format!(
            "status check returned HTTP {}",
            response.status
        ))));
    }

    let payload: Option<StatusPayload> = if response.body.trim().is_empty() {
        None
    } else {
        serde_json::from_str(&response.body).ok()
    };

    if let Some(error) = payload.as_ref().and_then(|payload| payload.error.as_ref()) {
        if is_nested_resources_message(&error.message) {
            debug!(
                locator = %locator,
                code = error.code,
                "nested resources still exist. Treating as in progress."
            );
            return Ok(PollResult::InProgress(interval));
        }
    }

    if !response.is_success() {
        return Err(anyhow!(response.clone().into_error()));
    }

    let status = payload.as_ref().and_then(|payload| payload.status.as_deref());
    match (status, locator) {
        (Some(status), _) => classify_status_value(status, payload.as_ref(), interval),
        (None, OperationLocator::Location(_)) if response.status == 202 => {
            Ok(PollResult::InProgress(interval))
        }
        (None, OperationLocator::Location(_)) => Ok(PollResult::Succeeded),
        (None, OperationLocator::AzureAsyncOperation(_)) => {
            Err(anyhow!(ArmrmError::UnexpectedOperationStatus(
                response.body.trim().to_string()
            )))
        }
    }
}

fn classify_status_value(
    status: &str,
    payload: Option<&StatusPayload>,
    interval: Duration,
) -> Result<PollResult> {
    match status.to_ascii_lowercase().as_str() {
        "succeeded" => Ok(PollResult::Succeeded),
        "inprogress" | "deleting" | "accepted" | "running" => Ok(PollResult::InProgress(interval)),
        "failed" | "canceled" | "cancelled" => {
            let reason = payload
                .and_then(|payload| payload.error.as_ref())
                .map(|error| {
                    if error.code.is_empty() {
                        error.message.clone()
                    } else {
                        format!("{}: {}", error.code, error.message)
                    }
                })
                .unwrap_or_else(|| format!("operation {status}"));
            Ok(PollResult::Failed(reason))
        }
        _ => Err(anyhow!(ArmrmError::UnexpectedOperationStatus(
            status.to_string()
        ))),
    }
}

/// Polls one kind of operation at a fixed interval.
#[derive(Clone)]
pub struct OperationPoller {
    provider: Provider,
    interval: Duration,
    max_transient_failures: u32,
}

impl OperationPoller {
    pub fn new(provider: Provider, interval: Duration, max_transient_failures: u32) -> Self {
        OperationPoller {
            provider,
            interval,
            max_transient_failures,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Issue one status check.
    pub async fn poll(&self, operation: &PendingOperation) -> Result<PollResult> {
        let response = match self
            .provider
            .get_operation_status(operation.locator.url())
            .await
        {
            Ok(response) => response,
            Err(e)
                if matches!(
                    e.downcast_ref::<ArmrmError>(),
                    Some(ArmrmError::Authentication(_))
                ) =>
            {
                return Err(e);
            }
            Err(e) => {
                return Err(anyhow!(ArmrmError::TransientStatusCheck(format!("{e:#}"))));
            }
        };
        classify_status(&operation.locator, &response, self.interval)
    }

    /// Poll until the operation is terminal. Returns the number of status
    /// checks issued. `Failed` becomes [`ArmrmError::OperationFailed`].
    pub async fn poll_until_done(
        &self,
        operation: &PendingOperation,
        context: &RunContext,
    ) -> Result<u32> {
        let mut attempts = 0;
        let mut transient_failures = 0;

        loop {
            attempts += 1;
            let result = match context.guard(self.poll(operation)).await {
                Ok(result) => {
                    transient_failures = 0;
                    result
                }
                Err(e) if is_run_interrupted_error(&e) => {
                    return Err(e.context(format!(
                        "polling operation for {} interrupted.",
                        operation.target
                    )));
                }
                Err(e) if is_transient_status_error(&e) => {
                    transient_failures += 1;
                    if transient_failures > self.max_transient_failures {
                        return Err(e.context(format!(
                            "status checks for {} kept failing.",
                            operation.target
                        )));
                    }
                    warn!(
                        resource = %operation.target,
                        attempt = attempts,
                        transient_failures = transient_failures,
                        error = %e,
                        "status check failed. Retrying."
                    );
                    PollResult::InProgress(self.interval)
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "polling operation for {} failed.",
                        operation.target
                    )));
                }
            };

            match result {
                PollResult::Succeeded => {
                    debug!(
                        resource = %operation.target,
                        attempts = attempts,
                        elapsed_ms = (Utc::now() - operation.created_at).num_milliseconds(),
                        "operation succeeded."
                    );
                    return Ok(attempts);
                }
                PollResult::Failed(reason) => {
                    return Err(anyhow!(ArmrmError::OperationFailed(reason))
                        .context(format!("operation for {} failed.", operation.target)));
                }
                PollResult::InProgress(interval) => {
                    debug!(
                        resource = %operation.target,
                        attempt = attempts,
                        "operation in progress."
                    );
                    context.sleep(interval).await.with_context(|| {
                        format!("waiting for operation on {} interrupted.", operation.target)
                    })?;
                }
            }
        }
    }
}
