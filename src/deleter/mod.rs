//! The deletion primitive.
//!
//! Issues one delete request for one resource and classifies the immediate
//! response. Idempotent: deleting a resource that is already gone reports
//! [`DeleteOutcome::NotFound`], which callers treat as success.

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::plan::ResourceKind;
use crate::poller::{OperationLocator, PendingOperation};
use crate::provider::{Provider, ProviderResponse};
use crate::types::ResourceRef;
use crate::types::error::ArmrmError;

#[derive(Debug, Clone)]
pub enum DeleteOutcome {
    /// Completed synchronously.
    Deleted,
    /// The provider accepted the request; completion must be polled.
    Accepted(PendingOperation),
    NotFound,
}

/// Classify the immediate response of a delete or other state-changing call
/// against `target`.
///
/// A locator on a 200, 201 or 202 response means the change completes
/// asynchronously. 202 without one breaks the provider contract.
pub fn classify_response(target: &ResourceRef, response: ProviderResponse) -> Result<DeleteOutcome> {
    if response.status == 404 {
        return Ok(DeleteOutcome::NotFound);
    }
    if !response.is_success() {
        return Err(anyhow!(response.into_error()));
    }

    let locator = OperationLocator::from_response(&response)?;
    match (response.status, locator) {
        (200..=202, Some(locator)) => Ok(DeleteOutcome::Accepted(PendingOperation::new(
            target.clone(),
            locator,
        ))),
        (202, None) => Err(anyhow!(ArmrmError::ProviderContract(format!(
            "{target} returned 202 Accepted without an operation locator"
        )))),
        _ => Ok(DeleteOutcome::Deleted),
    }
}

#[derive(Clone)]
pub struct ResourceDeleter {
    provider: Provider,
}

impl ResourceDeleter {
    pub fn new(provider: Provider) -> Self {
        ResourceDeleter { provider }
    }

    pub async fn delete(&self, id: &ResourceRef, kind: &ResourceKind) -> Result<DeleteOutcome> {
        let response = self
            .provider
            .delete_resource(id, kind)
            .await
            .with_context(|| format!("deleting {} {id} failed.", kind.name))?;
        debug!(resource = %id, status = response.status, "delete request answered.");

        classify_response(id, response).with_context(|| format!("deleting {} {id} failed.", kind.name))
    }
}
