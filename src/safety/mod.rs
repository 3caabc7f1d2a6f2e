//! Safety features for armrm-rs cleanup runs.
//!
//! Every resource that is mutated or deleted must live in a resource group
//! whose name starts with the configured prefix (case-insensitive). The
//! coordinator filters top-level resources with [`SafetyChecker::is_in_scope`]
//! and the cleaner re-checks each node with
//! [`SafetyChecker::check_before_mutation`] before the first mutating call.

#[cfg(test)]
mod safety_properties;

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::config::Config;
use crate::types::ResourceRef;
use crate::types::error::ArmrmError;

/// Prefix guard shared by the coordinator and the cleaner.
#[derive(Debug, Clone)]
pub struct SafetyChecker {
    prefix: String,
    prefix_lowercase: String,
    dry_run: bool,
}

impl SafetyChecker {
    pub fn new(config: &Config) -> Self {
        Self::with_prefix(&config.cleanup_options.prefix, config.cleanup_options.dry_run)
    }

    pub fn with_prefix(prefix: &str, dry_run: bool) -> Self {
        SafetyChecker {
            prefix: prefix.to_string(),
            prefix_lowercase: prefix.to_lowercase(),
            dry_run,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether `resource` sits in a resource group matching the prefix.
    ///
    /// Subscription-level resources and an empty prefix are never in scope.
    ///
    /// ```
    /// use armrm_rs::safety::SafetyChecker;
    /// use armrm_rs::types::ResourceRef;
    ///
    /// let checker = SafetyChecker::with_prefix("acctest", true);
    /// assert!(checker.is_in_scope(&ResourceRef::for_resource_group("s", "AccTest-RG1")));
    /// assert!(!checker.is_in_scope(&ResourceRef::for_resource_group("s", "prod-acctest")));
    /// assert!(!checker.is_in_scope(&ResourceRef::for_subscription("s")));
    /// ```
    pub fn is_in_scope(&self, resource: &ResourceRef) -> bool {
        if self.prefix_lowercase.is_empty() {
            return false;
        }
        resource
            .resource_group()
            .map(|group| group.to_lowercase().starts_with(&self.prefix_lowercase))
            .unwrap_or(false)
    }

    /// Refuse to mutate `resource` when it is out of scope.
    pub fn check_before_mutation(&self, resource: &ResourceRef) -> Result<()> {
        if self.is_in_scope(resource) {
            return Ok(());
        }
        warn!(
            resource = %resource,
            prefix = self.prefix,
            "refusing to modify resource outside the resource group prefix."
        );
        Err(anyhow!(ArmrmError::OutOfScope {
            id: resource.to_string(),
            prefix: self.prefix.clone(),
        }))
    }

    /// Announce the mode of the run before anything is listed.
    pub fn log_run_mode(&self) {
        if self.dry_run {
            info!(
                prefix = self.prefix,
                "dry-run mode. Nothing will be deleted."
            );
        } else {
            warn!(
                prefix = self.prefix,
                "deleting resources in resource groups starting with {:?}.",
                self.prefix
            );
        }
    }
}
