//! Recursive teardown of one resource and everything nested below it.
//!
//! For a node the cleaner runs any before-children mutation, then for each
//! child kind in plan order lists the live children and cleans them (one at a
//! time, or through a bounded worker group for parallel leaf kinds). A child
//! failure is recorded and its siblings still run, but the node itself is left
//! in place and reported as [`ArmrmError::ChildrenFailed`]. Once every child
//! is gone the node's before-delete mutation runs, the node is deleted, the
//! operation is polled to completion and its absence verified.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{Config, PollingConfig};
use crate::deleter::{DeleteOutcome, ResourceDeleter};
use crate::plan::{MutationPhase, ResourceKind};
use crate::poller::{OperationPoller, PendingOperation};
use crate::provider::Provider;
use crate::safety::SafetyChecker;
use crate::types::error::{ArmrmError, is_authentication_error, is_run_interrupted_error};
use crate::types::token::RunContext;
use crate::types::{CleanupStatsReport, ErrorAggregate, ListedResource, ResourceRef};

mod mutation;

#[derive(Clone)]
pub struct SubtreeCleaner {
    provider: Provider,
    deleter: ResourceDeleter,
    safety_checker: SafetyChecker,
    dry_run: bool,
    worker_size: usize,
    polling_config: PollingConfig,
    context: RunContext,
    stats: Arc<CleanupStatsReport>,
    errors: ErrorAggregate,
}

impl SubtreeCleaner {
    pub fn new(
        config: &Config,
        provider: Provider,
        context: RunContext,
        stats: Arc<CleanupStatsReport>,
        errors: ErrorAggregate,
    ) -> Self {
        SubtreeCleaner {
            deleter: ResourceDeleter::new(provider.clone()),
            provider,
            safety_checker: SafetyChecker::new(config),
            dry_run: config.cleanup_options.dry_run,
            worker_size: config.worker_size.max(1) as usize,
            polling_config: config.polling_config,
            context,
            stats,
            errors,
        }
    }

    /// Tear down `resource` and its subtree.
    ///
    /// Failures of nested resources are recorded in the shared
    /// [`ErrorAggregate`]; the returned error describes `resource` itself.
    pub fn clean<'a>(
        &'a self,
        resource: &'a ListedResource,
        kind: &'static ResourceKind,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let id = &resource.id;
            if self.context.is_interrupted() {
                return Err(anyhow!(self.context.interruption_error()));
            }
            self.safety_checker.check_before_mutation(id)?;

            if let Some(mutation) = kind.mutation_in_phase(MutationPhase::BeforeChildren) {
                self.apply_mutation(mutation, resource, kind)
                    .await
                    .with_context(|| format!("{mutation} on {id} failed."))?;
            }

            let mut failed = 0;
            for child_kind in kind.children {
                let children = self
                    .context
                    .guard(self.provider.list_resources(id, child_kind))
                    .await
                    .with_context(|| format!("listing {} under {id} failed.", child_kind.name))?;
                debug!(
                    resource = %id,
                    kind = child_kind.name,
                    count = children.len(),
                    "listed nested resources."
                );

                if child_kind.deletes_in_parallel() {
                    failed += self.clean_in_parallel(children, child_kind).await?;
                    continue;
                }

                for child in &children {
                    if self.context.is_interrupted() {
                        return Err(anyhow!(self.context.interruption_error()));
                    }
                    match self.clean(child, child_kind).await {
                        Ok(()) => {}
                        Err(e) if aborts_subtree(&e) => return Err(e),
                        Err(e) => {
                            self.record_failure(child.id.clone(), e);
                            failed += 1;
                        }
                    }
                }
            }

            if failed > 0 {
                return Err(anyhow!(ArmrmError::ChildrenFailed {
                    id: id.to_string(),
                    failed,
                }));
            }

            if let Some(mutation) = kind.mutation_in_phase(MutationPhase::BeforeDelete) {
                self.apply_mutation(mutation, resource, kind)
                    .await
                    .with_context(|| format!("{mutation} on {id} failed."))?;
            }

            self.delete_node(id, kind).await
        })
    }

    /// Clean every child through a worker group bounded by `worker_size` and
    /// wait for all of them. Returns the number of failed children.
    async fn clean_in_parallel(
        &self,
        children: Vec<ListedResource>,
        kind: &'static ResourceKind,
    ) -> Result<usize> {
        let semaphore = Arc::new(Semaphore::new(self.worker_size));
        let mut join_set = JoinSet::new();

        for child in children {
            if self.context.is_interrupted() {
                break;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .context("acquiring worker permit failed.")?;
            let cleaner = self.clone();
            join_set.spawn(async move {
                let _permit = permit;
                let result = cleaner.clean(&child, kind).await;
                (child.id, result)
            });
        }

        let mut failed = 0;
        let mut abort = None;
        while let Some(join_result) = join_set.join_next().await {
            match join_result {
                Err(join_error) => return Err(anyhow!(join_error)),
                Ok((_, Ok(()))) => {}
                Ok((_, Err(e))) if is_authentication_error(&e) => abort = Some(e),
                Ok((_, Err(e))) if is_run_interrupted_error(&e) => {
                    if abort.is_none() {
                        abort = Some(e);
                    }
                }
                Ok((id, Err(e))) => {
                    self.record_failure(id, e);
                    failed += 1;
                }
            }
        }

        if let Some(e) = abort {
            return Err(e);
        }
        if self.context.is_interrupted() {
            return Err(anyhow!(self.context.interruption_error()));
        }
        Ok(failed)
    }

    async fn delete_node(&self, id: &ResourceRef, kind: &'static ResourceKind) -> Result<()> {
        if self.dry_run {
            info!(resource = %id, kind = kind.name, "[dry-run] would delete.");
            self.stats.increment_previewed();
            return Ok(());
        }

        info!(resource = %id, kind = kind.name, "deleting.");
        match self.context.guard(self.deleter.delete(id, kind)).await? {
            DeleteOutcome::NotFound => {
                info!(resource = %id, kind = kind.name, "already gone.");
                self.stats.increment_already_gone();
                return Ok(());
            }
            DeleteOutcome::Deleted => {}
            DeleteOutcome::Accepted(operation) => {
                self.wait_for(&operation, kind).await?;
            }
        }

        self.verify_deleted(id, kind).await?;
        info!(resource = %id, kind = kind.name, "deleted.");
        self.stats.increment_deleted();
        Ok(())
    }

    async fn wait_for(&self, operation: &PendingOperation, kind: &ResourceKind) -> Result<u32> {
        OperationPoller::new(
            self.provider.clone(),
            self.polling_config.poll_interval_for(kind.poll_interval),
            self.polling_config.max_transient_status_failures,
        )
        .poll_until_done(operation, &self.context)
        .await
    }

    /// Re-fetch `id` until it is gone, waiting the settle delay between
    /// attempts. The provider may report success while the resource is
    /// still visible for a short while.
    async fn verify_deleted(&self, id: &ResourceRef, kind: &ResourceKind) -> Result<()> {
        let attempts = self.polling_config.verify_attempts.max(1);
        for attempt in 1..=attempts {
            let current = self
                .context
                .guard(self.provider.get_resource(id, kind))
                .await
                .with_context(|| format!("verifying deletion of {id} failed."))?;
            if current.is_none() {
                return Ok(());
            }
            if attempt < attempts {
                debug!(
                    resource = %id,
                    attempt = attempt,
                    "resource still visible after delete. Waiting to re-verify."
                );
                self.context.sleep(self.polling_config.settle_delay()).await?;
            }
        }
        Err(anyhow!(ArmrmError::StillExists(id.to_string())))
    }

    fn record_failure(&self, resource: ResourceRef, error: anyhow::Error) {
        let message = format!("{error:#}");
        warn!(resource = %resource, error = %message, "cleanup failed.");
        self.stats.increment_failed();
        self.errors.record(resource, error);
    }
}

/// Errors that stop the whole traversal instead of failing one child.
fn aborts_subtree(e: &anyhow::Error) -> bool {
    is_run_interrupted_error(e) || is_authentication_error(e)
}
