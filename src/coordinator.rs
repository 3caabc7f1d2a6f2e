//! Run coordinator.
//!
//! Enumerates the top-level resources of every configured family, drops the
//! ones outside the resource group prefix and hands each remaining resource
//! to the [`SubtreeCleaner`]. Per-resource failures end up in the
//! [`ErrorAggregate`]; only run-level failures (a top-level listing that
//! cannot be performed, or an authentication failure) are returned as errors.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, info, warn};

use crate::cleaner::SubtreeCleaner;
use crate::config::Config;
use crate::plan::Family;
use crate::provider::Provider;
use crate::safety::SafetyChecker;
use crate::types::error::{is_authentication_error, is_run_interrupted_error};
use crate::types::token::{RunCancellationToken, RunContext};
use crate::types::{CleanupStats, CleanupStatsReport, ErrorAggregate, ResourceRef};

/// Drives one cleanup run over a subscription.
///
/// ## Usage
///
/// ```no_run
/// # async fn example() -> anyhow::Result<()> {
/// # use armrm_rs::{Config, RunCoordinator, create_provider, create_run_cancellation_token};
/// # let config: Config = todo!();
/// let provider = create_provider(&config).await?;
/// let mut coordinator =
///     RunCoordinator::new(config, provider, create_run_cancellation_token());
/// let errors = coordinator.run().await?;
/// for message in errors.messages() {
///     eprintln!("{message}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct RunCoordinator {
    config: Config,
    provider: Provider,
    context: RunContext,
    safety_checker: SafetyChecker,
    stats: Arc<CleanupStatsReport>,
    errors: ErrorAggregate,
    ready: bool,
}

enum Flow {
    Continue,
    Stop,
}

impl RunCoordinator {
    /// The run deadline starts counting when the coordinator is created.
    pub fn new(config: Config, provider: Provider, cancellation_token: RunCancellationToken) -> Self {
        let context = RunContext::new(cancellation_token, config.run_timeout());
        RunCoordinator {
            safety_checker: SafetyChecker::new(&config),
            config,
            provider,
            context,
            stats: Arc::new(CleanupStatsReport::new()),
            errors: ErrorAggregate::new(),
            ready: true,
        }
    }

    /// Run the cleanup and return every recorded failure.
    ///
    /// An empty aggregate means every in-scope resource was deleted (or
    /// previewed in dry-run mode). Must be called only once.
    pub async fn run(&mut self) -> Result<ErrorAggregate> {
        assert!(self.ready, "RunCoordinator::run() called more than once");
        self.ready = false;

        self.safety_checker.log_run_mode();
        let cleaner = SubtreeCleaner::new(
            &self.config,
            self.provider.clone(),
            self.context.clone(),
            self.stats.clone(),
            self.errors.clone(),
        );

        let mut started = 0;
        for family in self.config.families.clone() {
            if let Flow::Stop = self.run_family(family, &cleaner, &mut started).await? {
                break;
            }
        }

        self.log_summary();
        Ok(self.errors.clone())
    }

    pub fn stats(&self) -> CleanupStats {
        self.stats.snapshot()
    }

    pub fn errors(&self) -> &ErrorAggregate {
        &self.errors
    }

    async fn run_family(
        &self,
        family: Family,
        cleaner: &SubtreeCleaner,
        started: &mut u64,
    ) -> Result<Flow> {
        let plan = family.plan();
        let subscription = ResourceRef::for_subscription(self.provider.subscription_id());

        if self.context.is_interrupted() {
            self.record_interruption(&subscription, anyhow!(self.context.interruption_error()));
            return Ok(Flow::Stop);
        }

        let resources = match self
            .context
            .guard(self.provider.list_resources(&subscription, plan.root))
            .await
        {
            Ok(resources) => resources,
            Err(e) if is_run_interrupted_error(&e) => {
                self.record_interruption(&subscription, e);
                return Ok(Flow::Stop);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("listing {} failed.", plan.root.name));
            }
        };
        info!(
            family = %family,
            count = resources.len(),
            "listed top-level resources."
        );

        let max = self.config.cleanup_options.max_top_level_resources;
        let mut remaining = resources.into_iter();
        while let Some(resource) = remaining.next() {
            if !self.safety_checker.is_in_scope(&resource.id) {
                debug!(
                    resource = %resource.id,
                    prefix = self.safety_checker.prefix(),
                    "skipped. resource group does not match prefix."
                );
                self.stats.increment_skipped();
                continue;
            }

            if *started >= max {
                warn!(
                    max_resources = max,
                    "maximum number of top-level resources reached. Remaining resources are left for the next run."
                );
                return Ok(Flow::Stop);
            }

            if self.context.is_interrupted() {
                let not_attempted = 1 + remaining.len();
                self.record_interruption(&resource.id, anyhow!(self.context.interruption_error()));
                warn!(
                    family = %family,
                    not_attempted = not_attempted,
                    "run interrupted. Remaining resources were not attempted."
                );
                return Ok(Flow::Stop);
            }

            *started += 1;
            match cleaner.clean(&resource, plan.root).await {
                Ok(()) => {}
                Err(e) if is_run_interrupted_error(&e) => {
                    self.record_interruption(&resource.id, e);
                    warn!(
                        family = %family,
                        not_attempted = remaining.len(),
                        "run interrupted. Remaining resources were not attempted."
                    );
                    return Ok(Flow::Stop);
                }
                Err(e) if is_authentication_error(&e) => return Err(e),
                Err(e) => {
                    let message = format!("{e:#}");
                    warn!(resource = %resource.id, error = %message, "cleanup failed.");
                    self.stats.increment_failed();
                    self.errors.record(resource.id.clone(), e);
                }
            }
        }

        Ok(Flow::Continue)
    }

    fn record_interruption(&self, resource: &ResourceRef, error: anyhow::Error) {
        let message = format!("{error:#}");
        warn!(resource = %resource, error = %message, "cleanup interrupted.");
        self.stats.increment_failed();
        self.errors.record(resource.clone(), error);
    }

    fn log_summary(&self) {
        let stats = self.stats.snapshot();
        info!(
            deleted = stats.deleted,
            already_gone = stats.already_gone,
            previewed = stats.previewed,
            skipped = stats.skipped,
            failed = stats.failed,
            "cleanup finished."
        );
        for message in self.errors.messages() {
            error!("{message}");
        }
    }
}
