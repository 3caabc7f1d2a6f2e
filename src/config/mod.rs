pub mod args;

use std::time::Duration;

use crate::plan::Family;
use crate::types::{ArmCredentials, ArmEnvironment};

/// Main configuration for an armrm-rs cleanup run.
///
/// Holds everything a [`RunCoordinator`](crate::RunCoordinator) needs: the
/// subscription to sweep, the resource group prefix that bounds every
/// mutation, dry-run and max-count safety settings, the families to process,
/// polling behavior and client settings.
///
/// # Quick Start
///
/// ```
/// use armrm_rs::Config;
///
/// let config = Config::for_subscription("00000000-0000-0000-0000-000000000000");
/// assert!(config.cleanup_options.dry_run);
/// assert_eq!(config.cleanup_options.prefix, "acctest");
/// assert_eq!(config.cleanup_options.max_top_level_resources, 1000);
/// ```
///
/// Deletion has to be switched on explicitly:
///
/// ```
/// use armrm_rs::Config;
///
/// let mut config = Config::for_subscription("sub1");
/// config.cleanup_options.dry_run = false;
/// config.cleanup_options.prefix = "acctest-nightly".to_string();
/// config.worker_size = 4;
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub subscription_id: String,
    pub cleanup_options: CleanupOptions,
    /// Families processed, in this order.
    pub families: Vec<Family>,
    pub client_config: Option<ClientConfig>,
    pub polling_config: PollingConfig,
    pub force_retry_config: ForceRetryConfig,
    pub tracing_config: Option<TracingConfig>,
    /// Upper bound on concurrent leaf deletions under one parent.
    pub worker_size: u16,
    pub run_timeout_seconds: u64,
    pub rate_limit_requests: Option<u32>,
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

impl Config {
    /// Create a `Config` with the CLI defaults for the given subscription.
    ///
    /// The result is a dry run over every family. No client configuration is
    /// set; provide [`ClientConfig`] before creating an ARM provider.
    pub fn for_subscription(subscription_id: &str) -> Self {
        Config {
            subscription_id: subscription_id.to_string(),
            ..Config::default()
        }
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            subscription_id: String::new(),
            cleanup_options: CleanupOptions::default(),
            families: Family::ALL.to_vec(),
            client_config: None,
            polling_config: PollingConfig::default(),
            force_retry_config: ForceRetryConfig::default(),
            tracing_config: None,
            worker_size: 8,
            run_timeout_seconds: 6 * 60 * 60,
            rate_limit_requests: None,
            auto_complete_shell: None,
        }
    }
}

/// Safety settings of a run.
#[derive(Debug, Clone)]
pub struct CleanupOptions {
    /// Only resources whose resource group name starts with this prefix
    /// (case-insensitive) are touched.
    pub prefix: String,
    /// When set, nothing is mutated; every would-be deletion is logged.
    pub dry_run: bool,
    /// Upper bound on in-scope top-level resources processed per run.
    pub max_top_level_resources: u64,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        CleanupOptions {
            prefix: "acctest".to_string(),
            dry_run: true,
            max_top_level_resources: 1000,
        }
    }
}

/// Resource manager client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credential: ArmCredentials,
    pub environment: ArmEnvironment,
    /// Overrides the environment's resource manager endpoint.
    pub endpoint_url: Option<String>,
    pub timeout_config: TimeoutConfig,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutConfig {
    pub connect_timeout_milliseconds: Option<u64>,
    pub request_timeout_milliseconds: Option<u64>,
}

/// Long-running operation polling and post-delete verification.
#[derive(Debug, Clone, Copy)]
pub struct PollingConfig {
    /// When set, replaces every kind's own poll interval.
    pub poll_interval_override_milliseconds: Option<u64>,
    /// Wait between re-verifications of a resource that is still visible.
    pub settle_delay_milliseconds: u64,
    pub verify_attempts: u32,
    /// Consecutive 5xx status checks tolerated before an operation fails.
    pub max_transient_status_failures: u32,
}

impl PollingConfig {
    pub fn poll_interval_for(&self, kind_interval: Duration) -> Duration {
        self.poll_interval_override_milliseconds
            .map(Duration::from_millis)
            .unwrap_or(kind_interval)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_milliseconds)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig {
            poll_interval_override_milliseconds: None,
            settle_delay_milliseconds: 10_000,
            verify_attempts: 3,
            max_transient_status_failures: 5,
        }
    }
}

/// Tracing (logging) configuration.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub http_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}

/// Application-level retries of idempotent reads (listings and fetches).
#[derive(Debug, Clone, Copy)]
pub struct ForceRetryConfig {
    pub force_retry_count: u32,
    pub force_retry_interval_milliseconds: u64,
}

impl Default for ForceRetryConfig {
    fn default() -> Self {
        ForceRetryConfig {
            force_retry_count: 5,
            force_retry_interval_milliseconds: 1000,
        }
    }
}
