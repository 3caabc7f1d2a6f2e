use crate::config::{
    CleanupOptions, ClientConfig, Config, ForceRetryConfig, PollingConfig, TimeoutConfig,
    TracingConfig,
};
use crate::plan::Family;
use crate::types::{ArmCredentials, ArmEnvironment, ClientSecret};
use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::ffi::OsString;
use url::Url;


// ---------------------------------------------------------------------------
// Default constants
// ---------------------------------------------------------------------------

const DEFAULT_PREFIX: &str = "acctest";
const DEFAULT_ACTUALLY_DELETE: bool = false;
const DEFAULT_MAX_RESOURCES: u64 = 1000;
const DEFAULT_WORKER_SIZE: u16 = 8;
const DEFAULT_RUN_TIMEOUT_SECONDS: u64 = 6 * 60 * 60;
const DEFAULT_SETTLE_DELAY_MILLISECONDS: u64 = 10_000;
const DEFAULT_VERIFY_ATTEMPTS: u32 = 3;
const DEFAULT_MAX_TRANSIENT_STATUS_FAILURES: u32 = 5;
const DEFAULT_FORCE_RETRY_COUNT: u32 = 5;
const DEFAULT_FORCE_RETRY_INTERVAL_MILLISECONDS: u64 = 1000;
const DEFAULT_ENVIRONMENT: &str = "public";
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_HTTP_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;

// ---------------------------------------------------------------------------
// Error messages
// ---------------------------------------------------------------------------

const ERROR_MESSAGE_SUBSCRIPTION_REQUIRED: &str =
    "A subscription id is required (--subscription-id or ARM_SUBSCRIPTION_ID).";
const ERROR_MESSAGE_EMPTY_PREFIX: &str =
    "The resource group prefix must not be empty; an empty prefix would match every resource group.";
const ERROR_MESSAGE_WORKER_SIZE_ZERO: &str = "Worker size must be at least 1.";
const ERROR_MESSAGE_MAX_RESOURCES_ZERO: &str = "Max resources must be at least 1.";
const ERROR_MESSAGE_RUN_TIMEOUT_ZERO: &str = "Run timeout must be at least 1 second.";
const ERROR_MESSAGE_VERIFY_ATTEMPTS_ZERO: &str = "Verify attempts must be at least 1.";
const ERROR_MESSAGE_RATE_LIMIT_ZERO: &str = "Rate limit must be at least 1 request per second.";
const ERROR_MESSAGE_POLL_INTERVAL_ZERO: &str = "Poll interval must be at least 1 millisecond.";
const ERROR_MESSAGE_CREDENTIALS_REQUIRED: &str = "Credentials are required: set ARM_ACCESS_TOKEN, or ARM_TENANT_ID, ARM_CLIENT_ID and ARM_CLIENT_SECRET.";
const ERROR_MESSAGE_CREDENTIALS_INCOMPLETE: &str =
    "Client credentials are incomplete: ARM_TENANT_ID, ARM_CLIENT_ID and ARM_CLIENT_SECRET must all be set.";
const ERROR_MESSAGE_INVALID_SCHEME: &str = "URL scheme must be https:// or http://";

// ---------------------------------------------------------------------------
// Value parser helpers
// ---------------------------------------------------------------------------

fn check_endpoint_url(s: &str) -> Result<String, String> {
    let parsed = Url::parse(s).map_err(|e| e.to_string())?;
    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(ERROR_MESSAGE_INVALID_SCHEME.to_string());
    }
    Ok(s.to_string())
}

fn parse_environment(s: &str) -> Result<ArmEnvironment, String> {
    s.parse()
}

// ---------------------------------------------------------------------------
// CLIArgs (clap-derived argument struct)
// ---------------------------------------------------------------------------

/// armrm - Azure test resource cleanup.
///
/// Deletes leftover acceptance-test resources (NetApp accounts, Recovery
/// Services vaults, Storage Sync services, Event Hubs and Notification Hubs
/// namespaces, and resource groups) whose resource group name starts with a
/// prefix, tearing down nested resources first.
/// Runs in preview mode unless deletion is explicitly enabled.
///
/// Example:
///   armrm --prefix acctest
///   YES_I_REALLY_WANT_TO_DELETE_THINGS=true armrm --prefix acctest --family netapp -v
#[derive(Parser, Clone, Debug)]
#[command(name = "armrm", version, about, long_about = None)]
pub struct CLIArgs {
    // -----------------------------------------------------------------------
    // General options
    // -----------------------------------------------------------------------
    /// Only resource groups whose name starts with this prefix (case-insensitive) are cleaned.
    #[arg(long, env = "ARMRM_PREFIX", default_value = DEFAULT_PREFIX, help_heading = "General")]
    pub prefix: String,

    /// Actually delete resources. Without it every deletion is only logged.
    #[arg(
        long,
        env = "YES_I_REALLY_WANT_TO_DELETE_THINGS",
        default_value_t = DEFAULT_ACTUALLY_DELETE,
        help_heading = "General"
    )]
    pub actually_delete: bool,

    /// Resource families to clean, in order. Default: all, resource groups last.
    #[arg(
        long = "family",
        env = "ARMRM_FAMILIES",
        value_enum,
        value_delimiter = ',',
        help_heading = "General"
    )]
    pub families: Vec<Family>,

    // -----------------------------------------------------------------------
    // Safety options
    // -----------------------------------------------------------------------
    /// Maximum number of in-scope top-level resources processed in one run. Default: 1000.
    #[arg(long, env, default_value_t = DEFAULT_MAX_RESOURCES, help_heading = "Safety")]
    pub max_resources: u64,

    /// Overall run deadline in seconds. Default: 21600 (6 hours).
    #[arg(long, env, default_value_t = DEFAULT_RUN_TIMEOUT_SECONDS, help_heading = "Safety")]
    pub run_timeout_seconds: u64,

    // -----------------------------------------------------------------------
    // Azure options
    // -----------------------------------------------------------------------
    /// Subscription to clean.
    #[arg(long, env = "ARM_SUBSCRIPTION_ID", value_parser = NonEmptyStringValueParser::new(), help_heading = "Azure")]
    pub subscription_id: Option<String>,

    /// Azure AD tenant used for client-credentials authentication.
    #[arg(long, env = "ARM_TENANT_ID", value_parser = NonEmptyStringValueParser::new(), help_heading = "Azure")]
    pub tenant_id: Option<String>,

    /// Service principal application id.
    #[arg(long, env = "ARM_CLIENT_ID", value_parser = NonEmptyStringValueParser::new(), help_heading = "Azure")]
    pub client_id: Option<String>,

    /// Service principal secret.
    #[arg(
        long,
        env = "ARM_CLIENT_SECRET",
        hide_env_values = true,
        value_parser = NonEmptyStringValueParser::new(),
        help_heading = "Azure"
    )]
    pub client_secret: Option<String>,

    /// Pre-acquired bearer token. Takes precedence over client credentials.
    #[arg(
        long,
        env = "ARM_ACCESS_TOKEN",
        hide_env_values = true,
        value_parser = NonEmptyStringValueParser::new(),
        help_heading = "Azure"
    )]
    pub access_token: Option<String>,

    /// Azure cloud: public, usgovernment or china.
    #[arg(
        long,
        env = "ARM_ENVIRONMENT",
        default_value = DEFAULT_ENVIRONMENT,
        value_parser = parse_environment,
        help_heading = "Azure"
    )]
    pub environment: ArmEnvironment,

    /// Custom resource manager endpoint URL.
    #[arg(long, env = "ARM_ENDPOINT", value_parser = check_endpoint_url, help_heading = "Azure")]
    pub endpoint_url: Option<String>,

    // -----------------------------------------------------------------------
    // Performance options
    // -----------------------------------------------------------------------
    /// Number of concurrent leaf deletions under one parent. Default: 8.
    #[arg(long, env, default_value_t = DEFAULT_WORKER_SIZE, help_heading = "Performance")]
    pub worker_size: u16,

    /// Maximum resource manager requests per second.
    #[arg(long, env, help_heading = "Performance")]
    pub rate_limit_requests: Option<u32>,

    // -----------------------------------------------------------------------
    // Polling options
    // -----------------------------------------------------------------------
    /// Poll interval in ms for long-running operations. Default: per resource kind.
    #[arg(long, env, help_heading = "Polling")]
    pub poll_interval_milliseconds: Option<u64>,

    /// Wait in ms before re-checking a resource that is still visible after delete. Default: 10000.
    #[arg(long, env, default_value_t = DEFAULT_SETTLE_DELAY_MILLISECONDS, help_heading = "Polling")]
    pub settle_delay_milliseconds: u64,

    /// Number of existence checks after a delete completes. Default: 3.
    #[arg(long, env, default_value_t = DEFAULT_VERIFY_ATTEMPTS, help_heading = "Polling")]
    pub verify_attempts: u32,

    /// Consecutive failed status checks tolerated per operation. Default: 5.
    #[arg(long, env, default_value_t = DEFAULT_MAX_TRANSIENT_STATUS_FAILURES, help_heading = "Polling")]
    pub max_transient_status_failures: u32,

    // -----------------------------------------------------------------------
    // Logging options
    // -----------------------------------------------------------------------
    /// Verbosity level. -q (quiet), default (normal), -v, -vv, -vvv.
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Output logs in JSON format.
    #[arg(long, env, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Logging")]
    pub json_tracing: bool,

    /// Enable HTTP client tracing.
    #[arg(long, env, default_value_t = DEFAULT_HTTP_TRACING, help_heading = "Logging")]
    pub http_tracing: bool,

    /// Enable tracing span events.
    #[arg(long, env, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Logging")]
    pub span_events_tracing: bool,

    /// Disable colored output in logs.
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Logging")]
    pub disable_color_tracing: bool,

    // -----------------------------------------------------------------------
    // Retry options
    // -----------------------------------------------------------------------
    /// Number of retries of idempotent reads (listings and fetches). Default: 5.
    #[arg(long, env, default_value_t = DEFAULT_FORCE_RETRY_COUNT, help_heading = "Retry")]
    pub force_retry_count: u32,

    /// Interval in ms between read retries. Default: 1000.
    #[arg(long, env, default_value_t = DEFAULT_FORCE_RETRY_INTERVAL_MILLISECONDS, help_heading = "Retry")]
    pub force_retry_interval_milliseconds: u64,

    // -----------------------------------------------------------------------
    // Timeout options
    // -----------------------------------------------------------------------
    /// Connection timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub connect_timeout_milliseconds: Option<u64>,

    /// Per-request timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub request_timeout_milliseconds: Option<u64>,

    // -----------------------------------------------------------------------
    // Advanced options
    // -----------------------------------------------------------------------
    /// Generate shell completions.
    #[arg(long, env, help_heading = "Advanced")]
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

// ---------------------------------------------------------------------------
// parse_from_args (public API)
// ---------------------------------------------------------------------------

/// Parse command-line arguments into a `CLIArgs` struct.
///
/// # Example
///
/// ```
/// use armrm_rs::config::args::parse_from_args;
///
/// let args = vec!["armrm", "--prefix", "acctest-nightly", "--family", "netapp"];
/// let cli_args = parse_from_args(args).unwrap();
/// assert_eq!(cli_args.prefix, "acctest-nightly");
/// ```
pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

/// Parse arguments and build a Config in one step.
///
/// Combines `parse_from_args` and `Config::try_from`.
pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    Config::try_from(cli_args)
}

// ---------------------------------------------------------------------------
// Validation and Config conversion
// ---------------------------------------------------------------------------

impl CLIArgs {
    fn validate(&self) -> Result<(), String> {
        if self.prefix.trim().is_empty() {
            return Err(ERROR_MESSAGE_EMPTY_PREFIX.to_string());
        }
        if self.worker_size == 0 {
            return Err(ERROR_MESSAGE_WORKER_SIZE_ZERO.to_string());
        }
        if self.max_resources == 0 {
            return Err(ERROR_MESSAGE_MAX_RESOURCES_ZERO.to_string());
        }
        if self.run_timeout_seconds == 0 {
            return Err(ERROR_MESSAGE_RUN_TIMEOUT_ZERO.to_string());
        }
        if self.verify_attempts == 0 {
            return Err(ERROR_MESSAGE_VERIFY_ATTEMPTS_ZERO.to_string());
        }
        if self.rate_limit_requests == Some(0) {
            return Err(ERROR_MESSAGE_RATE_LIMIT_ZERO.to_string());
        }
        if self.poll_interval_milliseconds == Some(0) {
            return Err(ERROR_MESSAGE_POLL_INTERVAL_ZERO.to_string());
        }
        Ok(())
    }

    fn build_credentials(&self) -> Result<ArmCredentials, String> {
        if let Some(ref token) = self.access_token {
            return Ok(ArmCredentials::AccessToken(ClientSecret::new(token.clone())));
        }

        match (&self.tenant_id, &self.client_id, &self.client_secret) {
            (Some(tenant_id), Some(client_id), Some(secret)) => Ok(ArmCredentials::ClientSecret {
                tenant_id: tenant_id.clone(),
                client_id: client_id.clone(),
                secret: ClientSecret::new(secret.clone()),
            }),
            (None, None, None) => Err(ERROR_MESSAGE_CREDENTIALS_REQUIRED.to_string()),
            _ => Err(ERROR_MESSAGE_CREDENTIALS_INCOMPLETE.to_string()),
        }
    }

    fn build_client_config(&self) -> Result<ClientConfig, String> {
        Ok(ClientConfig {
            credential: self.build_credentials()?,
            environment: self.environment,
            endpoint_url: self.endpoint_url.clone(),
            timeout_config: TimeoutConfig {
                connect_timeout_milliseconds: self.connect_timeout_milliseconds,
                request_timeout_milliseconds: self.request_timeout_milliseconds,
            },
        })
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        let log_level = self.verbosity.log_level()?;

        Some(TracingConfig {
            tracing_level: log_level,
            json_tracing: self.json_tracing,
            http_tracing: self.http_tracing,
            span_events_tracing: self.span_events_tracing,
            disable_color_tracing: self.disable_color_tracing,
        })
    }

    fn build_families(&self) -> Vec<Family> {
        if self.families.is_empty() {
            return Family::ALL.to_vec();
        }
        let mut families = Vec::with_capacity(self.families.len());
        for family in &self.families {
            if !families.contains(family) {
                families.push(*family);
            }
        }
        families
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(args: CLIArgs) -> Result<Self, Self::Error> {
        // Completion generation needs neither a subscription nor credentials.
        if args.auto_complete_shell.is_some() {
            return Ok(Config {
                tracing_config: args.build_tracing_config(),
                auto_complete_shell: args.auto_complete_shell,
                ..Config::default()
            });
        }

        args.validate()?;

        let subscription_id = args
            .subscription_id
            .clone()
            .ok_or_else(|| ERROR_MESSAGE_SUBSCRIPTION_REQUIRED.to_string())?;
        let client_config = args.build_client_config()?;
        let tracing_config = args.build_tracing_config();

        Ok(Config {
            subscription_id,
            cleanup_options: CleanupOptions {
                prefix: args.prefix.clone(),
                dry_run: !args.actually_delete,
                max_top_level_resources: args.max_resources,
            },
            families: args.build_families(),
            client_config: Some(client_config),
            polling_config: PollingConfig {
                poll_interval_override_milliseconds: args.poll_interval_milliseconds,
                settle_delay_milliseconds: args.settle_delay_milliseconds,
                verify_attempts: args.verify_attempts,
                max_transient_status_failures: args.max_transient_status_failures,
            },
            force_retry_config: ForceRetryConfig {
                force_retry_count: args.force_retry_count,
                force_retry_interval_milliseconds: args.force_retry_interval_milliseconds,
            },
            tracing_config,
            worker_size: args.worker_size,
            run_timeout_seconds: args.run_timeout_seconds,
            rate_limit_requests: args.rate_limit_requests,
            auto_complete_shell: None,
        })
    }
}
