use anyhow::Result;
use async_trait::async_trait;
use dyn_clone::DynClone;
use leaky_bucket::RateLimiter;
use std::sync::Arc;
use url::Url;

use crate::config::Config;
use crate::plan::ResourceKind;
use crate::types::{ListedResource, ResourceRef};

pub mod arm;

pub const AZURE_ASYNC_OPERATION_HEADER: &str = "Azure-AsyncOperation";
pub const LOCATION_HEADER: &str = "Location";

/// Type alias for a boxed provider trait object.
pub type Provider = Box<dyn ProviderTrait + Send + Sync>;

/// The raw outcome of a mutating call or status check.
///
/// Kept free of HTTP client types so that the deletion primitive and the
/// poller classify responses the same way for the real client and for
/// test doubles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ProviderResponse {
    pub fn new(status: u16) -> Self {
        ProviderResponse {
            status,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Header lookup, case-insensitive on the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `(code, message)` from an ARM `{"error": {"code", "message"}}` body.
    /// Falls back to the raw body when it is not in that shape.
    pub fn error_detail(&self) -> (String, String) {
        #[derive(serde::Deserialize)]
        struct Envelope {
            error: Option<Detail>,
        }
        #[derive(serde::Deserialize)]
        struct Detail {
            #[serde(default)]
            code: String,
            #[serde(default)]
            message: String,
        }

        match serde_json::from_str::<Envelope>(&self.body) {
            Ok(Envelope {
                error: Some(detail),
            }) => (detail.code, detail.message),
            _ => (String::new(), self.body.trim().to_string()),
        }
    }

    pub fn into_error(self) -> crate::types::error::ArmrmError {
        let (code, message) = self.error_detail();
        crate::types::error::ArmrmError::Provider {
            status: self.status,
            code,
            message,
        }
    }
}

/// The provider API boundary.
///
/// Implementations issue exactly one request per mutating call or status
/// check. Listing and fetching may retry internally since they are idempotent.
#[async_trait]
pub trait ProviderTrait: DynClone {
    fn subscription_id(&self) -> &str;

    /// List live instances of `kind` below `parent`.
    ///
    /// A parent that no longer exists yields an empty list. Other failures
    /// are errors.
    async fn list_resources(
        &self,
        parent: &ResourceRef,
        kind: &ResourceKind,
    ) -> Result<Vec<ListedResource>>;

    /// Fetch one resource. `Ok(None)` when it does not exist.
    async fn get_resource(
        &self,
        id: &ResourceRef,
        kind: &ResourceKind,
    ) -> Result<Option<ListedResource>>;

    async fn delete_resource(&self, id: &ResourceRef, kind: &ResourceKind)
    -> Result<ProviderResponse>;

    async fn patch_resource(
        &self,
        id: &ResourceRef,
        kind: &ResourceKind,
        body: serde_json::Value,
    ) -> Result<ProviderResponse>;

    /// POST `{id}/{action}`.
    async fn post_action(
        &self,
        id: &ResourceRef,
        kind: &ResourceKind,
        action: &str,
    ) -> Result<ProviderResponse>;

    /// GET an async-operation locator returned by an earlier call.
    async fn get_operation_status(&self, locator: &Url) -> Result<ProviderResponse>;
}

dyn_clone::clone_trait_object!(ProviderTrait);

// Default refill interval 100ms
const REFILL_PER_INTERVAL_DIVIDER: usize = 10;

pub(crate) fn build_rate_limiter(rate_limit_requests: Option<u32>) -> Option<Arc<RateLimiter>> {
    rate_limit_requests.map(|rate_limit_value| {
        let refill = if (rate_limit_value as usize) <= REFILL_PER_INTERVAL_DIVIDER {
            1
        } else {
            rate_limit_value as usize / REFILL_PER_INTERVAL_DIVIDER
        };
        Arc::new(
            RateLimiter::builder()
                .max(rate_limit_value as usize)
                .initial(rate_limit_value as usize)
                .refill(refill)
                .fair(true)
                .build(),
        )
    })
}

/// Build the resource-manager provider described by `config`.
///
/// Fails when `config` has no client configuration or the HTTP client cannot
/// be constructed. Authentication happens lazily on the first request.
pub async fn create_provider(config: &Config) -> Result<Provider> {
    let provider = arm::ArmProvider::new(config)?;
    Ok(Box::new(provider))
}
