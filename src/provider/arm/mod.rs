use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use leaky_bucket::RateLimiter;
use reqwest::Method;
use serde::Deserialize;
use url::Url;

use crate::config::{Config, ForceRetryConfig};
use crate::plan::ResourceKind;
use crate::provider::{ProviderResponse, ProviderTrait, build_rate_limiter};
use crate::types::error::{ArmrmError, is_retryable_status};
use crate::types::{ListedResource, ResourceRef};

mod auth;

use auth::TokenCredential;

const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// Azure Resource Manager over HTTPS.
///
/// Listing and fetching are retried on throttling, 5xx and network errors
/// according to [`ForceRetryConfig`]. Deletes, patches, actions and status
/// checks are sent exactly once and their responses handed back unclassified.
#[derive(Clone)]
pub struct ArmProvider {
    client: reqwest::Client,
    endpoint: Url,
    subscription_id: String,
    credential: Arc<TokenCredential>,
    rate_limit_requests: Option<Arc<RateLimiter>>,
    force_retry_config: ForceRetryConfig,
}

#[derive(Deserialize)]
struct RawListPage {
    #[serde(default)]
    value: Vec<RawResource>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
}

#[derive(Deserialize)]
struct RawResource {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    properties: serde_json::Value,
}

impl ArmProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let client_config = config.client_config.as_ref().ok_or_else(|| {
            anyhow!(ArmrmError::InvalidConfig(
                "client configuration is required to reach the resource manager".to_string()
            ))
        })?;

        let endpoint = client_config
            .endpoint_url
            .as_deref()
            .unwrap_or(client_config.environment.resource_manager_endpoint());
        let endpoint = Url::parse(endpoint).map_err(|e| {
            anyhow!(ArmrmError::InvalidConfig(format!(
                "resource manager endpoint {endpoint:?}: {e}"
            )))
        })?;

        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = client_config.timeout_config.connect_timeout_milliseconds {
            builder = builder.connect_timeout(Duration::from_millis(timeout));
        }
        if let Some(timeout) = client_config.timeout_config.request_timeout_milliseconds {
            builder = builder.timeout(Duration::from_millis(timeout));
        }
        let client = builder.build().context("building HTTP client failed.")?;

        let credential = TokenCredential::new(
            client.clone(),
            &client_config.credential,
            client_config.environment,
            &endpoint,
        )?;

        Ok(ArmProvider {
            client,
            endpoint,
            subscription_id: config.subscription_id.clone(),
            credential: Arc::new(credential),
            rate_limit_requests: build_rate_limiter(config.rate_limit_requests),
            force_retry_config: config.force_retry_config,
        })
    }

    fn resource_url(&self, path: &str, api_version: &str, parameters: &[(&str, &str)]) -> Url {
        let mut url = self.endpoint.clone();
        url.set_path(path);
        {
            let mut query = url.query_pairs_mut();
            query.clear().append_pair("api-version", api_version);
            for (key, value) in parameters {
                query.append_pair(key, value);
            }
        }
        url
    }

    async fn exec_rate_limit_requests_per_sec(&self) {
        if let Some(ref rate_limiter) = self.rate_limit_requests {
            rate_limiter.acquire_one().await;
        }
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<ProviderResponse> {
        self.exec_rate_limit_requests_per_sec().await;

        let token = self.credential.token().await?;
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::trace!(
            method = %method,
            url = %url,
            request_id = request_id,
            "sending resource manager request."
        );

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .bearer_auth(token)
            .header(CLIENT_REQUEST_ID_HEADER, &request_id);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("{method} {} failed.", url.path()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .text()
            .await
            .with_context(|| format!("reading response of {method} {} failed.", url.path()))?;

        Ok(ProviderResponse {
            status,
            headers,
            body,
        })
    }

    async fn send_idempotent(&self, url: Url) -> Result<ProviderResponse> {
        let max_attempts = self.force_retry_config.force_retry_count + 1;
        let interval =
            Duration::from_millis(self.force_retry_config.force_retry_interval_milliseconds);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self.send(Method::GET, url.clone(), None).await;
            // Transport failures carry no ArmrmError and are retried.
            let retryable = match &result {
                Ok(response) => is_retryable_status(response.status),
                Err(e) => e
                    .downcast_ref::<ArmrmError>()
                    .is_none_or(ArmrmError::is_retryable),
            };
            if !retryable || attempt >= max_attempts {
                return result;
            }

            match &result {
                Ok(response) => tracing::warn!(
                    url = %url.path(),
                    status = response.status,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    "GET {} returned HTTP {}. Retrying.",
                    url.path(),
                    response.status,
                ),
                Err(e) => tracing::warn!(
                    url = %url.path(),
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = %e,
                    "GET {} failed. Retrying.",
                    url.path(),
                ),
            }
            tokio::time::sleep(interval).await;
        }
    }
}

fn decode_resource(raw: RawResource, fallback: Option<&ResourceRef>) -> Result<Option<ListedResource>> {
    let id = match (raw.id, fallback) {
        (Some(id), _) => id
            .parse::<ResourceRef>()
            .with_context(|| format!("decoding resource id {id:?} failed."))?,
        (None, Some(fallback)) => fallback.clone(),
        (None, None) => return Ok(None),
    };
    Ok(Some(ListedResource::with_properties(id, raw.properties)))
}

#[async_trait]
impl ProviderTrait for ArmProvider {
    fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    async fn list_resources(
        &self,
        parent: &ResourceRef,
        kind: &ResourceKind,
    ) -> Result<Vec<ListedResource>> {
        let mut url = self.resource_url(&kind.collection_path(parent), kind.api_version, &[]);
        let mut resources = Vec::new();
        let mut first_page = true;

        loop {
            let response = self.send_idempotent(url.clone()).await?;
            if response.status == 404 && first_page {
                tracing::debug!(parent = %parent, kind = kind.name, "parent no longer exists.");
                return Ok(resources);
            }
            if !response.is_success() {
                return Err(anyhow!(response.into_error())
                    .context(format!("listing {} under {parent} failed.", kind.name)));
            }

            let page: RawListPage = serde_json::from_str(&response.body)
                .with_context(|| format!("decoding {} listing under {parent} failed.", kind.name))?;
            for raw in page.value {
                if let Some(resource) = decode_resource(raw, None)? {
                    resources.push(resource);
                }
            }

            match page.next_link.filter(|link| !link.is_empty()) {
                Some(link) => {
                    url = Url::parse(&link)
                        .with_context(|| format!("invalid nextLink {link:?}."))?;
                    first_page = false;
                }
                None => break,
            }
        }

        tracing::debug!(
            parent = %parent,
            kind = kind.name,
            count = resources.len(),
            "listed resources."
        );
        Ok(resources)
    }

    async fn get_resource(
        &self,
        id: &ResourceRef,
        kind: &ResourceKind,
    ) -> Result<Option<ListedResource>> {
        let url = self.resource_url(&id.to_string(), kind.api_version, &[]);
        let response = self.send_idempotent(url).await?;
        if response.status == 404 {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(anyhow!(response.into_error()).context(format!("fetching {id} failed.")));
        }

        let raw: RawResource = serde_json::from_str(&response.body)
            .with_context(|| format!("decoding {id} failed."))?;
        decode_resource(raw, Some(id))
    }

    async fn delete_resource(
        &self,
        id: &ResourceRef,
        kind: &ResourceKind,
    ) -> Result<ProviderResponse> {
        let url = self.resource_url(&id.to_string(), kind.api_version, kind.delete_parameters);
        self.send(Method::DELETE, url, None).await
    }

    async fn patch_resource(
        &self,
        id: &ResourceRef,
        kind: &ResourceKind,
        body: serde_json::Value,
    ) -> Result<ProviderResponse> {
        let url = self.resource_url(&id.to_string(), kind.api_version, &[]);
        self.send(Method::PATCH, url, Some(body)).await
    }

    async fn post_action(
        &self,
        id: &ResourceRef,
        kind: &ResourceKind,
        action: &str,
    ) -> Result<ProviderResponse> {
        let url = self.resource_url(&format!("{id}/{action}"), kind.api_version, &[]);
        self.send(Method::POST, url, None).await
    }

    async fn get_operation_status(&self, locator: &Url) -> Result<ProviderResponse> {
        self.send(Method::GET, locator.clone(), None).await
    }
}
