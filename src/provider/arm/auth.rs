//! Bearer tokens for the resource manager.

use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

use crate::types::error::ArmrmError;
use crate::types::{ArmCredentials, ArmEnvironment, ClientSecret};

// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(300);

enum TokenSource {
    Static(ClientSecret),
    ClientSecret {
        token_url: Url,
        client_id: String,
        secret: ClientSecret,
        scope: String,
    },
}

struct CachedToken {
    token: ClientSecret,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

/// Acquires and caches access tokens for one set of credentials.
pub(crate) struct TokenCredential {
    client: reqwest::Client,
    source: TokenSource,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCredential {
    pub(crate) fn new(
        client: reqwest::Client,
        credentials: &ArmCredentials,
        environment: ArmEnvironment,
        resource_manager_endpoint: &Url,
    ) -> Result<Self> {
        let source = match credentials {
            ArmCredentials::AccessToken(token) => TokenSource::Static(token.clone()),
            ArmCredentials::ClientSecret {
                tenant_id,
                client_id,
                secret,
            } => {
                let token_url = Url::parse(&format!(
                    "{}/{tenant_id}/oauth2/v2.0/token",
                    environment.login_endpoint()
                ))
                .map_err(|e| anyhow!(ArmrmError::InvalidConfig(format!("tenant id: {e}"))))?;
                let audience = resource_manager_endpoint.origin().ascii_serialization();
                TokenSource::ClientSecret {
                    token_url,
                    client_id: client_id.clone(),
                    secret: secret.clone(),
                    scope: format!("{audience}/.default"),
                }
            }
        };

        Ok(TokenCredential {
            client,
            source,
            cached: Mutex::new(None),
        })
    }

    pub(crate) async fn token(&self) -> Result<String> {
        let (token_url, client_id, secret, scope) = match &self.source {
            TokenSource::Static(token) => return Ok(token.expose().to_string()),
            TokenSource::ClientSecret {
                token_url,
                client_id,
                secret,
                scope,
            } => (token_url, client_id, secret, scope),
        };

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.token.expose().to_string());
            }
        }

        tracing::debug!(client_id = client_id, "requesting resource manager token.");
        let response = self
            .client
            .post(token_url.clone())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", secret.expose()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| anyhow!(ArmrmError::Authentication(e.to_string())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!(ArmrmError::Authentication(e.to_string())))?;
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "token request rejected.");
            return Err(anyhow!(ArmrmError::Authentication(format!(
                "token endpoint returned HTTP {}: {}",
                status.as_u16(),
                body.trim()
            ))));
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            anyhow!(ArmrmError::Authentication(format!(
                "decoding token response: {e}"
            )))
        })?;
        let lifetime = parse_expires_in(parsed.expires_in.as_ref());

        let token = parsed.access_token.clone();
        *cached = Some(CachedToken {
            token: ClientSecret::new(parsed.access_token),
            refresh_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        });
        Ok(token)
    }
}

// `expires_in` is a number from the v2 endpoint and a string from some clouds.
fn parse_expires_in(value: Option<&serde_json::Value>) -> Duration {
    let seconds = match value {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    };
    Duration::from_secs(seconds.unwrap_or(3600))
}
