//! Access-token refresh against the `/refresh` endpoint.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::api::envelope::Envelope;
use crate::api::routes;
use crate::api::ApiError;
use crate::config::Config;

/// Fallback message when the refresh endpoint rejects us without one.
const DEFAULT_REFRESH_FAILURE: &str = "Token refresh failed";

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("No refresh token available")]
    MissingRefreshToken,

    #[error("No access token in refresh response")]
    MissingAccessToken,

    #[error("{0}")]
    Rejected(String),

    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    #[error("Network error during token refresh: {0}")]
    Network(#[from] reqwest::Error),
}

/// New credentials minted by the refresh endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct TokenGrant {
    pub access_token: String,
    /// Present only when the server rotates refresh tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenGrant {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }

    /// A grant is usable when its access token is non-empty and fits in an
    /// `Authorization: Bearer` header.
    pub fn check(&self) -> Result<(), RefreshError> {
        if self.access_token.is_empty() {
            return Err(RefreshError::MissingAccessToken);
        }
        header::HeaderValue::from_str(&format!("Bearer {}", self.access_token)).map_err(|_| {
            RefreshError::InvalidResponse("Access token is not a valid header value".to_string())
        })?;
        Ok(())
    }

    /// Read a grant out of a refresh response body.
    ///
    /// The body must be a successful envelope whose `data` holds a non-empty
    /// `access_token`.
    pub fn from_body(body: serde_json::Value) -> Result<Self, RefreshError> {
        let envelope: Envelope<RawGrant> = serde_json::from_value(body)
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

        if !envelope.success {
            return Err(RefreshError::Rejected(
                envelope
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_REFRESH_FAILURE.to_string()),
            ));
        }

        let raw = envelope.data.unwrap_or_default();
        match raw.access_token {
            Some(access_token) if !access_token.is_empty() => Ok(Self {
                access_token,
                refresh_token: raw.refresh_token.filter(|t| !t.is_empty()),
            }),
            _ => Err(RefreshError::MissingAccessToken),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawGrant {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Exchanges a refresh token for a new access token.
///
/// Implementations must not route through `SessionClient`, so a rejected
/// refresh can never recurse into another refresh.
pub trait TokenRefresher: Send + Sync {
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, Result<TokenGrant, RefreshError>>;
}

/// Calls `POST /refresh` with its own plain `reqwest::Client`.
#[derive(Clone)]
pub struct HttpTokenRefresher {
    client: Client,
    base_url: String,
}

impl HttpTokenRefresher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(config.api_url.clone(), config.request_timeout())
    }

    async fn request_grant(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError> {
        let url = format!("{}{}", self.base_url, routes::REFRESH);
        debug!(url = %url, "Requesting new access token");

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = ApiError::server_message(&text)
                .unwrap_or_else(|| DEFAULT_REFRESH_FAILURE.to_string());
            return Err(RefreshError::Rejected(message));
        }

        let body = serde_json::from_str(&text)
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
        TokenGrant::from_body(body)
    }
}

impl TokenRefresher for HttpTokenRefresher {
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, Result<TokenGrant, RefreshError>> {
        Box::pin(self.request_grant(refresh_token))
    }
}
