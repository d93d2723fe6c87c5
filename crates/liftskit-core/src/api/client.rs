//! Session-aware API client for the LiftsKit REST API.
//!
//! `SessionClient` exposes the usual HTTP verbs and handles credentials on
//! the way out and the way back:
//!
//! - every outgoing request carries `Authorization: Bearer <access token>`
//!   when one is stored
//! - a `401` starts one refresh through the `TokenRefresher`, then the request
//!   is replayed with the new token
//! - if the refresh cannot happen, credentials are wiped and the user is
//!   routed to login
//!
//! Concurrent requests that hit a `401` each run their own refresh; there is
//! no coalescing, and the store sees last-writer-wins updates.

use std::sync::Arc;

use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

use super::{ApiError, ApiRequest, ApiResponse, RequestAttempt, RequestOptions, ReqwestTransport, Transport};
use crate::auth::{
    CredentialSlot, CredentialStore, HttpTokenRefresher, KeyringStore, LoginRedirect, RefreshError,
    TokenRefresher,
};
use crate::config::Config;

/// API client with bearer injection and one-shot 401 recovery.
/// Clone is cheap - every collaborator is behind an `Arc`.
#[derive(Clone)]
pub struct SessionClient {
    pub(crate) store: Arc<dyn CredentialStore>,
    pub(crate) transport: Arc<dyn Transport>,
    refresher: Arc<dyn TokenRefresher>,
    redirect: Arc<dyn LoginRedirect>,
}

impl SessionClient {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn Transport>,
        refresher: Arc<dyn TokenRefresher>,
        redirect: Arc<dyn LoginRedirect>,
    ) -> Self {
        Self {
            store,
            transport,
            refresher,
            redirect,
        }
    }

    /// Production wiring: keychain credentials, reqwest transport and the
    /// HTTP refresh endpoint, all pointed at `config.api_url`. Pair with
    /// [`ChannelRedirect::from_config`](crate::auth::ChannelRedirect::from_config)
    /// to redirect to `config.login_route`.
    pub fn from_config(config: &Config, redirect: Arc<dyn LoginRedirect>) -> Result<Self, ApiError> {
        Ok(Self::new(
            Arc::new(KeyringStore::new(config.keyring_service.clone())),
            Arc::new(ReqwestTransport::from_config(config)?),
            Arc::new(HttpTokenRefresher::from_config(config)?),
            redirect,
        ))
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T, ApiError> {
        let request = ApiRequest::new(Method::GET, path).with_options(options);
        self.call(request).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let request = ApiRequest::new(Method::POST, path).json(body)?.with_options(options);
        self.call(request).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let request = ApiRequest::new(Method::PUT, path).json(body)?.with_options(options);
        self.call(request).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T, ApiError> {
        let request = ApiRequest::new(Method::DELETE, path).with_options(options);
        self.call(request).await
    }

    async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let path = request.path.clone();
        let response = self.execute(request).await?;
        serde_json::from_value(response.body).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", path, e))
        })
    }

    /// Send a request with session handling and return the raw response.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.dispatch(RequestAttempt::first(request)).await
    }

    /// Send one attempt. A `401` on an attempt that may still be replayed
    /// refreshes the session and sends the replay; any other outcome,
    /// including a `401` on a replay, is returned as-is.
    pub async fn dispatch(&self, attempt: RequestAttempt) -> Result<ApiResponse, ApiError> {
        let mut attempt = attempt;
        loop {
            let attempt_out = self.authorize(attempt).await?;
            let request = attempt_out.request();
            debug!(
                method = %request.method,
                path = %request.path,
                replay = attempt_out.is_replay(),
                "Dispatching request"
            );

            match self.transport.send(request.clone()).await {
                Err(err) if err.is_unauthorized() && attempt_out.can_replay() => {
                    warn!(path = %attempt_out.request().path, "Unauthorized, refreshing access token");
                    let token = self.refresh_session().await?;
                    attempt = attempt_out.replay_with(&token)?;
                }
                Err(err) => {
                    if err.is_unauthorized() {
                        warn!(path = %attempt_out.request().path, "Unauthorized after token refresh");
                    }
                    return Err(err);
                }
                Ok(response) => return Ok(response),
            }
        }
    }

    /// Attach the stored access token. Replays already carry the token the
    /// refresh just minted, so they skip the store.
    async fn authorize(&self, attempt: RequestAttempt) -> Result<RequestAttempt, ApiError> {
        if attempt.is_replay() {
            return Ok(attempt);
        }
        match self.store.get_item(CredentialSlot::AccessToken).await? {
            Some(token) if !token.is_empty() => attempt.with_bearer(&token),
            _ => Ok(attempt),
        }
    }

    /// Mint a new access token, or end the session if that is impossible.
    /// The refresh error, not the original `401`, is what callers see.
    async fn refresh_session(&self) -> Result<String, ApiError> {
        match self.renew_access_token().await {
            Ok(token) => Ok(token),
            Err(err) => {
                error!(error = %err, "Token refresh failed, ending session");
                self.end_session().await;
                Err(err)
            }
        }
    }

    async fn renew_access_token(&self) -> Result<String, ApiError> {
        let refresh_token = self
            .store
            .get_item(CredentialSlot::RefreshToken)
            .await?
            .filter(|t| !t.is_empty())
            .ok_or(RefreshError::MissingRefreshToken)?;

        let grant = self.refresher.refresh(&refresh_token).await?;
        // Never persist a token that could not be sent back as a header
        grant.check()?;

        self.store
            .set_item(CredentialSlot::AccessToken, &grant.access_token)
            .await?;
        if let Some(ref rotated) = grant.refresh_token {
            self.store.set_item(CredentialSlot::RefreshToken, rotated).await?;
        }
        debug!("Access token refreshed");

        Ok(grant.access_token)
    }

    /// Wipe every credential slot and route to login.
    async fn end_session(&self) {
        if let Err(e) = self.store.clear_all().await {
            error!(error = %e, "Failed to clear stored credentials");
        }
        self.redirect.redirect_to_login();
    }
}
