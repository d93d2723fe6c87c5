//! Session lifecycle: login, signup and logout.
//!
//! These calls go straight to the transport. A `401` from `/login` means bad
//! credentials, not an expired token, so it must never start a refresh.

use reqwest::Method;
use serde::Serialize;
use tracing::{info, warn};

use super::envelope::unwrap_envelope;
use super::{routes, ApiError, ApiRequest, RequestAttempt, SessionClient};
use crate::auth::{CredentialSlot, TokenGrant};

const LOGIN_FAILURE: &str = "Authentication failed";
const SIGNUP_FAILURE: &str = "Registration failed";

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignupRequest<'a> {
    password: &'a str,
    email: &'a str,
}

impl SessionClient {
    /// Log in and store the returned access and refresh tokens.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenGrant, ApiError> {
        let request = ApiRequest::new(Method::POST, routes::LOGIN)
            .json(&LoginRequest { username, password })?;
        let grant = self.open_session(request, LOGIN_FAILURE).await?;
        info!(username = %username, "Logged in");
        Ok(grant)
    }

    /// Register a new account and store its tokens.
    pub async fn signup(&self, username: &str, password: &str, email: &str) -> Result<TokenGrant, ApiError> {
        let path = routes::build_path(routes::SIGNUP, &[username])?;
        let request = ApiRequest::new(Method::POST, path).json(&SignupRequest { password, email })?;
        let grant = self.open_session(request, SIGNUP_FAILURE).await?;
        info!(username = %username, "Registered new account");
        Ok(grant)
    }

    /// Tell the server we are leaving, then wipe local credentials.
    /// Server errors are logged and ignored; local credentials always go.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let attempt = RequestAttempt::first(ApiRequest::new(Method::POST, routes::LOGOUT));
        let attempt = match self.store.get_item(CredentialSlot::AccessToken).await {
            Ok(Some(token)) if !token.is_empty() => match attempt.clone().with_bearer(&token) {
                Ok(authorized) => authorized,
                Err(e) => {
                    warn!(error = %e, "Stored access token unusable, logging out without it");
                    attempt
                }
            },
            Ok(_) => attempt,
            Err(e) => {
                warn!(error = %e, "Could not read access token, logging out without it");
                attempt
            }
        };
        if let Err(e) = self.transport.send(attempt.into_request()).await {
            warn!(error = %e, "Server logout failed, clearing local session anyway");
        }

        self.store.clear_all().await?;
        info!("Logged out");
        Ok(())
    }

    /// Whether an access token is stored. Says nothing about its validity.
    pub async fn is_authenticated(&self) -> Result<bool, ApiError> {
        Ok(self
            .store
            .get_item(CredentialSlot::AccessToken)
            .await?
            .is_some_and(|t| !t.is_empty()))
    }

    async fn open_session(&self, request: ApiRequest, fallback: &str) -> Result<TokenGrant, ApiError> {
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| Self::session_failure(e, fallback))?;

        let grant: TokenGrant = unwrap_envelope(response.body)?;
        if grant.access_token.is_empty() {
            return Err(ApiError::InvalidResponse("Login response has no access token".to_string()));
        }

        self.store
            .set_item(CredentialSlot::AccessToken, &grant.access_token)
            .await?;
        match grant.refresh_token {
            Some(ref refresh_token) => {
                self.store
                    .set_item(CredentialSlot::RefreshToken, refresh_token)
                    .await?
            }
            None => warn!("Login response has no refresh token; session cannot be renewed"),
        }

        Ok(grant)
    }

    /// A client-side status error surfaces the server's `message`, or
    /// `fallback` when it sent none. Everything else passes through.
    fn session_failure(err: ApiError, fallback: &str) -> ApiError {
        let message = match err {
            ApiError::Unauthorized(message) | ApiError::Status { message, .. } => message,
            ApiError::AccessDenied(detail) | ApiError::NotFound(detail) => Some(detail),
            ApiError::RateLimited | ApiError::InvalidResponse(_) => None,
            other => return other,
        };
        ApiError::Rejected(
            message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| fallback.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::tests::{ok, FakeRefresher, FakeTransport, Harness};
    use crate::auth::{CredentialStore, MemoryStore, StoreError};
    use futures::future::BoxFuture;
    use std::sync::Arc;
    use reqwest::header::AUTHORIZATION;
    use serde_json::json;

    #[tokio::test]
    async fn test_login_stores_tokens() {
        let h = Harness::new(
            MemoryStore::new(),
            FakeTransport::new(|_, _| {
                Ok(ok(json!({
                    "success": true,
                    "data": {"access_token": "a1", "refresh_token": "r1", "username": "ana"}
                })))
            }),
            FakeRefresher::granting("unused"),
        );

        let grant = h.client.login("ana", "hunter2").await.unwrap();
        assert_eq!(grant.access_token, "a1");
        assert!(h.client.is_authenticated().await.unwrap());
        assert_eq!(h.slot(CredentialSlot::RefreshToken).await.as_deref(), Some("r1"));

        let sent = h.transport.sent();
        assert_eq!(sent[0].path, "/login");
        assert_eq!(sent[0].body, Some(json!({"username": "ana", "password": "hunter2"})));
    }

    #[tokio::test]
    async fn test_bad_password_does_not_refresh() {
        let h = Harness::new(
            MemoryStore::with_tokens("old", "r0"),
            FakeTransport::new(|_, _| Err(ApiError::Unauthorized(None))),
            FakeRefresher::granting("fresh"),
        );

        let err = h.client.login("ana", "wrong").await.unwrap_err();
        assert_eq!(err.to_string(), LOGIN_FAILURE);
        assert_eq!(h.refresher.calls(), 0);
        assert_eq!(h.redirects(), 0);
        assert_eq!(h.slot(CredentialSlot::AccessToken).await.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_login_surfaces_status_messages() {
        for (status, body, expected) in [
            (
                reqwest::StatusCode::BAD_REQUEST,
                r#"{"message":"Password is required"}"#,
                "Password is required",
            ),
            (
                reqwest::StatusCode::UNAUTHORIZED,
                r#"{"message":"Invalid password"}"#,
                "Invalid password",
            ),
            (reqwest::StatusCode::UNPROCESSABLE_ENTITY, "", LOGIN_FAILURE),
        ] {
            let h = Harness::new(
                MemoryStore::new(),
                FakeTransport::new(move |_, _| Err(ApiError::from_status(status, body))),
                FakeRefresher::granting("unused"),
            );

            let err = h.client.login("ana", "").await.unwrap_err();
            assert!(matches!(err, ApiError::Rejected(_)), "{status}: {err:?}");
            assert_eq!(err.to_string(), expected);
            assert_eq!(h.refresher.calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_login_rejected_envelope() {
        let h = Harness::new(
            MemoryStore::new(),
            FakeTransport::new(|_, _| Ok(ok(json!({"success": false, "message": "User is banned"})))),
            FakeRefresher::granting("unused"),
        );

        let err = h.client.login("ana", "hunter2").await.unwrap_err();
        assert_eq!(err.to_string(), "User is banned");
        assert!(!h.client.is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn test_signup_uses_username_route() {
        let h = Harness::new(
            MemoryStore::new(),
            FakeTransport::new(|req, _| {
                if req.path == "/register/ana" {
                    Ok(ok(json!({"success": true, "data": {"access_token": "a1", "refresh_token": "r1"}})))
                } else {
                    Err(ApiError::from_status(reqwest::StatusCode::NOT_FOUND, ""))
                }
            }),
            FakeRefresher::granting("unused"),
        );

        h.client.signup("ana", "hunter2", "ana@example.com").await.unwrap();
        assert_eq!(h.slot(CredentialSlot::AccessToken).await.as_deref(), Some("a1"));
        assert_eq!(
            h.transport.sent()[0].body,
            Some(json!({"password": "hunter2", "email": "ana@example.com"}))
        );
    }

    #[tokio::test]
    async fn test_signup_surfaces_server_message() {
        let h = Harness::new(
            MemoryStore::new(),
            FakeTransport::new(|_, _| {
                Err(ApiError::from_status(
                    reqwest::StatusCode::FORBIDDEN,
                    r#"{"success": false, "message": "Username taken"}"#,
                ))
            }),
            FakeRefresher::granting("unused"),
        );

        let err = h.client.signup("ana", "hunter2", "ana@example.com").await.unwrap_err();
        assert_eq!(err.to_string(), "Username taken");
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_fails() {
        let h = Harness::new(
            MemoryStore::with_tokens("a1", "r1"),
            FakeTransport::new(|_, _| Err(ApiError::ServerError("down".into()))),
            FakeRefresher::granting("unused"),
        );

        h.client.logout().await.unwrap();

        let sent = h.transport.sent();
        assert_eq!(sent[0].path, "/logout");
        assert_eq!(sent[0].headers.get(AUTHORIZATION).unwrap(), "Bearer a1");
        assert!(!h.client.is_authenticated().await.unwrap());
        assert_eq!(h.store.get_item(CredentialSlot::RefreshToken).await.unwrap(), None);
        // Logging out is deliberate; no redirect
        assert_eq!(h.redirects(), 0);
    }

    #[tokio::test]
    async fn test_logout_skips_unusable_token() {
        for stored in ["bad\ntoken", ""] {
            let h = Harness::new(
                MemoryStore::with_tokens(stored, "r1"),
                FakeTransport::new(|_, _| Ok(ok(json!({"success": true})))),
                FakeRefresher::granting("unused"),
            );

            h.client.logout().await.unwrap();

            let sent = h.transport.sent();
            assert_eq!(sent.len(), 1);
            assert!(sent[0].headers.get(AUTHORIZATION).is_none());
            assert_eq!(h.slot(CredentialSlot::AccessToken).await, None);
            assert_eq!(h.slot(CredentialSlot::RefreshToken).await, None);
        }
    }

    /// Fails every read but still clears the wrapped store.
    struct UnreadableStore(Arc<MemoryStore>);

    impl CredentialStore for UnreadableStore {
        fn get_item(&self, slot: CredentialSlot) -> BoxFuture<'_, Result<Option<String>, StoreError>> {
            Box::pin(async move { Err(StoreError::Unavailable(format!("cannot read {slot}"))) })
        }

        fn set_item<'a>(&'a self, slot: CredentialSlot, value: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
            self.0.set_item(slot, value)
        }

        fn clear_all(&self) -> BoxFuture<'_, Result<(), StoreError>> {
            self.0.clear_all()
        }
    }

    #[tokio::test]
    async fn test_logout_clears_when_token_unreadable() {
        let inner = Arc::new(MemoryStore::with_tokens("a1", "r1"));
        let transport = Arc::new(FakeTransport::new(|_, _| Ok(ok(json!({"success": true})))));
        let client = SessionClient::new(
            Arc::new(UnreadableStore(inner.clone())),
            transport.clone(),
            Arc::new(FakeRefresher::granting("unused")),
            Arc::new(|| {}),
        );

        client.logout().await.unwrap();

        assert!(transport.sent()[0].headers.get(AUTHORIZATION).is_none());
        assert_eq!(inner.get_item(CredentialSlot::AccessToken).await.unwrap(), None);
        assert_eq!(inner.get_item(CredentialSlot::RefreshToken).await.unwrap(), None);
    }
}
