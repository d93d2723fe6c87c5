//! Data-access core for the LiftsKit fitness app.
//!
//! The centerpiece is [`SessionClient`], an HTTP client that attaches the
//! stored bearer token to every request, recovers from a `401` by refreshing
//! the access token once and replaying the request, and ends the session
//! (wiping credentials and routing to login) when refresh is impossible.
//!
//! Collaborators are injected as trait objects so hosts and tests can swap
//! them freely:
//!
//! - [`CredentialStore`]: `ACCESS_TOKEN` / `REFRESH_TOKEN` slots
//! - [`Transport`]: the HTTP transport the session wraps
//! - [`TokenRefresher`]: the plain, non-intercepted refresh call
//! - [`LoginRedirect`]: the "go to login" navigation sink

pub mod api;
pub mod auth;
pub mod config;
pub mod logging;

pub use api::{
    ApiError, ApiRequest, ApiResponse, Envelope, RequestAttempt, RequestOptions,
    ReqwestTransport, SessionClient, Transport,
};
pub use auth::{
    ChannelRedirect, CredentialSlot, CredentialStore, HttpTokenRefresher, KeyringStore,
    LoginRedirect, MemoryStore, RefreshError, StoreError, TokenGrant, TokenRefresher,
};
pub use config::Config;
