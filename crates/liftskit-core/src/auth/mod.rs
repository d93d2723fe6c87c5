//! Authentication module for credentials, token refresh and login routing.
//!
//! This module provides:
//! - `CredentialStore`: the `ACCESS_TOKEN` / `REFRESH_TOKEN` slots, backed by
//!   the OS keychain (`KeyringStore`) or memory (`MemoryStore`)
//! - `TokenRefresher`: exchanges a refresh token for a new access token
//! - `LoginRedirect`: routes the user back to login once a session is lost

pub mod credentials;
pub mod redirect;
pub mod refresh;

pub use credentials::{CredentialSlot, CredentialStore, KeyringStore, MemoryStore, StoreError};
pub use redirect::{ChannelRedirect, LoginRedirect};
pub use refresh::{HttpTokenRefresher, RefreshError, TokenGrant, TokenRefresher};
