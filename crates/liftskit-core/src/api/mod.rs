//! REST API client module for the LiftsKit backend.
//!
//! This module provides the `SessionClient` for talking to the LiftsKit
//! REST API, along with the request/response types and the transport it
//! dispatches through.
//!
//! The API uses short-lived bearer access tokens, renewed through the
//! `/refresh` endpoint with a longer-lived refresh token.

pub mod client;
pub mod envelope;
pub mod error;
pub mod request;
pub mod routes;
pub mod session;
pub mod transport;

pub use client::SessionClient;
pub use envelope::{unwrap_envelope, Envelope};
pub use error::ApiError;
pub use request::{ApiRequest, RequestAttempt, RequestOptions};
pub use transport::{ApiResponse, ReqwestTransport, Transport};
