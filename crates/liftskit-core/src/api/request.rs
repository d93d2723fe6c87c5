//! Request descriptors and the per-request attempt value.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::Serialize;

use super::ApiError;

/// A request may be replayed at most this many times after a credential refresh.
const MAX_REPLAYS: u8 = 1;

/// Method, path, headers and JSON body of one logical API call.
///
/// `path` is relative to the transport's base URL (e.g. `/workouts/alice`).
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to serialize body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Merge per-call options into the request.
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.headers.extend(options.headers);
        self
    }

    /// The bearer token currently on the request, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// Per-call options accepted by the `SessionClient` verbs.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header, rejecting values that are not valid header text.
    pub fn header(mut self, name: &'static str, value: &str) -> Result<Self, ApiError> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid header {}: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }
}

/// One attempt at dispatching an [`ApiRequest`].
///
/// The replay counter travels with the value rather than being flagged on the
/// request, so a request that already went through a refresh can never trigger
/// another one.
#[derive(Debug, Clone)]
pub struct RequestAttempt {
    request: ApiRequest,
    replays: u8,
}

impl RequestAttempt {
    /// The initial attempt for a request.
    pub fn first(request: ApiRequest) -> Self {
        Self {
            request,
            replays: 0,
        }
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }

    pub fn into_request(self) -> ApiRequest {
        self.request
    }

    /// True once the attempt is a replay after a refresh.
    pub fn is_replay(&self) -> bool {
        self.replays > 0
    }

    /// Whether a 401 on this attempt may still start the recovery flow.
    pub fn can_replay(&self) -> bool {
        self.replays < MAX_REPLAYS
    }

    /// Set `Authorization: Bearer <token>` on the outgoing request.
    pub fn with_bearer(mut self, token: &str) -> Result<Self, ApiError> {
        let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            ApiError::InvalidRequest("Access token is not a valid header value".to_string())
        })?;
        self.request.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    /// The next attempt, carrying the freshly minted access token.
    pub fn replay_with(self, token: &str) -> Result<Self, ApiError> {
        let replays = self.replays + 1;
        let next = self.with_bearer(token)?;
        Ok(Self { replays, ..next })
    }
}
