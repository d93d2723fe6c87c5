//! The `{ success, data, message }` envelope every server response uses.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ApiError;

/// Fallback message when a failed envelope carries none.
const DEFAULT_FAILURE_MESSAGE: &str = "Request failed";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Unwrap a successful envelope, turning `success: false` into an error
    /// carrying the server message.
    pub fn into_data(self) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        if !self.success {
            let message = self
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
            return Err(ApiError::Rejected(message));
        }

        match self.data {
            Some(data) => Ok(data),
            // Endpoints without a payload (e.g. `()` or `Option<_>`) accept null.
            None => serde_json::from_value(serde_json::Value::Null).map_err(|_| {
                ApiError::InvalidResponse("Successful envelope is missing data".to_string())
            }),
        }
    }
}

/// Parse a raw response body as an envelope and unwrap it.
pub fn unwrap_envelope<T: DeserializeOwned>(body: serde_json::Value) -> Result<T, ApiError> {
    let envelope: Envelope<T> = serde_json::from_value(body)
        .map_err(|e| ApiError::InvalidResponse(format!("Malformed response envelope: {}", e)))?;
    envelope.into_data()
}
