//! Error types for the 115 API client core.
//!
//! # Design
//! The server reports failures inside a JSON envelope rather than through
//! HTTP status codes, so `Api` carries both the vendor error code and the
//! full envelope for diagnostics. `Decode` gets its own variant because a
//! row missing a mandatory field must fail hard, never default. A retry
//! request from the server is *not* an error: it is
//! [`Outcome::Retry`](crate::call::Outcome) returned from `parse`.

use serde_json::Value;
use thiserror::Error;

use crate::call::JsonObject;
use crate::cipher::CipherError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by [`ApiCall::parse`](crate::call::ApiCall::parse).
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server reported a positive error code in the response envelope.
    #[error("server error {code}: {envelope}")]
    Api { code: i64, envelope: Value },

    /// The response body was not a JSON object.
    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),

    /// A mandatory field was missing or had an unusable value.
    #[error("missing or invalid `{field}` in {context}")]
    Decode {
        field: &'static str,
        context: &'static str,
    },

    /// The encrypted `data` payload could not be decrypted.
    #[error("cipher failure: {0}")]
    Cipher(#[from] CipherError),
}

impl ApiError {
    pub(crate) fn api(code: i64, envelope: &JsonObject) -> Self {
        ApiError::Api {
            code,
            envelope: Value::Object(envelope.clone()),
        }
    }

    pub(crate) fn decode(field: &'static str, context: &'static str) -> Self {
        ApiError::Decode { field, context }
    }
}
