//! Callback failure kinds and their single mapping onto response bodies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::types::CallbackResponse;

pub const STATUS_BAD_REQUEST: &str = "400";
pub const STATUS_DECRYPT_FAILED: &str = "501";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// Unreadable body or schema mismatch.
    #[error("{0}")]
    BadRequest(&'static str),

    /// No `Signature` header. Reported like a bad request.
    #[error("signature not found")]
    MissingSignature,

    /// Signature did not verify. Reported like a bad request.
    #[error("verify signature failed")]
    Unauthorized,

    /// Authenticated, but the embedded ciphertext would not decrypt.
    #[error("decrypt sig error")]
    DecryptFailure,

    /// Outbound serialization or signing failed. Detail stays in the logs.
    #[error("internal error")]
    Internal,
}

impl CallbackError {
    pub fn status(&self) -> &'static str {
        match self {
            CallbackError::DecryptFailure => STATUS_DECRYPT_FAILED,
            _ => STATUS_BAD_REQUEST,
        }
    }

    pub fn to_response(&self) -> CallbackResponse {
        CallbackResponse::error(self.status(), &self.to_string())
    }
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self.to_response())).into_response()
    }
}
