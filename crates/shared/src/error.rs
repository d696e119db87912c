use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MalformedToken,
    UserNotFound,
    UserAlreadyExists,
    Validation,
    Transport,
    Internal,
}

impl ErrorCode {
    /// Maps the `type` field of an API bad-request body onto a code.
    pub fn from_bad_request_kind(kind: &str) -> Self {
        match kind {
            "USER" => Self::UserNotFound,
            "USERALREADYEXISTS" | "DUPLICATE" => Self::UserAlreadyExists,
            "USERNAME" | "PASSWORD" | "JSON" => Self::Validation,
            _ => Self::Internal,
        }
    }
}

#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct ApiException {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiException {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
