//! API handlers
//!
//! Every failure on this surface serializes to the same `{msg, ...}`
//! shape; the optional fields carry the balance shortfall detail and the
//! underlying message of unexpected errors.

pub mod account;
pub mod auth;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

/// Wire shape shared by every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            required: None,
            current: None,
            error: None,
        }
    }

    /// Attach the machine-readable balance detail.
    pub fn with_shortfall(mut self, required: i64, current: i64) -> Self {
        self.required = Some(required);
        self.current = Some(current);
        self
    }
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorBody::new(msg)))
}

pub fn not_found(msg: impl Into<String>) -> ApiError {
    (StatusCode::NOT_FOUND, Json(ErrorBody::new(msg)))
}

/// Unexpected failure: a 500 carrying the underlying message.
pub fn server_error(detail: impl ToString) -> ApiError {
    let mut body = ErrorBody::new("Server error");
    body.error = Some(detail.to_string());
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_error_omits_optional_fields() {
        let (status, Json(body)) = bad_request("User not found");
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "msg": "User not found" }));
    }

    #[test]
    fn shortfall_error_carries_detail() {
        let body = ErrorBody::new("Insufficient balance for upgrade").with_shortfall(12_000, 0);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "msg": "Insufficient balance for upgrade",
                "required": 12_000,
                "current": 0,
            })
        );
    }

    #[test]
    fn server_error_wraps_the_cause() {
        let (status, Json(body)) = server_error("connection reset");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.msg, "Server error");
        assert_eq!(body.error.as_deref(), Some("connection reset"));
    }
}
