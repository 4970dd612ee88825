use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

/// Unified error type for the relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    // ── Caller Errors ───────────────────────────────────────────────────
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    // ── Upstream Errors ─────────────────────────────────────────────────
    #[error("Token acquisition failed")]
    TokenAcquisition { status: Option<u16>, payload: Value },

    #[error("{message}")]
    Upstream {
        status: Option<u16>,
        message: String,
        payload: Value,
    },

    // ── Internal ────────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Upstream payload attached to the error, `null` when there is none.
    pub fn payload(&self) -> Value {
        match self {
            RelayError::TokenAcquisition { payload, .. }
            | RelayError::Upstream { payload, .. } => payload.clone(),
            _ => Value::Null,
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            RelayError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            RelayError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            RelayError::TokenAcquisition { status, .. } => {
                (upstream_status(*status), "token_acquisition_failed")
            }
            RelayError::Upstream { status, .. } => (upstream_status(*status), "upstream_error"),
            RelayError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

/// Map an upstream status onto the response status, falling back to 500
/// for transport failures and anything that is not an error status.
fn upstream_status(status: Option<u16>) -> StatusCode {
    status
        .and_then(|s| StatusCode::from_u16(s).ok())
        .filter(|s| s.is_client_error() || s.is_server_error())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl From<JsonRejection> for RelayError {
    fn from(rejection: JsonRejection) -> Self {
        RelayError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!("{code}: {self}");
        }

        let body = json!({
            "error": {
                "code": code,
                "message": self.to_string(),
                "details": self.payload(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_errors_map_to_4xx() {
        let (status, _) = RelayError::BadRequest("sessionId is required".into()).status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = RelayError::NotFound("Session".into()).status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_upstream_status_is_preserved() {
        let err = RelayError::Upstream {
            status: Some(403),
            message: "forbidden".into(),
            payload: json!({ "message": "no access" }),
        };
        assert_eq!(err.status_and_code().0, StatusCode::FORBIDDEN);
        assert_eq!(err.payload()["message"], "no access");
    }

    #[test]
    fn test_missing_or_success_status_falls_back_to_500() {
        assert_eq!(upstream_status(None), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(upstream_status(Some(200)), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(upstream_status(Some(502)), StatusCode::BAD_GATEWAY);
    }
}
