//! JSON error responses for the admin API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::exec::ExecError;
use crate::haproxy::PipelineError;
use crate::hosting::domains::DomainError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Error returned by admin handlers, rendered as `{error, details?}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ExecError> for ApiError {
    fn from(e: ExecError) -> Self {
        tracing::error!(command = e.command(), error = %e, "External tool failure");
        let error = if e.is_timeout() {
            "External tool unresponsive"
        } else {
            "External command failed"
        };
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error).with_details(e.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        tracing::error!(error = ?e, "Config file I/O failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Validation(msg) => Self::bad_request(msg),
            PipelineError::NotFound(msg) => Self::not_found(msg),
            PipelineError::Syntax { diagnostics } => {
                Self::bad_request("Invalid configuration").with_details(diagnostics)
            }
            PipelineError::Tool(e) => e.into(),
            PipelineError::Io(e) => e.into(),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Invalid(msg) => Self::bad_request(msg),
            DomainError::Exec(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_errors_map_to_status() {
        let cases = [
            (PipelineError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (PipelineError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                PipelineError::Syntax { diagnostics: "bad".into() },
                StatusCode::BAD_REQUEST,
            ),
            (
                PipelineError::Tool(ExecError::Timeout { command: "haproxy -c".into(), secs: 30 }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                PipelineError::Io(std::io::Error::other("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_domain_errors_map_to_status() {
        let err = ApiError::from(DomainError::Invalid("Domain is required".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error, "Domain is required");

        let err = ApiError::from(DomainError::Exec(ExecError::Failed {
            command: "v-add-user-haproxy-domain".into(),
            code: Some(4),
            message: "Error: domain exists".into(),
        }));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_io_details_are_not_leaked() {
        let err = ApiError::from(std::io::Error::other("/etc/secret: permission denied"));
        assert_eq!(err.error, "Internal server error");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_syntax_error_carries_diagnostics() {
        let err = ApiError::from(PipelineError::Syntax { diagnostics: "[ALERT] line 3".into() });
        assert_eq!(err.error, "Invalid configuration");
        assert_eq!(err.details.as_deref(), Some("[ALERT] line 3"));
    }
}
