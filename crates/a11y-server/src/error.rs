//! API errors and the rejection handler

use a11y_core::{OrchestratorError, ReportError, ValidationError};
use serde::Serialize;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

/// Error returned to API clients
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// 400
    #[error("{0}")]
    BadRequest(String),
    /// 404
    #[error("{0}")]
    NotFound(String),
    /// 409
    #[error("{0}")]
    Conflict(String),
    /// 501
    #[error("{0}")]
    NotImplemented(String),
    /// 503
    #[error("{0}")]
    Unavailable(String),
    /// 500
    #[error("{0}")]
    Internal(String),
}

impl warp::reject::Reject for ApiError {}

impl ApiError {
    /// HTTP status
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::NotImplemented(_) => "not_implemented",
            Self::Unavailable(_) => "unavailable",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Validation(e) => Self::BadRequest(e.to_string()),
            e @ OrchestratorError::NotFound { .. } => Self::NotFound(e.to_string()),
            OrchestratorError::Conflict(message) => Self::Conflict(message),
            e @ OrchestratorError::ShuttingDown => Self::Unavailable(e.to_string()),
            e @ (OrchestratorError::Store(_) | OrchestratorError::Task(_)) => {
                tracing::error!(error = %e, "request failed");
                Self::Internal(e.to_string())
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::UnknownFormat(_) => Self::BadRequest(err.to_string()),
            ReportError::Unsupported(_) => Self::NotImplemented(err.to_string()),
            ReportError::Render(_) => Self::Internal(err.to_string()),
        }
    }
}

/// Shorthand for rejecting with an [`ApiError`]
pub(crate) fn reject(err: impl Into<ApiError>) -> Rejection {
    warp::reject::custom(err.into())
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

/// Turn any rejection into a JSON `{error, message}` response
///
/// # Errors
/// Never fails.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, code, message) = if let Some(api) = err.find::<ApiError>() {
        (api.status(), api.code(), api.to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not_found", "route not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, "validation_error", e.to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, "validation_error", e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "method not allowed".to_string(),
        )
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            "request body too large".to_string(),
        )
    } else {
        tracing::error!(rejection = ?err, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "internal server error".to_string(),
        )
    };

    let body = warp::reply::json(&ErrorBody {
        error: code,
        message,
    });
    Ok(warp::reply::with_status(body, status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orchestrator_errors_map_to_statuses() {
        let cases = [
            (
                OrchestratorError::NotFound {
                    entity: "scan",
                    id: "x".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (OrchestratorError::Conflict("busy".into()), StatusCode::CONFLICT),
            (
                OrchestratorError::Validation(ValidationError::new("url", "bad")),
                StatusCode::BAD_REQUEST,
            ),
            (OrchestratorError::ShuttingDown, StatusCode::SERVICE_UNAVAILABLE),
            (OrchestratorError::Task("gone".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn unsupported_report_is_not_implemented() {
        let err = ApiError::from(ReportError::Unsupported(a11y_core::ReportFormat::Pdf));
        assert_eq!(err.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(err.code(), "not_implemented");
    }
}
