//! HTTP mapping of `AppError`.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use rb_core::error::AppError;
use serde::Serialize;
use tracing::error;

/// `AppError` as an actix response. Every handler returns this.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match &self.0 {
            AppError::ValidationError(_) => "validation_error",
            AppError::NotFound(..) => "not_found",
            AppError::InvalidDepth(_) => "invalid_depth",
            AppError::CrossThreadReply { .. } => "cross_thread_reply",
            AppError::HasChildren(_) => "has_children",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::InvalidDepth(_) | AppError::CrossThreadReply { .. } | AppError::HasChildren(_) => {
                StatusCode::CONFLICT
            }
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match &self.0 {
            AppError::Internal(err) => {
                error!(error = ?err, "request failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.kind(),
            message,
        })
    }
}
