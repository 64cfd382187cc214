use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{identity::IdentityError, prediction::PredictionError};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_warn};

/// Anything a handler can fail with. Rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Prediction(PredictionError),
    Identity(IdentityError),
    /// Body missing, not JSON, or not the expected shape. Holds the
    /// extractor's detail for the log only.
    MalformedBody(String),
    InvalidParameters(String),
    OriginRejected,
    Internal(anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Prediction(err) => match err {
                PredictionError::ModelUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                PredictionError::Validation(_) => StatusCode::BAD_REQUEST,
                PredictionError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Identity(err) => match err {
                IdentityError::MissingFields
                | IdentityError::UsernameTaken
                | IdentityError::PasswordMismatch
                | IdentityError::SelfDeletion => StatusCode::BAD_REQUEST,
                IdentityError::InvalidCredentials | IdentityError::Unauthenticated => {
                    StatusCode::UNAUTHORIZED
                }
                IdentityError::UnknownUser => StatusCode::NOT_FOUND,
                IdentityError::Forbidden => StatusCode::FORBIDDEN,
                IdentityError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::MalformedBody(_) | ApiError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
            ApiError::OriginRejected => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Prediction(err) => err.user_message(),
            ApiError::Identity(IdentityError::Storage(_)) | ApiError::Internal(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            ApiError::Identity(err) => err.to_string(),
            ApiError::MalformedBody(_) => "Request body must be a JSON object.".to_string(),
            ApiError::InvalidParameters(_) => "Invalid request parameters.".to_string(),
            ApiError::OriginRejected => "Origin not allowed.".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Prediction(err) if status.is_server_error() => {
                log_error!("prediction failed: {err}")
            }
            ApiError::Identity(IdentityError::Storage(reason)) => {
                log_error!("identity storage failure: {reason}")
            }
            ApiError::Internal(err) => log_error!("request failed: {err:#}"),
            ApiError::MalformedBody(detail) => log_warn!("rejected request body: {detail}"),
            ApiError::InvalidParameters(detail) => log_warn!("rejected request parameters: {detail}"),
            ApiError::OriginRejected => log_warn!("rejected request from disallowed origin"),
            _ => {}
        }

        (status, Json(serde_json::json!({ "error": self.message() }))).into_response()
    }
}

impl From<PredictionError> for ApiError {
    fn from(err: PredictionError) -> Self {
        ApiError::Prediction(err)
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        ApiError::Identity(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedBody(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidParameters(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::InvalidParameters(rejection.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}
