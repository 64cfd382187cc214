use std::path::PathBuf;

use thiserror::Error;

use super::{classifier::InferenceError, validator::ValidationError};

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("prediction model unavailable at {}: {reason}", path.display())]
    ModelUnavailable { path: PathBuf, reason: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl PredictionError {
    /// Short message safe to show to the person who submitted the reading.
    pub fn user_message(&self) -> String {
        match self {
            PredictionError::ModelUnavailable { .. } => {
                "Prediction model is not available. Please try again later.".to_string()
            }
            PredictionError::Validation(err) => format!("{err}."),
            PredictionError::Inference(_) => "Prediction failed. Please try again.".to_string(),
        }
    }
}

/// Persisting a prediction failed. Logged, never returned to the caller.
#[derive(Debug, Error)]
#[error("failed to record prediction for user {user_id}: {reason}")]
pub struct HistoryWriteError {
    pub user_id: i64,
    pub reason: String,
}
