use axum::http::StatusCode;
use thiserror::Error;

/// Domain failures that map to specific HTTP statuses. Everything else
/// travels as `anyhow::Error` and lands on 500 in the handlers.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Learning node '{0}' not found")]
    NodeNotFound(String),

    #[error("Exercise '{0}' not found")]
    ExerciseNotFound(String),

    #[error("No content generated for node '{0}'")]
    ContentNotFound(String),

    #[error("Invalid step number {given}, node has {total} steps")]
    InvalidStepNumber { given: usize, total: usize },

    #[error("Invalid hint number {given}, exercise has {total} hints")]
    InvalidHintNumber { given: usize, total: usize },

    #[error("Submission '{0}' not found")]
    SubmissionNotFound(String),
}

impl CoreError {
    pub fn status(&self) -> StatusCode {
        match self {
            CoreError::NodeNotFound(_)
            | CoreError::ExerciseNotFound(_)
            | CoreError::ContentNotFound(_)
            | CoreError::SubmissionNotFound(_) => StatusCode::NOT_FOUND,
            CoreError::InvalidStepNumber { .. } | CoreError::InvalidHintNumber { .. } => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

/// Converts service-layer errors into the `(status, message)` pairs the
/// handlers return, recognizing `CoreError` buried inside an anyhow chain.
pub fn error_response(err: anyhow::Error) -> (StatusCode, String) {
    match err.downcast_ref::<CoreError>() {
        Some(core) => (core.status(), core.to_string()),
        None => {
            tracing::error!("Unhandled error: {:#}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn core_errors_map_to_statuses() {
        assert_eq!(
            CoreError::NodeNotFound("python-1".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            CoreError::InvalidStepNumber { given: 9, total: 4 }.status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn downcast_survives_context() {
        let err = anyhow::Error::from(CoreError::ExerciseNotFound("python-1-ex2".into()))
            .context("loading exercise");
        let (status, msg) = error_response(err);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(msg.contains("python-1-ex2"));
    }

    #[test]
    fn unknown_errors_become_500() {
        let (status, msg) = error_response(anyhow::anyhow!("mongo exploded"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(msg, "Internal server error");
    }
}
