use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::error::error_response;
use crate::extractors::{AppJson, LearnerId};
use crate::metrics::HINTS_REQUESTED_TOTAL;
use crate::models::submission::{HintRequest, SubmitExerciseRequest};
use crate::services::{submission_service::SubmissionService, AppState};

pub async fn get_exercise(
    State(state): State<Arc<AppState>>,
    LearnerId(user_id): LearnerId,
    Path(exercise_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = SubmissionService::new(&state);
    let detail = service
        .exercise_detail(&user_id, &exercise_id)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::OK, Json(detail)))
}

/// Grades a submission and returns the outcome with the planned next action.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    LearnerId(user_id): LearnerId,
    Path(exercise_id): Path<String>,
    AppJson(req): AppJson<SubmitExerciseRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(user_id, exercise_id, "Submitting exercise");

    let service = SubmissionService::new(&state);
    let response = service
        .submit(&user_id, &exercise_id, &req)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::OK, Json(response)))
}

pub async fn get_result(
    State(state): State<Arc<AppState>>,
    LearnerId(user_id): LearnerId,
    Path((_exercise_id, submission_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = SubmissionService::new(&state);
    let result = service
        .get_result(&user_id, &submission_id)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::OK, Json(result)))
}

pub async fn request_hint(
    State(state): State<Arc<AppState>>,
    LearnerId(user_id): LearnerId,
    Path(exercise_id): Path<String>,
    AppJson(req): AppJson<HintRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(user_id, exercise_id, hint_number = req.hint_number, "Hint requested");

    let service = SubmissionService::new(&state);
    let response = service
        .hint(&user_id, &exercise_id, req.hint_number)
        .await
        .map_err(error_response)?;

    let hint_level = req.hint_number.to_string();
    HINTS_REQUESTED_TOTAL
        .with_label_values(&[hint_level.as_str()])
        .inc();

    Ok((StatusCode::OK, Json(response)))
}
