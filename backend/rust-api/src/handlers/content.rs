use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use mongodb::bson::doc;
use std::sync::Arc;

use crate::error::{error_response, CoreError};
use crate::extractors::LearnerId;
use crate::metrics::STEPS_SERVED_TOTAL;
use crate::models::content::{StartNodeResponse, StepResponse};
use crate::models::NodeRecord;
use crate::services::{
    content_generator::ContentGenerator, progress_service::ProgressService, step_sequencer,
    AppState,
};

/// Opens a node for a learner: generates content on first access, marks the
/// node started and returns the first step.
pub async fn start_node(
    State(state): State<Arc<AppState>>,
    LearnerId(user_id): LearnerId,
    Path(node_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(user_id, node_id, "Starting node");

    let generator =
        ContentGenerator::new(state.mongo.clone(), state.config.model_api_url.clone());
    let record = generator
        .ensure_node_content(&user_id, &node_id)
        .await
        .map_err(error_response)?;

    let progress = ProgressService::new(state.mongo.clone());
    progress
        .ensure_started(&user_id, &node_id)
        .await
        .map_err(error_response)?;

    let lecture_steps = step_sequencer::lecture_step_count(&record);
    if lecture_steps > 0 {
        progress
            .record_lecture_step(&user_id, &node_id, 1, lecture_steps)
            .await
            .map_err(error_response)?;
    }

    let steps = step_sequencer::build_steps(&record);
    let total_steps = steps.len();
    let first = steps.into_iter().next().ok_or_else(|| {
        error_response(CoreError::ContentNotFound(node_id.clone()).into())
    })?;

    STEPS_SERVED_TOTAL
        .with_label_values(&[first.step_type.as_str()])
        .inc();

    Ok((
        StatusCode::OK,
        Json(StartNodeResponse {
            node_id,
            node_title: record.lecture.title.clone(),
            step_number: 1,
            total_steps,
            step: first,
            has_next: total_steps > 1,
            has_previous: false,
            content_ready: true,
        }),
    ))
}

/// Serves a single step by its one-indexed position. Viewing a lecture step
/// advances the learner's lecture progress.
pub async fn get_step(
    State(state): State<Arc<AppState>>,
    LearnerId(user_id): LearnerId,
    Path((node_id, step_number)): Path<(String, usize)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let generator =
        ContentGenerator::new(state.mongo.clone(), state.config.model_api_url.clone());
    let record = generator
        .get_content(&user_id, &node_id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| error_response(CoreError::ContentNotFound(node_id.clone()).into()))?;

    let steps = step_sequencer::build_steps(&record);
    let total_steps = steps.len();

    if step_number == 0 || step_number > total_steps {
        return Err(error_response(
            CoreError::InvalidStepNumber {
                given: step_number,
                total: total_steps,
            }
            .into(),
        ));
    }

    let step = steps
        .into_iter()
        .nth(step_number - 1)
        .ok_or_else(|| error_response(anyhow::anyhow!("Step index out of range")))?;

    let lecture_steps = step_sequencer::lecture_step_count(&record);
    if step_number <= lecture_steps {
        let progress = ProgressService::new(state.mongo.clone());
        progress
            .record_lecture_step(&user_id, &node_id, step_number, lecture_steps)
            .await
            .map_err(error_response)?;
    }

    STEPS_SERVED_TOTAL
        .with_label_values(&[step.step_type.as_str()])
        .inc();

    Ok((
        StatusCode::OK,
        Json(StepResponse {
            node_id,
            step_number,
            total_steps,
            step,
            has_next: step_number < total_steps,
            has_previous: step_number > 1,
        }),
    ))
}

/// Lists step metadata for navigation without serving the content itself.
pub async fn all_steps(
    State(state): State<Arc<AppState>>,
    LearnerId(user_id): LearnerId,
    Path(node_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let generator =
        ContentGenerator::new(state.mongo.clone(), state.config.model_api_url.clone());
    let record = generator
        .get_content(&user_id, &node_id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| error_response(CoreError::ContentNotFound(node_id.clone()).into()))?;

    let steps = step_sequencer::build_steps(&record);
    let summaries = step_sequencer::summarize(&steps);

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "node_id": node_id,
            "total_steps": steps.len(),
            "steps": summaries,
        })),
    ))
}

/// Marks one exercise as completed for node-progress purposes. Grading has
/// its own flow; this only moves the completion counter.
pub async fn complete_exercise(
    State(state): State<Arc<AppState>>,
    LearnerId(user_id): LearnerId,
    Path((node_id, exercise_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(user_id, node_id, exercise_id, "Completing exercise");

    let generator =
        ContentGenerator::new(state.mongo.clone(), state.config.model_api_url.clone());
    let record = generator
        .get_content(&user_id, &node_id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| error_response(CoreError::ContentNotFound(node_id.clone()).into()))?;

    if !record
        .exercises
        .iter()
        .any(|e| e.exercise_id == exercise_id)
    {
        return Err(error_response(
            CoreError::ExerciseNotFound(exercise_id).into(),
        ));
    }

    let progress = ProgressService::new(state.mongo.clone());
    let response = progress
        .record_exercise_completion(&user_id, &node_id, record.exercises.len() as i32)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::OK, Json(response)))
}

/// Throws away stored content for the node and generates it again.
pub async fn regenerate(
    State(state): State<Arc<AppState>>,
    LearnerId(user_id): LearnerId,
    Path(node_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(user_id, node_id, "Regenerating node content");

    let generator =
        ContentGenerator::new(state.mongo.clone(), state.config.model_api_url.clone());
    let record = generator
        .regenerate(&user_id, &node_id)
        .await
        .map_err(error_response)?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "node_id": record.node_id,
            "content_version": record.content_version,
            "total_steps": step_sequencer::build_steps(&record).len(),
            "regenerated": true,
        })),
    ))
}

/// Reports how much of a path's content has been generated so far.
pub async fn generation_status(
    State(state): State<Arc<AppState>>,
    LearnerId(user_id): LearnerId,
    Path(path_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let generator =
        ContentGenerator::new(state.mongo.clone(), state.config.model_api_url.clone());
    let status = generator
        .generation_status(&user_id, &path_id)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::OK, Json(status)))
}

/// Node metadata lookup used by clients before starting a node.
pub async fn get_node(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let node = state
        .mongo
        .collection::<NodeRecord>("learning_nodes")
        .find_one(doc! { "node_id": &node_id })
        .await
        .map_err(|e| error_response(anyhow::Error::from(e).context("Failed to load node")))?
        .ok_or_else(|| error_response(CoreError::NodeNotFound(node_id).into()))?;

    Ok((StatusCode::OK, Json(node)))
}
