use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use mongodb::bson::doc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::error_response;
use crate::extractors::{AppJson, LearnerId};
use crate::models::agent::{
    CreateExerciseRequest, CreateNodeRequest, CreatePathRequest, DisplayContentRequest,
    DisplayedContentRecord,
};
use crate::models::content::{Difficulty, Exercise};
use crate::models::{path_id_of, NodeRecord, PathRecord};
use crate::services::{content_generator::ContentGenerator, gate_service::GateService, AppState};
use crate::utils::time;

/// Number of nodes in a path that triggers background content generation.
const BULK_GENERATION_THRESHOLD: u64 = 3;

/// Records that the agent displayed lecture content to the learner. This is
/// the evidence the content gate checks before exercise creation.
pub async fn display_content(
    State(state): State<Arc<AppState>>,
    LearnerId(user_id): LearnerId,
    AppJson(req): AppJson<DisplayContentRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let record = DisplayedContentRecord {
        content_id: Uuid::new_v4().to_string(),
        title: req.title,
        content_type: req.content_type,
        sections: req.sections,
        created_for_user: user_id,
        generated_by_ai: true,
        created_at: time::now(),
    };

    state
        .mongo
        .collection::<DisplayedContentRecord>("learning_content")
        .insert_one(&record)
        .await
        .map_err(|e| {
            error_response(anyhow::Error::from(e).context("Failed to store displayed content"))
        })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "content_id": record.content_id })),
    ))
}

/// Creates an agent-authored exercise, gated on the matching lecture content
/// having been displayed first.
pub async fn create_exercise(
    State(state): State<Arc<AppState>>,
    LearnerId(user_id): LearnerId,
    AppJson(req): AppJson<CreateExerciseRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(user_id, node_id = req.node_id, "Agent creating exercise");

    // gate on the node's lecture title when the node exists
    let topic_title = state
        .mongo
        .collection::<NodeRecord>("learning_nodes")
        .find_one(doc! { "node_id": &req.node_id })
        .await
        .map_err(|e| error_response(anyhow::Error::from(e).context("Failed to load node")))?
        .map(|n| n.title)
        .unwrap_or_else(|| req.title.clone());

    let gate = GateService::new(state.mongo.clone());
    if let Some(rejection) = gate
        .check_content_shown(&user_id, &req.node_id, &topic_title)
        .await
        .map_err(error_response)?
    {
        return Ok((
            StatusCode::PRECONDITION_FAILED,
            Json(serde_json::to_value(&rejection).unwrap_or_default()),
        ));
    }

    let mut starter_code = req.starter_code.unwrap_or_default();
    if !req.solution.is_empty() && starter_code.trim() == req.solution.trim() {
        tracing::warn!(node_id = req.node_id, "Starter code equals solution, clearing it");
        starter_code = String::new();
    }

    let exercise = Exercise {
        exercise_id: format!("{}-agent-{}", req.node_id, Uuid::new_v4()),
        node_id: Some(req.node_id),
        title: req.title,
        description: req.description,
        prompt: req.prompt,
        difficulty: req.difficulty.unwrap_or(Difficulty::Beginner),
        starter_code,
        solution: req.solution,
        test_cases: req.test_cases,
        hints: vec![],
        focus_topics: vec![],
        generated_by_ai: true,
        created_for_user: Some(user_id),
    };

    state
        .mongo
        .collection::<Exercise>("exercises")
        .insert_one(&exercise)
        .await
        .map_err(|e| error_response(anyhow::Error::from(e).context("Failed to store exercise")))?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "exercise_id": exercise.exercise_id })),
    ))
}

/// Creates a learning node, gated on the agent having asked enough discovery
/// questions. Once a path accumulates enough nodes, content generation for
/// the whole path kicks off in the background.
pub async fn create_node(
    State(state): State<Arc<AppState>>,
    LearnerId(user_id): LearnerId,
    AppJson(req): AppJson<CreateNodeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(user_id, node_id = req.node_id, "Agent creating node");

    let gate = GateService::new(state.mongo.clone());
    let report = gate
        .check_discovery_questions(req.session_id.as_deref())
        .await
        .map_err(error_response)?;

    if !report.can_create {
        return Ok((
            StatusCode::PRECONDITION_FAILED,
            Json(serde_json::json!({
                "error": "prerequisite_not_met",
                "message": "Ask the learner about their background before creating learning nodes.",
                "questions_matched": report.questions_matched,
                "missing": report.missing,
            })),
        ));
    }

    let node = NodeRecord {
        node_id: req.node_id.clone(),
        title: req.title,
        description: req.description,
        difficulty: req.difficulty,
        estimated_duration: req.estimated_duration.unwrap_or(0),
        prerequisites: req.prerequisites,
        skills_taught: req.concepts,
        learning_objectives: req.learning_objectives,
        created_by: Some("agent".to_string()),
        created_for_user: Some(user_id.clone()),
        created_at: time::now(),
        status: "active".to_string(),
    };

    let nodes = state.mongo.collection::<NodeRecord>("learning_nodes");
    nodes
        .insert_one(&node)
        .await
        .map_err(|e| error_response(anyhow::Error::from(e).context("Failed to store node")))?;

    let path_id = path_id_of(&req.node_id).to_string();
    let pattern = format!("^{}", regex::escape(&path_id));
    let node_count = nodes
        .count_documents(doc! { "node_id": { "$regex": &pattern } })
        .await
        .map_err(|e| error_response(anyhow::Error::from(e).context("Failed to count nodes")))?;

    let mut generation_started = false;
    if node_count >= BULK_GENERATION_THRESHOLD {
        let generator =
            ContentGenerator::new(state.mongo.clone(), state.config.model_api_url.clone());
        generator.spawn_path_generation(user_id, path_id.clone());
        generation_started = true;
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "node_id": req.node_id,
            "path_id": path_id,
            "nodes_in_path": node_count,
            "generation_started": generation_started,
        })),
    ))
}

pub async fn create_path(
    State(state): State<Arc<AppState>>,
    LearnerId(user_id): LearnerId,
    AppJson(req): AppJson<CreatePathRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(user_id, path_id = req.path_id, "Agent creating path");

    let record = PathRecord {
        path_id: req.path_id,
        title: req.title,
        description: req.description,
        category: req.category.unwrap_or_default(),
        user_id,
        created_by: Some("agent".to_string()),
        created_at: time::now(),
        status: "active".to_string(),
    };

    state
        .mongo
        .collection::<PathRecord>("learning_paths")
        .insert_one(&record)
        .await
        .map_err(|e| error_response(anyhow::Error::from(e).context("Failed to store path")))?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "path_id": record.path_id })),
    ))
}
