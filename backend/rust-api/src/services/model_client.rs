//! Thin HTTP client for the model service.
//!
//! Every endpoint returns a `content` string holding the model's raw output.
//! Callers route that text through `utils::json_repair::parse_lenient`, so
//! nothing here attempts to interpret the payload.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const GENERATION_TIMEOUT: Duration = Duration::from_secs(90);
const GRADING_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Debug, Serialize)]
pub struct LectureRequest {
    pub node_id: String,
    pub title: String,
    pub description: String,
    pub concepts: Vec<String>,
    pub difficulty: String,
    pub user_level: String,
}

#[derive(Debug, Serialize)]
pub struct ExercisesRequest {
    pub node_id: String,
    pub title: String,
    pub concepts: Vec<String>,
    pub count: u32,
    pub user_level: String,
}

#[derive(Debug, Serialize)]
pub struct TargetedExerciseRequest {
    pub node_id: String,
    pub topic: String,
    pub weak_points: Vec<String>,
    pub user_level: String,
}

#[derive(Debug, Serialize)]
pub struct GradeRequest {
    pub exercise_prompt: String,
    pub solution: String,
    pub submitted_code: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub test_cases: Value,
}

#[derive(Debug, Deserialize)]
struct ModelResponse {
    content: String,
}

pub async fn generate_lecture(
    client: &Client,
    model_api_url: &str,
    payload: &LectureRequest,
) -> Result<String> {
    post_for_content(
        client,
        &format!("{}/v1/generate/lecture", model_api_url),
        payload,
        GENERATION_TIMEOUT,
    )
    .await
}

pub async fn generate_exercises(
    client: &Client,
    model_api_url: &str,
    payload: &ExercisesRequest,
) -> Result<String> {
    post_for_content(
        client,
        &format!("{}/v1/generate/exercises", model_api_url),
        payload,
        GENERATION_TIMEOUT,
    )
    .await
}

pub async fn generate_targeted_exercise(
    client: &Client,
    model_api_url: &str,
    payload: &TargetedExerciseRequest,
) -> Result<String> {
    post_for_content(
        client,
        &format!("{}/v1/generate/targeted-exercise", model_api_url),
        payload,
        GENERATION_TIMEOUT,
    )
    .await
}

pub async fn grade_submission(
    client: &Client,
    model_api_url: &str,
    payload: &GradeRequest,
) -> Result<String> {
    post_for_content(
        client,
        &format!("{}/v1/grade", model_api_url),
        payload,
        GRADING_TIMEOUT,
    )
    .await
}

async fn post_for_content<T: Serialize>(
    client: &Client,
    url: &str,
    payload: &T,
    timeout: Duration,
) -> Result<String> {
    let response = client
        .post(url)
        .json(payload)
        .timeout(timeout)
        .send()
        .await
        .context("Failed to call model service")?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(anyhow!(
            "Model service returned error {}: {}",
            status,
            error_text
        ));
    }

    let api_response: ModelResponse = response
        .json()
        .await
        .context("Failed to parse model service envelope")?;

    Ok(api_response.content)
}
