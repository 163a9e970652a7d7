//! Orchestrates the grade-classify-plan pipeline for exercise submissions.
//!
//! A submission is graded (model first, heuristic fallback), scanned for
//! weak points, classified into an outcome, and routed to a next action.
//! Attempt numbering and idempotency both live in Redis so concurrent
//! submissions from the same learner stay consistent.

use anyhow::Context;
use mongodb::bson::doc;
use mongodb::{Collection, Database};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use reqwest::Client;
use serde_json::json;
use uuid::Uuid;

use crate::error::CoreError;
use crate::metrics::SUBMISSIONS_GRADED_TOTAL;
use crate::models::content::{ContentRecord, Exercise};
use crate::models::submission::{
    ExerciseDetailResponse, ExerciseProgress, GradingResult, HintResponse, Outcome,
    SubmissionRecord, SubmissionResultResponse, SubmitExerciseRequest, SubmitExerciseResponse,
};
use crate::models::split_exercise_id;
use crate::services::content_generator::ContentGenerator;
use crate::services::grading_service;
use crate::services::model_client::GradeRequest;
use crate::services::progression_service::ProgressionService;
use crate::services::weak_point_service::{self, WeakPointService};
use crate::services::AppState;
use crate::utils::retry::{retry_async_with_config, RetryConfig};
use crate::utils::time;

const IDEMPOTENCY_TTL_SECS: u64 = 24 * 60 * 60;

pub struct SubmissionService {
    mongo: Database,
    redis: ConnectionManager,
    http: Client,
    model_api_url: String,
    progression: ProgressionService,
}

impl SubmissionService {
    pub fn new(state: &AppState) -> Self {
        let generator =
            ContentGenerator::new(state.mongo.clone(), state.config.model_api_url.clone());
        Self {
            mongo: state.mongo.clone(),
            redis: state.redis.clone(),
            http: Client::new(),
            model_api_url: state.config.model_api_url.clone(),
            progression: ProgressionService::new(state.mongo.clone(), generator),
        }
    }

    fn attempts(&self) -> Collection<SubmissionRecord> {
        self.mongo.collection("exercise_attempts")
    }

    fn standalone_exercises(&self) -> Collection<Exercise> {
        self.mongo.collection("exercises")
    }

    fn content(&self) -> Collection<ContentRecord> {
        self.mongo.collection("course_content")
    }

    pub async fn submit(
        &self,
        user_id: &str,
        exercise_id: &str,
        request: &SubmitExerciseRequest,
    ) -> anyhow::Result<SubmitExerciseResponse> {
        if let Some(key) = &request.idempotency_key {
            if let Some(cached) = self.cached_response(user_id, key).await? {
                crate::metrics::record_cache_hit();
                tracing::debug!(exercise_id, "Returning idempotent cached response");
                return Ok(cached);
            }
            crate::metrics::record_cache_miss();
        }

        let (exercise, node_id) = self.find_exercise(user_id, exercise_id).await?;

        let attempt_number = self.next_attempt_number(user_id, exercise_id).await?;

        let grade_request = GradeRequest {
            exercise_prompt: exercise.prompt.clone(),
            solution: exercise.solution.clone(),
            submitted_code: request.code.clone(),
            test_cases: serde_json::to_value(&exercise.test_cases)
                .unwrap_or(serde_json::Value::Null),
        };
        let grading = grading_service::grade(&self.http, &self.model_api_url, &grade_request).await;

        let findings = weak_point_service::analyze_code(&request.code, grading.passed);
        let weak_topics: Vec<String> = findings.iter().map(|f| f.topic.to_string()).collect();

        let outcome = Outcome::classify(grading.score, findings.len());

        // Remedial targeting considers the profile's accumulated weak points
        // too, with this submission's findings taking precedence.
        let mut focus_topics = weak_topics.clone();
        match WeakPointService::new(self.mongo.clone())
            .get_profile(user_id)
            .await
        {
            Ok(Some(profile)) => {
                for topic in profile.weak_point_topics() {
                    if !focus_topics.contains(&topic) {
                        focus_topics.push(topic);
                    }
                }
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(user_id, "Failed to load learner profile: {:#}", err),
        }

        let next_action = self
            .progression
            .plan_next_action(user_id, &node_id, exercise_id, outcome, &focus_topics)
            .await?;

        let record = SubmissionRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            exercise_id: exercise_id.to_string(),
            attempt_number,
            submitted_code: request.code.clone(),
            score: grading.score,
            passed: grading.passed,
            graded_by: grading.graded_by,
            breakdown: grading.breakdown.clone(),
            feedback: grading.feedback.summary.clone(),
            weak_points: weak_topics,
            outcome,
            next_action: next_action.clone(),
            submitted_at: time::now(),
            graded_at: time::now(),
        };

        self.attempts()
            .insert_one(&record)
            .await
            .context("Failed to store submission record")?;

        SUBMISSIONS_GRADED_TOTAL
            .with_label_values(&[outcome.as_str(), grading.graded_by.as_str()])
            .inc();

        self.persist_learner_profile(user_id, exercise_id, &findings, &grading);

        let response = SubmitExerciseResponse {
            submission_id: record.id,
            score: grading.score,
            passed: grading.passed,
            outcome,
            graded_by: grading.graded_by,
            feedback: grading.feedback.summary,
            next_action,
        };

        if let Some(key) = &request.idempotency_key {
            self.cache_response(user_id, key, &response).await;
        }

        Ok(response)
    }

    pub async fn get_result(
        &self,
        user_id: &str,
        submission_id: &str,
    ) -> anyhow::Result<SubmissionResultResponse> {
        let record = self
            .attempts()
            .find_one(doc! { "_id": submission_id, "user_id": user_id })
            .await
            .context("Failed to load submission")?
            .ok_or_else(|| CoreError::SubmissionNotFound(submission_id.to_string()))?;

        let hints_available = match self.find_exercise(user_id, &record.exercise_id).await {
            Ok((exercise, _)) => exercise.hints.len(),
            Err(_) => 0,
        };

        Ok(SubmissionResultResponse {
            submission_id: record.id,
            status: "graded".to_string(),
            score: record.score,
            passed: record.passed,
            feedback: record.feedback,
            outcome: record.outcome,
            next_action: record.next_action,
            hints_available,
        })
    }

    pub async fn exercise_detail(
        &self,
        user_id: &str,
        exercise_id: &str,
    ) -> anyhow::Result<ExerciseDetailResponse> {
        let (exercise, _) = self.find_exercise(user_id, exercise_id).await?;

        let attempts = self
            .attempts()
            .count_documents(doc! { "user_id": user_id, "exercise_id": exercise_id })
            .await
            .context("Failed to count attempts")?;

        let best = self
            .attempts()
            .find_one(doc! { "user_id": user_id, "exercise_id": exercise_id })
            .sort(doc! { "score": -1 })
            .await
            .context("Failed to load best attempt")?;

        let (best_score, completed) = best
            .map(|r| (r.score, r.passed))
            .unwrap_or((0, false));

        Ok(ExerciseDetailResponse {
            exercise: public_exercise(&exercise),
            user_progress: ExerciseProgress {
                attempts,
                best_score,
                completed,
            },
        })
    }

    /// Returns the requested hint level, one-indexed.
    pub async fn hint(
        &self,
        user_id: &str,
        exercise_id: &str,
        hint_number: usize,
    ) -> anyhow::Result<HintResponse> {
        let (exercise, _) = self.find_exercise(user_id, exercise_id).await?;
        let total = exercise.hints.len();

        if hint_number == 0 || hint_number > total {
            return Err(CoreError::InvalidHintNumber {
                given: hint_number,
                total,
            }
            .into());
        }

        Ok(HintResponse {
            hint: exercise.hints[hint_number - 1].hint.clone(),
            hints_remaining: total - hint_number,
        })
    }

    /// Locates an exercise by id. Remedial exercises live in the standalone
    /// collection; generated node exercises are embedded in content records
    /// and found through their derived id.
    pub async fn find_exercise(
        &self,
        user_id: &str,
        exercise_id: &str,
    ) -> anyhow::Result<(Exercise, String)> {
        if let Some(exercise) = self
            .standalone_exercises()
            .find_one(doc! { "exercise_id": exercise_id })
            .await
            .context("Failed to query exercises")?
        {
            let node_id = exercise.node_id.clone().unwrap_or_default();
            return Ok((exercise, node_id));
        }

        if let Some((node_id, _)) = split_exercise_id(exercise_id) {
            let record = self
                .content()
                .find_one(doc! { "user_id": user_id, "node_id": node_id })
                .await
                .context("Failed to query content for exercise")?;
            if let Some(record) = record {
                if let Some(exercise) = record
                    .exercises
                    .into_iter()
                    .find(|e| e.exercise_id == exercise_id)
                {
                    return Ok((exercise, node_id.to_string()));
                }
            }
        }

        Err(CoreError::ExerciseNotFound(exercise_id.to_string()).into())
    }

    async fn next_attempt_number(&self, user_id: &str, exercise_id: &str) -> anyhow::Result<i64> {
        let mut conn = self.redis.clone();
        let key = format!("attempts:{}:{}", user_id, exercise_id);
        let attempt: i64 = conn
            .incr(&key, 1)
            .await
            .context("Failed to increment attempt counter")?;
        Ok(attempt)
    }

    async fn cached_response(
        &self,
        user_id: &str,
        key: &str,
    ) -> anyhow::Result<Option<SubmitExerciseResponse>> {
        let mut conn = self.redis.clone();
        let redis_key = idempotency_key(user_id, key);
        let cached: Option<String> = conn
            .get(&redis_key)
            .await
            .context("Failed to read idempotency cache")?;
        Ok(cached.and_then(|raw| serde_json::from_str(&raw).ok()))
    }

    async fn cache_response(&self, user_id: &str, key: &str, response: &SubmitExerciseResponse) {
        let mut conn = self.redis.clone();
        let redis_key = idempotency_key(user_id, key);
        match serde_json::to_string(response) {
            Ok(raw) => {
                if let Err(err) = conn
                    .set_ex::<_, _, ()>(&redis_key, raw, IDEMPOTENCY_TTL_SECS)
                    .await
                {
                    tracing::warn!("Failed to cache idempotent response: {}", err);
                }
            }
            Err(err) => tracing::warn!("Failed to serialize idempotent response: {}", err),
        }
    }

    /// Profile updates happen off the request path. The grading response is
    /// already decided, so a slow or flaky profile write should not delay it.
    fn persist_learner_profile(
        &self,
        user_id: &str,
        exercise_id: &str,
        findings: &[weak_point_service::WeakPointFinding],
        grading: &GradingResult,
    ) {
        let mongo = self.mongo.clone();
        let user_id = user_id.to_string();
        let exercise_id = exercise_id.to_string();
        let findings = findings.to_vec();
        let passed = grading.passed;

        tokio::spawn(async move {
            let service = WeakPointService::new(mongo);

            for finding in &findings {
                let result = retry_async_with_config(RetryConfig::aggressive(), || {
                    service.record_finding(&user_id, &exercise_id, finding)
                })
                .await;
                if let Err(err) = result {
                    tracing::error!(
                        user_id,
                        topic = finding.topic,
                        "Failed to persist weak point: {:#}",
                        err
                    );
                }
            }

            let result = retry_async_with_config(RetryConfig::aggressive(), || {
                service.record_attempt_stats(&user_id, passed)
            })
            .await;
            if let Err(err) = result {
                tracing::error!(user_id, "Failed to persist attempt stats: {:#}", err);
            }
        });
    }
}

fn idempotency_key(user_id: &str, key: &str) -> String {
    format!("submission:idem:{}:{}", user_id, key)
}

/// Learner-facing view of an exercise. Solution and test cases stay out.
pub fn public_exercise(exercise: &Exercise) -> serde_json::Value {
    json!({
        "exercise_id": exercise.exercise_id,
        "node_id": exercise.node_id,
        "title": exercise.title,
        "description": exercise.description,
        "prompt": exercise.prompt,
        "difficulty": exercise.difficulty,
        "starter_code": exercise.starter_code,
        "hints_available": exercise.hints.len(),
        "focus_topics": exercise.focus_topics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::{Difficulty, Hint};

    fn sample_exercise() -> Exercise {
        Exercise {
            exercise_id: "python-vars-ex1".to_string(),
            node_id: Some("python-vars".to_string()),
            title: "First variable".to_string(),
            description: "d".to_string(),
            prompt: "p".to_string(),
            difficulty: Difficulty::Beginner,
            starter_code: "# start".to_string(),
            solution: "x = 5".to_string(),
            test_cases: vec![],
            hints: vec![Hint {
                level: 1,
                hint: "use =".to_string(),
            }],
            focus_topics: vec![],
            generated_by_ai: true,
            created_for_user: None,
        }
    }

    #[test]
    fn public_view_excludes_solution() {
        let view = public_exercise(&sample_exercise());
        assert!(view.get("solution").is_none());
        assert!(view.get("test_cases").is_none());
        assert_eq!(view["hints_available"], 1);
        assert_eq!(view["exercise_id"], "python-vars-ex1");
    }

    #[test]
    fn idempotency_keys_are_scoped_per_user() {
        assert_ne!(idempotency_key("a", "k"), idempotency_key("b", "k"));
        assert_eq!(idempotency_key("u", "k"), "submission:idem:u:k");
    }
}
