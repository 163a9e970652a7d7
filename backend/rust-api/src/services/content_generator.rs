//! Generates lecture content and exercises through the model service and
//! persists them as per-learner content records.
//!
//! Generation is idempotent at the (learner, node) level: a node that already
//! has content is never regenerated implicitly. Whole-path generation runs as
//! a detached task so the triggering request returns immediately.

use anyhow::Context;
use mongodb::bson::doc;
use mongodb::{Collection, Database};
use reqwest::Client;
use serde_json::Value;
use uuid::Uuid;

use crate::error::CoreError;
use crate::metrics::{CONTENT_GENERATIONS_TOTAL, REMEDIAL_EXERCISES_TOTAL};
use crate::models::content::{
    ContentRecord, Difficulty, Exercise, GenerationStatus, Hint, Lecture, TestCase,
};
use crate::models::{path_id_of, NodeRecord};
use crate::services::model_client::{
    self, ExercisesRequest, LectureRequest, TargetedExerciseRequest,
};
use crate::utils::{json_repair, time};

const EXERCISES_PER_NODE: u32 = 3;

#[derive(Clone)]
pub struct ContentGenerator {
    mongo: Database,
    http: Client,
    model_api_url: String,
}

impl ContentGenerator {
    pub fn new(mongo: Database, model_api_url: String) -> Self {
        Self {
            mongo,
            http: Client::new(),
            model_api_url,
        }
    }

    fn content_collection(&self) -> Collection<ContentRecord> {
        self.mongo.collection("course_content")
    }

    fn nodes(&self) -> Collection<NodeRecord> {
        self.mongo.collection("learning_nodes")
    }

    fn standalone_exercises(&self) -> Collection<Exercise> {
        self.mongo.collection("exercises")
    }

    pub async fn get_content(
        &self,
        user_id: &str,
        node_id: &str,
    ) -> anyhow::Result<Option<ContentRecord>> {
        self.content_collection()
            .find_one(doc! { "user_id": user_id, "node_id": node_id })
            .await
            .context("Failed to load content record")
    }

    /// Returns existing content for the node, generating it on first access.
    pub async fn ensure_node_content(
        &self,
        user_id: &str,
        node_id: &str,
    ) -> anyhow::Result<ContentRecord> {
        if let Some(existing) = self.get_content(user_id, node_id).await? {
            self.touch_access(user_id, node_id).await?;
            return Ok(existing);
        }

        let node = self
            .nodes()
            .find_one(doc! { "node_id": node_id })
            .await
            .context("Failed to load learning node")?
            .ok_or_else(|| CoreError::NodeNotFound(node_id.to_string()))?;

        self.generate_node_content(user_id, &node).await
    }

    /// Generates lecture and exercises for one node and replaces whatever
    /// record existed before.
    pub async fn generate_node_content(
        &self,
        user_id: &str,
        node: &NodeRecord,
    ) -> anyhow::Result<ContentRecord> {
        tracing::info!(node_id = %node.node_id, user_id, "Generating node content");

        let lecture = self.generate_lecture(user_id, node).await;
        let exercises = self.generate_exercises(node).await;

        let record = ContentRecord {
            path_id: path_id_of(&node.node_id).to_string(),
            node_id: node.node_id.clone(),
            user_id: user_id.to_string(),
            content_version: 1,
            lecture,
            exercises,
            generated_at: time::now(),
            last_accessed: None,
            access_count: 0,
        };

        self.content_collection()
            .replace_one(
                doc! { "user_id": user_id, "node_id": &node.node_id },
                &record,
            )
            .upsert(true)
            .await
            .context("Failed to store content record")?;

        CONTENT_GENERATIONS_TOTAL
            .with_label_values(&["success"])
            .inc();
        Ok(record)
    }

    /// Drops the stored record and generates a fresh one.
    pub async fn regenerate(&self, user_id: &str, node_id: &str) -> anyhow::Result<ContentRecord> {
        self.content_collection()
            .delete_one(doc! { "user_id": user_id, "node_id": node_id })
            .await
            .context("Failed to delete content record")?;
        self.ensure_node_content(user_id, node_id).await
    }

    async fn generate_lecture(&self, user_id: &str, node: &NodeRecord) -> Lecture {
        let request = LectureRequest {
            node_id: node.node_id.clone(),
            title: node.title.clone(),
            description: node.description.clone(),
            concepts: node.skills_taught.clone(),
            difficulty: node.difficulty.clone(),
            user_level: "beginner".to_string(),
        };

        let value = match model_client::generate_lecture(&self.http, &self.model_api_url, &request)
            .await
        {
            Ok(raw) => json_repair::parse_lenient(&raw),
            Err(err) => {
                tracing::warn!(node_id = %node.node_id, user_id, "Lecture generation failed: {:#}", err);
                json_repair::fallback_value()
            }
        };

        lecture_from_value(value, &node.title)
    }

    async fn generate_exercises(&self, node: &NodeRecord) -> Vec<Exercise> {
        let request = ExercisesRequest {
            node_id: node.node_id.clone(),
            title: node.title.clone(),
            concepts: node.skills_taught.clone(),
            count: EXERCISES_PER_NODE,
            user_level: "beginner".to_string(),
        };

        let raw = match model_client::generate_exercises(&self.http, &self.model_api_url, &request)
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(node_id = %node.node_id, "Exercise generation failed: {:#}", err);
                return vec![];
            }
        };

        let value = json_repair::parse_lenient(&raw);
        exercises_from_value(value, &node.node_id)
    }

    /// Generates one remedial exercise aimed at a specific weak topic and
    /// stores it in the standalone exercise collection.
    pub async fn generate_targeted_exercise(
        &self,
        user_id: &str,
        node_id: &str,
        topic: &str,
        weak_points: Vec<String>,
    ) -> anyhow::Result<Exercise> {
        let request = TargetedExerciseRequest {
            node_id: node_id.to_string(),
            topic: topic.to_string(),
            weak_points,
            user_level: "beginner".to_string(),
        };

        let raw =
            model_client::generate_targeted_exercise(&self.http, &self.model_api_url, &request)
                .await
                .context("Targeted exercise generation failed")?;
        let value = json_repair::parse_lenient(&raw);

        let exercise_id = format!("{}-remedial-{}", node_id, Uuid::new_v4());
        let mut exercise = exercise_from_value(&value, exercise_id, node_id, Difficulty::Beginner)
            .context("Model returned no usable exercise")?;
        exercise.focus_topics = vec![topic.to_string()];
        exercise.created_for_user = Some(user_id.to_string());

        self.standalone_exercises()
            .insert_one(&exercise)
            .await
            .context("Failed to store remedial exercise")?;

        REMEDIAL_EXERCISES_TOTAL.inc();
        tracing::info!(exercise_id = %exercise.exercise_id, topic, "Created remedial exercise");
        Ok(exercise)
    }

    /// Kicks off content generation for every node of a path in a detached
    /// task. Nodes that already have content are skipped, so re-triggering is
    /// harmless.
    pub fn spawn_path_generation(&self, user_id: String, path_id: String) {
        let generator = self.clone();
        tokio::spawn(async move {
            if let Err(err) = generator.generate_path(&user_id, &path_id).await {
                tracing::error!(path_id, user_id, "Path generation failed: {:#}", err);
            }
        });
    }

    async fn generate_path(&self, user_id: &str, path_id: &str) -> anyhow::Result<()> {
        use futures::stream::TryStreamExt;

        let pattern = format!("^{}", regex::escape(path_id));
        let nodes: Vec<NodeRecord> = self
            .nodes()
            .find(doc! { "node_id": { "$regex": &pattern } })
            .sort(doc! { "node_id": 1 })
            .await
            .context("Failed to list path nodes")?
            .try_collect()
            .await
            .context("Failed to read path nodes")?;

        tracing::info!(path_id, count = nodes.len(), "Starting bulk path generation");

        for node in nodes {
            if self.get_content(user_id, &node.node_id).await?.is_some() {
                tracing::debug!(node_id = %node.node_id, "Content exists, skipping");
                continue;
            }
            if let Err(err) = self.generate_node_content(user_id, &node).await {
                CONTENT_GENERATIONS_TOTAL
                    .with_label_values(&["failed"])
                    .inc();
                tracing::warn!(node_id = %node.node_id, "Node generation failed: {:#}", err);
            }
        }

        tracing::info!(path_id, "Bulk path generation finished");
        Ok(())
    }

    pub async fn generation_status(
        &self,
        user_id: &str,
        path_id: &str,
    ) -> anyhow::Result<GenerationStatus> {
        let pattern = format!("^{}", regex::escape(path_id));
        let total_nodes = self
            .nodes()
            .count_documents(doc! { "node_id": { "$regex": &pattern } })
            .await
            .context("Failed to count path nodes")?;
        let nodes_with_content = self
            .content_collection()
            .count_documents(doc! { "user_id": user_id, "path_id": path_id })
            .await
            .context("Failed to count generated content")?;

        let latest = self
            .content_collection()
            .find_one(doc! { "user_id": user_id, "path_id": path_id })
            .sort(doc! { "generated_at": -1 })
            .await
            .context("Failed to load latest content record")?;

        let completion_percentage = if total_nodes == 0 {
            0
        } else {
            ((nodes_with_content.min(total_nodes) * 100) / total_nodes) as i32
        };

        Ok(GenerationStatus {
            path_id: path_id.to_string(),
            generated: total_nodes > 0 && nodes_with_content >= total_nodes,
            nodes_with_content,
            total_nodes,
            completion_percentage,
            generated_at: latest.map(|r| time::bson_to_iso(r.generated_at)),
        })
    }

    async fn touch_access(&self, user_id: &str, node_id: &str) -> anyhow::Result<()> {
        self.content_collection()
            .update_one(
                doc! { "user_id": user_id, "node_id": node_id },
                doc! {
                    "$inc": { "access_count": 1 },
                    "$set": { "last_accessed": time::now() },
                },
            )
            .await
            .context("Failed to update content access")?;
        Ok(())
    }
}

fn lecture_from_value(value: Value, fallback_title: &str) -> Lecture {
    match serde_json::from_value::<Lecture>(value) {
        Ok(mut lecture) => {
            if lecture.title.is_empty() {
                lecture.title = fallback_title.to_string();
            }
            lecture
        }
        Err(err) => {
            tracing::warn!("Lecture payload did not match schema: {}", err);
            Lecture {
                title: fallback_title.to_string(),
                introduction: "Content is being generated. Please try again.".to_string(),
                sections: vec![],
                summary: String::new(),
                next_steps: None,
            }
        }
    }
}

/// Builds the exercise list from a model payload. Accepts either a bare
/// array or an object with an `exercises` field.
fn exercises_from_value(value: Value, node_id: &str) -> Vec<Exercise> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("exercises") {
            Some(Value::Array(items)) => items,
            _ => return vec![],
        },
        _ => return vec![],
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let exercise_id = format!("{}-ex{}", node_id, i + 1);
            exercise_from_value(item, exercise_id, node_id, Difficulty::for_ordinal(i))
        })
        .collect()
}

fn exercise_from_value(
    value: &Value,
    exercise_id: String,
    node_id: &str,
    difficulty: Difficulty,
) -> Option<Exercise> {
    let title = value.get("title")?.as_str()?.to_string();
    let prompt = value
        .get("prompt")
        .or_else(|| value.get("description"))?
        .as_str()?
        .to_string();
    let solution = value
        .get("solution")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let mut starter_code = value
        .get("starter_code")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    // a starter identical to the solution would hand out the answer
    if !solution.is_empty() && starter_code.trim() == solution.trim() {
        tracing::warn!(%exercise_id, "Starter code equals solution, clearing it");
        starter_code = String::new();
    }

    let hints = value
        .get("hints")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter_map(|(i, h)| {
                    let text = h.as_str().or_else(|| h.get("hint")?.as_str())?;
                    Some(Hint {
                        level: i as u32 + 1,
                        hint: text.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let test_cases = value
        .get("test_cases")
        .cloned()
        .and_then(|tc| serde_json::from_value::<Vec<TestCase>>(tc).ok())
        .unwrap_or_default();

    Some(Exercise {
        exercise_id,
        node_id: Some(node_id.to_string()),
        title,
        description: value
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        prompt,
        difficulty,
        starter_code,
        solution,
        test_cases,
        hints,
        focus_topics: vec![],
        generated_by_ai: true,
        created_for_user: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exercises_get_derived_ids_and_difficulty_ladder() {
        let value = json!({"exercises": [
            {"title": "A", "prompt": "do a", "solution": "a"},
            {"title": "B", "prompt": "do b", "solution": "b"},
            {"title": "C", "prompt": "do c", "solution": "c"},
        ]});
        let exercises = exercises_from_value(value, "python-vars");
        assert_eq!(exercises.len(), 3);
        assert_eq!(exercises[0].exercise_id, "python-vars-ex1");
        assert_eq!(exercises[2].exercise_id, "python-vars-ex3");
        assert_eq!(exercises[0].difficulty, Difficulty::Beginner);
        assert_eq!(exercises[1].difficulty, Difficulty::Intermediate);
        assert_eq!(exercises[2].difficulty, Difficulty::Advanced);
    }

    #[test]
    fn bare_array_payload_is_accepted() {
        let value = json!([{"title": "A", "prompt": "p", "solution": "s"}]);
        assert_eq!(exercises_from_value(value, "n").len(), 1);
    }

    #[test]
    fn starter_equal_to_solution_is_cleared() {
        let value = json!({
            "title": "A",
            "prompt": "p",
            "solution": "x = 5",
            "starter_code": "x = 5",
        });
        let exercise =
            exercise_from_value(&value, "n-ex1".into(), "n", Difficulty::Beginner).unwrap();
        assert!(exercise.starter_code.is_empty());
        assert_eq!(exercise.solution, "x = 5");
    }

    #[test]
    fn malformed_items_are_dropped() {
        let value = json!([
            {"title": "ok", "prompt": "p", "solution": "s"},
            {"no_title": true},
        ]);
        let exercises = exercises_from_value(value, "n");
        assert_eq!(exercises.len(), 1);
        assert_eq!(exercises[0].exercise_id, "n-ex1");
    }

    #[test]
    fn hints_accept_strings_and_objects() {
        let value = json!({
            "title": "A",
            "prompt": "p",
            "solution": "s",
            "hints": ["try x", {"hint": "try y"}],
        });
        let exercise =
            exercise_from_value(&value, "n-ex1".into(), "n", Difficulty::Beginner).unwrap();
        assert_eq!(exercise.hints.len(), 2);
        assert_eq!(exercise.hints[0].level, 1);
        assert_eq!(exercise.hints[1].hint, "try y");
    }

    #[test]
    fn fallback_lecture_keeps_node_title() {
        let lecture = lecture_from_value(json!("not an object"), "Variables");
        assert_eq!(lecture.title, "Variables");
        assert!(lecture.sections.is_empty());
    }
}
