use mongodb::bson::DateTime as BsonDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::{Difficulty, TestCase};

/// Evidence that lecture content was actually shown to a learner.
/// Consulted by the content-display gate before exercise creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayedContentRecord {
    pub content_id: String,
    pub title: String,
    pub content_type: String,
    #[serde(default)]
    pub sections: Value,
    pub created_for_user: String,
    pub generated_by_ai: bool,
    pub created_at: BsonDateTime,
}

/// Assistant turns inspected by the discovery-question gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub timestamp: BsonDateTime,
}

#[derive(Debug, Deserialize)]
pub struct DisplayContentRequest {
    pub title: String,
    pub content_type: String,
    #[serde(default)]
    pub sections: Value,
}

#[derive(Debug, Deserialize)]
pub struct CreateExerciseRequest {
    pub node_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub prompt: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub starter_code: Option<String>,
    pub solution: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Deserialize)]
pub struct CreateNodeRequest {
    pub node_id: String,
    pub title: String,
    pub description: String,
    pub difficulty: String,
    #[serde(default)]
    pub estimated_duration: Option<i32>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub concepts: Vec<String>,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    /// Conversation the discovery-question gate should inspect.
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePathRequest {
    pub path_id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
}
