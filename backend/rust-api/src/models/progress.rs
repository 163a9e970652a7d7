use mongodb::bson::DateTime as BsonDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        }
    }
}

fn default_status() -> ProgressStatus {
    ProgressStatus::NotStarted
}

/// Per (learner, node) progress. The lecture and exercise contributions are
/// stored separately (each capped at 50) and summed into the completion
/// percentage. Lecture points merge via $max so the value never decreases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: String,
    pub node_id: String,
    #[serde(default = "default_status")]
    pub status: ProgressStatus,
    #[serde(default)]
    pub completion_percentage: i32,
    #[serde(default)]
    pub lecture_points: i32,
    #[serde(default)]
    pub exercise_points: i32,
    #[serde(default)]
    pub exercises_completed: i32,
    #[serde(default)]
    pub started_at: Option<BsonDateTime>,
    #[serde(default)]
    pub last_accessed: Option<BsonDateTime>,
    #[serde(default)]
    pub completed_at: Option<BsonDateTime>,
}
