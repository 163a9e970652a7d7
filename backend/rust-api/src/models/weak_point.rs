use mongodb::bson::DateTime as BsonDateTime;
use serde::{Deserialize, Serialize};

/// A persistent skill-gap tag for one learner, keyed by topic. Created on
/// first detection, incremented on repeats, never deleted automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeakPoint {
    pub topic: String,
    pub description: String,
    pub identified_at: BsonDateTime,
    pub last_seen: BsonDateTime,
    pub occurrences: i64,
    #[serde(default)]
    pub exercises_failed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default = "default_experience")]
    pub experience_level: String,
    #[serde(default)]
    pub weak_points: Vec<WeakPoint>,
    #[serde(default)]
    pub total_exercises_completed: i64,
    #[serde(default)]
    pub total_exercises_failed: i64,
    #[serde(default)]
    pub last_active: Option<BsonDateTime>,
}

fn default_experience() -> String {
    "beginner".to_string()
}

impl UserProfile {
    pub fn weak_point_topics(&self) -> Vec<String> {
        self.weak_points
            .iter()
            .map(|wp| wp.topic.clone())
            .collect()
    }
}
