use mongodb::bson::DateTime as BsonDateTime;
use serde::{Deserialize, Serialize};

pub mod agent;
pub mod content;
pub mod progress;
pub mod submission;
pub mod weak_point;

/// A single teachable unit: one lecture plus an ordered set of exercises.
/// Node identifiers embed the path prefix (e.g. "python-variables" belongs
/// to the "python" path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: String,
    pub title: String,
    pub description: String,
    pub difficulty: String,
    #[serde(default)]
    pub estimated_duration: i32,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub skills_taught: Vec<String>,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_for_user: Option<String>,
    pub created_at: BsonDateTime,
    #[serde(default = "default_active")]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRecord {
    pub path_id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub user_id: String,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: BsonDateTime,
    #[serde(default = "default_active")]
    pub status: String,
}

fn default_active() -> String {
    "active".to_string()
}

/// Extracts the path prefix from a node identifier.
/// "python-variables" -> "python"; identifiers without a dash are their own path.
pub fn path_id_of(node_id: &str) -> &str {
    match node_id.split_once('-') {
        Some((prefix, _)) => prefix,
        None => node_id,
    }
}

/// Splits an exercise identifier back into its (node_id, ordinal) parts.
/// Exercise identifiers are derived as "{node_id}-ex{ordinal}" so they can be
/// located without a lookup table. Remedial identifiers do not match.
pub fn split_exercise_id(exercise_id: &str) -> Option<(&str, u32)> {
    let (node_id, ordinal) = exercise_id.rsplit_once("-ex")?;
    let ordinal: u32 = ordinal.parse().ok()?;
    if node_id.is_empty() {
        return None;
    }
    Some((node_id, ordinal))
}

#[cfg(test)]
mod tests {
    use super::{path_id_of, split_exercise_id};

    #[test]
    fn path_prefix_extraction() {
        assert_eq!(path_id_of("python-variables"), "python");
        assert_eq!(path_id_of("python-control-flow"), "python");
        assert_eq!(path_id_of("rust"), "rust");
    }

    #[test]
    fn exercise_id_round_trip() {
        assert_eq!(
            split_exercise_id("python-variables-ex2"),
            Some(("python-variables", 2))
        );
        assert_eq!(split_exercise_id("go-basics-ex10"), Some(("go-basics", 10)));
        assert_eq!(split_exercise_id("python-variables"), None);
        assert_eq!(split_exercise_id("python-variables-exabc"), None);
    }
}
