use mongodb::bson::DateTime as BsonDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }

    /// Default difficulty ladder for generated exercise sequences:
    /// first exercise beginner, second intermediate, the rest advanced.
    pub fn for_ordinal(index: usize) -> Self {
        match index {
            0 => Difficulty::Beginner,
            1 => Difficulty::Intermediate,
            _ => Difficulty::Advanced,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeExample {
    pub language: String,
    pub code: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub body: String,
    #[serde(default)]
    pub code_examples: Vec<CodeExample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lecture {
    pub title: String,
    #[serde(default)]
    pub introduction: String,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub next_steps: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub test_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub expected_output: Value,
    #[serde(default)]
    pub validation_script: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hint {
    pub level: u32,
    pub hint: String,
}

/// One practice exercise. The `solution` field is used for grading only and
/// must never reach a learner-facing payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub exercise_id: String,
    #[serde(default)]
    pub node_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub prompt: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub starter_code: String,
    pub solution: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub hints: Vec<Hint>,
    #[serde(default)]
    pub focus_topics: Vec<String>,
    #[serde(default)]
    pub generated_by_ai: bool,
    #[serde(default)]
    pub created_for_user: Option<String>,
}

/// Pre-generated course content for one (learner, node) pair.
/// Exactly one record exists per pair; regeneration replaces it wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub path_id: String,
    pub node_id: String,
    pub user_id: String,
    #[serde(default = "default_version")]
    pub content_version: i32,
    pub lecture: Lecture,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    pub generated_at: BsonDateTime,
    #[serde(default)]
    pub last_accessed: Option<BsonDateTime>,
    #[serde(default)]
    pub access_count: i64,
}

fn default_version() -> i32 {
    1
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    LectureSection,
    Exercise,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::LectureSection => "lecture_section",
            StepKind::Exercise => "exercise",
        }
    }
}

/// A transient presentation unit derived from a ContentRecord. Steps are
/// rebuilt on every request and carry no identity beyond their ordinal.
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub step_type: StepKind,
    pub section_name: String,
    pub title: String,
    pub content: Value,
}

/// Wire shape for one step: the step fields are flattened so clients see
/// `{step_number, total_steps, step_type, content, has_next, has_previous}`.
#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub node_id: String,
    pub step_number: usize,
    pub total_steps: usize,
    #[serde(flatten)]
    pub step: Step,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Serialize)]
pub struct StepSummary {
    pub step_number: usize,
    pub step_type: StepKind,
    pub title: String,
    pub section_name: String,
}

#[derive(Debug, Serialize)]
pub struct StartNodeResponse {
    pub node_id: String,
    pub node_title: String,
    pub step_number: usize,
    pub total_steps: usize,
    #[serde(flatten)]
    pub step: Step,
    pub has_next: bool,
    pub has_previous: bool,
    pub content_ready: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerationStatus {
    pub path_id: String,
    pub generated: bool,
    pub nodes_with_content: u64,
    pub total_nodes: u64,
    pub completion_percentage: i32,
    pub generated_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExerciseCompletionResponse {
    pub success: bool,
    pub node_progress: i32,
    pub exercises_completed: i32,
    pub total_exercises: i32,
    pub node_completed: bool,
}

#[cfg(test)]
mod tests {
    use super::Difficulty;

    #[test]
    fn difficulty_ladder() {
        assert_eq!(Difficulty::for_ordinal(0), Difficulty::Beginner);
        assert_eq!(Difficulty::for_ordinal(1), Difficulty::Intermediate);
        assert_eq!(Difficulty::for_ordinal(2), Difficulty::Advanced);
        assert_eq!(Difficulty::for_ordinal(7), Difficulty::Advanced);
    }

    #[test]
    fn difficulty_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Difficulty::Beginner).unwrap(),
            "\"beginner\""
        );
    }
}
