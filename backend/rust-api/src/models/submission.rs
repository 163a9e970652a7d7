use mongodb::bson::DateTime as BsonDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Minimum score for a submission to count as passing.
pub const PASS_THRESHOLD: i32 = 70;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Perfect,
    PassedWithWeaknesses,
    NeedsRemediation,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Perfect => "perfect",
            Outcome::PassedWithWeaknesses => "passed_with_weaknesses",
            Outcome::NeedsRemediation => "needs_remediation",
            Outcome::Failed => "failed",
        }
    }

    /// Decision table for submission outcomes; rows evaluated top to bottom.
    /// A high score with any detected weak point falls through to the >=70
    /// branch: perfection requires both the score and zero weaknesses.
    pub fn classify(score: i32, weak_point_count: usize) -> Self {
        if score >= 90 && weak_point_count == 0 {
            Outcome::Perfect
        } else if score >= 70 {
            if weak_point_count > 2 {
                Outcome::NeedsRemediation
            } else {
                Outcome::PassedWithWeaknesses
            }
        } else if score >= 50 {
            Outcome::NeedsRemediation
        } else {
            Outcome::Failed
        }
    }
}

/// The single pedagogical action a learner is routed to after grading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NextAction {
    NavigateToNode {
        node_id: String,
        reason: String,
    },
    NavigateToExercise {
        exercise_id: String,
        reason: String,
        #[serde(default, skip_serializing_if = "is_false")]
        auto_hint: bool,
    },
    CompletePath {
        reason: String,
    },
    Retry {
        reason: String,
        show_hint_button: bool,
    },
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GradedBy {
    Model,
    FallbackHeuristic,
}

impl GradedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GradedBy::Model => "model",
            GradedBy::FallbackHeuristic => "fallback_heuristic",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingBreakdown {
    pub correctness: i32,
    pub quality: i32,
    pub efficiency: i32,
    pub best_practices: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingFeedback {
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub specific_issues: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingResult {
    pub score: i32,
    pub passed: bool,
    pub breakdown: GradingBreakdown,
    pub feedback: GradingFeedback,
    pub next_steps: String,
    pub graded_by: GradedBy,
}

/// One grading event, persisted to `exercise_attempts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub exercise_id: String,
    pub attempt_number: i64,
    pub submitted_code: String,
    pub score: i32,
    pub passed: bool,
    pub graded_by: GradedBy,
    pub breakdown: GradingBreakdown,
    pub feedback: String,
    #[serde(default)]
    pub weak_points: Vec<String>,
    pub outcome: Outcome,
    pub next_action: NextAction,
    pub submitted_at: BsonDateTime,
    pub graded_at: BsonDateTime,
}

#[derive(Debug, Deserialize)]
pub struct SubmitExerciseRequest {
    pub code: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitExerciseResponse {
    pub submission_id: String,
    pub score: i32,
    pub passed: bool,
    pub outcome: Outcome,
    pub graded_by: GradedBy,
    pub feedback: String,
    pub next_action: NextAction,
}

#[derive(Debug, Serialize)]
pub struct SubmissionResultResponse {
    pub submission_id: String,
    pub status: String,
    pub score: i32,
    pub passed: bool,
    pub feedback: String,
    pub outcome: Outcome,
    pub next_action: NextAction,
    pub hints_available: usize,
}

#[derive(Debug, Deserialize)]
pub struct HintRequest {
    pub hint_number: usize,
}

#[derive(Debug, Serialize)]
pub struct HintResponse {
    pub hint: String,
    pub hints_remaining: usize,
}

#[derive(Debug, Serialize)]
pub struct ExerciseDetailResponse {
    pub exercise: Value,
    pub user_progress: ExerciseProgress,
}

#[derive(Debug, Serialize)]
pub struct ExerciseProgress {
    pub attempts: u64,
    pub best_score: i32,
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::{NextAction, Outcome};

    #[test]
    fn outcome_decision_table() {
        assert_eq!(Outcome::classify(95, 0), Outcome::Perfect);
        assert_eq!(Outcome::classify(90, 0), Outcome::Perfect);
        assert_eq!(Outcome::classify(95, 1), Outcome::PassedWithWeaknesses);
        assert_eq!(Outcome::classify(72, 3), Outcome::NeedsRemediation);
        assert_eq!(Outcome::classify(70, 2), Outcome::PassedWithWeaknesses);
        assert_eq!(Outcome::classify(55, 0), Outcome::NeedsRemediation);
        assert_eq!(Outcome::classify(50, 5), Outcome::NeedsRemediation);
        assert_eq!(Outcome::classify(49, 0), Outcome::Failed);
        assert_eq!(Outcome::classify(40, 0), Outcome::Failed);
    }

    #[test]
    fn outcome_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Outcome::PassedWithWeaknesses).unwrap(),
            "\"passed_with_weaknesses\""
        );
    }

    #[test]
    fn next_action_is_tagged() {
        let action = NextAction::NavigateToExercise {
            exercise_id: "python-variables-ex3".to_string(),
            reason: "Good job! Let's practice more.".to_string(),
            auto_hint: false,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "navigate_to_exercise");
        assert_eq!(json["exercise_id"], "python-variables-ex3");
        // auto_hint is omitted when false
        assert!(json.get("auto_hint").is_none());
    }

    #[test]
    fn auto_hint_serialized_when_set() {
        let action = NextAction::NavigateToExercise {
            exercise_id: "x-ex1".to_string(),
            reason: "r".to_string(),
            auto_hint: true,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["auto_hint"], true);
    }
}
