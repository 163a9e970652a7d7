//! End-to-end checks of the grading and progression pipeline using in-memory
//! data: content record -> steps -> grade -> outcome -> next action.

use mongodb::bson::DateTime as BsonDateTime;
use serde_json::json;

use tutorflow_api::models::content::{
    ContentRecord, Difficulty, Exercise, Hint, Lecture, Section, StepKind,
};
use tutorflow_api::models::submission::{NextAction, Outcome};
use tutorflow_api::models::split_exercise_id;
use tutorflow_api::services::grading_service;
use tutorflow_api::services::progress_service::{exercise_progress, lecture_progress};
use tutorflow_api::services::step_sequencer;
use tutorflow_api::services::weak_point_service::analyze_code;
use tutorflow_api::utils::json_repair::parse_lenient;

fn exercise(node_id: &str, n: usize) -> Exercise {
    Exercise {
        exercise_id: format!("{}-ex{}", node_id, n),
        node_id: Some(node_id.to_string()),
        title: format!("Exercise {}", n),
        description: String::new(),
        prompt: "Write a function".to_string(),
        difficulty: Difficulty::for_ordinal(n - 1),
        starter_code: String::new(),
        solution: "def f():\n    return 1".to_string(),
        test_cases: vec![],
        hints: vec![Hint {
            level: 1,
            hint: "Define a function".to_string(),
        }],
        focus_topics: vec![],
        generated_by_ai: true,
        created_for_user: None,
    }
}

fn record_with_three_exercises() -> ContentRecord {
    ContentRecord {
        path_id: "python".to_string(),
        node_id: "python-functions".to_string(),
        user_id: "learner-1".to_string(),
        content_version: 1,
        lecture: Lecture {
            title: "Functions".to_string(),
            introduction: "Functions bundle reusable logic.".to_string(),
            sections: vec![Section {
                heading: "Defining functions".to_string(),
                body: "Use def.".to_string(),
                code_examples: vec![],
            }],
            summary: "You can now define functions.".to_string(),
            next_steps: None,
        },
        exercises: (1..=3).map(|n| exercise("python-functions", n)).collect(),
        generated_at: BsonDateTime::now(),
        last_accessed: None,
        access_count: 0,
    }
}

#[test]
fn steps_cover_lecture_then_exercises() {
    let record = record_with_three_exercises();
    let steps = step_sequencer::build_steps(&record);

    // intro + 1 section + summary + 3 exercises
    assert_eq!(steps.len(), 6);
    assert_eq!(step_sequencer::lecture_step_count(&record), 3);
    assert!(steps[..3]
        .iter()
        .all(|s| s.step_type == StepKind::LectureSection));
    assert!(steps[3..].iter().all(|s| s.step_type == StepKind::Exercise));

    // reading the full lecture is worth exactly half the node
    assert_eq!(lecture_progress(3, 3), 50);
    // finishing all exercises is the other half
    assert_eq!(exercise_progress(3, 3), 50);
}

#[test]
fn passed_with_weaknesses_routes_to_next_exercise() {
    let record = record_with_three_exercises();

    // second exercise submitted with a decent score but a missing construct
    let submitted = "def f(xs):\n    return xs[0]";
    let grading = grading_service::normalize_model_grade(&json!({
        "score": 85,
        "feedback": {"summary": "Works, but no iteration."}
    }));
    assert!(grading.passed);

    let findings = analyze_code(submitted, grading.passed);
    let outcome = Outcome::classify(grading.score, findings.len());
    assert_eq!(outcome, Outcome::PassedWithWeaknesses);

    // the planner would pick the third exercise of the node
    let (node_id, ordinal) = split_exercise_id("python-functions-ex2").unwrap();
    assert_eq!(node_id, record.node_id);
    let next = record.exercises.get(ordinal as usize).unwrap();
    assert_eq!(next.exercise_id, "python-functions-ex3");

    let action = NextAction::NavigateToExercise {
        exercise_id: next.exercise_id.clone(),
        reason: "Good work! Let's reinforce these concepts with the next exercise.".to_string(),
        auto_hint: false,
    };
    let value = serde_json::to_value(&action).unwrap();
    assert_eq!(value["type"], "navigate_to_exercise");
    assert_eq!(value["exercise_id"], "python-functions-ex3");
}

#[test]
fn failing_submission_is_told_to_retry() {
    let grading = grading_service::heuristic_grade("idk");
    assert_eq!(grading.score, 30);
    assert!(!grading.passed);

    let findings = analyze_code("idk", grading.passed);
    let outcome = Outcome::classify(grading.score, findings.len());
    assert_eq!(outcome, Outcome::Failed);

    let action = NextAction::Retry {
        reason: "Not quite there yet. Review the feedback and try again.".to_string(),
        show_hint_button: true,
    };
    let value = serde_json::to_value(&action).unwrap();
    assert_eq!(value["type"], "retry");
    assert_eq!(value["show_hint_button"], true);
}

#[test]
fn perfect_run_on_last_exercise_completes_cleanly() {
    let submitted = "def solve(xs):\n    for x in xs:\n        if x > 0:\n            return x";
    let grading = grading_service::normalize_model_grade(&json!({"score": 95}));
    let findings = analyze_code(submitted, grading.passed);
    assert!(findings.is_empty());
    assert_eq!(
        Outcome::classify(grading.score, findings.len()),
        Outcome::Perfect
    );

    let action = NextAction::CompletePath {
        reason: "You have completed every topic in this path. Well done!".to_string(),
    };
    assert_eq!(
        serde_json::to_value(&action).unwrap()["type"],
        "complete_path"
    );
}

#[test]
fn truncated_grading_payload_still_produces_an_outcome() {
    // model output cut off after the object closed
    let raw = r#"{"score": 72, "feedback": {"summary": "ok"}} and then the model kept talk"#;
    let value = parse_lenient(raw);
    let grading = grading_service::normalize_model_grade(&value);
    assert_eq!(grading.score, 72);
    assert!(grading.passed);

    let findings = analyze_code("x = 1", grading.passed);
    // no function, loop or conditional: three findings push into remediation
    assert_eq!(
        Outcome::classify(grading.score, findings.len()),
        Outcome::NeedsRemediation
    );
}

#[test]
fn garbage_grading_payload_falls_back_to_zero() {
    let value = parse_lenient("the model returned prose instead of a grade");
    let grading = grading_service::normalize_model_grade(&value);
    assert_eq!(grading.score, 0);
    assert!(!grading.passed);
}
