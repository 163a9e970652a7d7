//! Flattens a content record into the ordered step list served to learners.
//!
//! The order is fixed: introduction, lecture sections, summary, then
//! exercises. Steps are derived on every request from the stored record, so
//! there is no step state to migrate when content is regenerated.

use serde_json::json;

use crate::models::content::{ContentRecord, Step, StepKind, StepSummary};

pub fn build_steps(record: &ContentRecord) -> Vec<Step> {
    let lecture = &record.lecture;
    let mut steps = Vec::with_capacity(lecture.sections.len() + record.exercises.len() + 2);

    if !lecture.introduction.is_empty() {
        steps.push(Step {
            step_type: StepKind::LectureSection,
            section_name: "introduction".to_string(),
            title: lecture.title.clone(),
            content: json!({ "text": lecture.introduction }),
        });
    }

    for (i, section) in lecture.sections.iter().enumerate() {
        steps.push(Step {
            step_type: StepKind::LectureSection,
            section_name: format!("section_{}", i + 1),
            title: section.heading.clone(),
            content: json!({
                "text": section.body,
                "code_examples": section.code_examples,
            }),
        });
    }

    if !lecture.summary.is_empty() {
        steps.push(Step {
            step_type: StepKind::LectureSection,
            section_name: "summary".to_string(),
            title: "Summary & Key Takeaways".to_string(),
            content: json!({
                "text": lecture.summary,
                "next_steps": lecture.next_steps,
            }),
        });
    }

    for exercise in &record.exercises {
        steps.push(Step {
            step_type: StepKind::Exercise,
            section_name: exercise.exercise_id.clone(),
            title: exercise.title.clone(),
            // solution and test cases stay server-side
            content: json!({
                "exercise_id": exercise.exercise_id,
                "title": exercise.title,
                "description": exercise.description,
                "prompt": exercise.prompt,
                "difficulty": exercise.difficulty,
                "starter_code": exercise.starter_code,
                "hints": exercise.hints,
            }),
        });
    }

    steps
}

/// Number of leading lecture steps, used for progress accounting.
pub fn lecture_step_count(record: &ContentRecord) -> usize {
    let lecture = &record.lecture;
    let mut count = lecture.sections.len();
    if !lecture.introduction.is_empty() {
        count += 1;
    }
    if !lecture.summary.is_empty() {
        count += 1;
    }
    count
}

pub fn summarize(steps: &[Step]) -> Vec<StepSummary> {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| StepSummary {
            step_number: i + 1,
            step_type: step.step_type,
            title: step.title.clone(),
            section_name: step.section_name.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::{
        CodeExample, Difficulty, Exercise, Hint, Lecture, Section,
    };
    use mongodb::bson::DateTime as BsonDateTime;

    fn sample_record() -> ContentRecord {
        ContentRecord {
            path_id: "python".to_string(),
            node_id: "python-1".to_string(),
            user_id: "user-1".to_string(),
            content_version: 1,
            lecture: Lecture {
                title: "Variables".to_string(),
                introduction: "Welcome to variables.".to_string(),
                sections: vec![
                    Section {
                        heading: "Assignment".to_string(),
                        body: "x = 1".to_string(),
                        code_examples: vec![CodeExample {
                            language: "python".to_string(),
                            code: "x = 1".to_string(),
                            explanation: String::new(),
                        }],
                    },
                    Section {
                        heading: "Naming".to_string(),
                        body: "snake_case".to_string(),
                        code_examples: vec![],
                    },
                ],
                summary: "Variables store values.".to_string(),
                next_steps: Some("Try the exercises.".to_string()),
            },
            exercises: vec![Exercise {
                exercise_id: "python-1-ex1".to_string(),
                node_id: Some("python-1".to_string()),
                title: "First variable".to_string(),
                description: "Create a variable.".to_string(),
                prompt: "Assign 5 to x.".to_string(),
                difficulty: Difficulty::Beginner,
                starter_code: "# your code".to_string(),
                solution: "x = 5".to_string(),
                test_cases: vec![],
                hints: vec![Hint {
                    level: 1,
                    hint: "Use =".to_string(),
                }],
                focus_topics: vec![],
                generated_by_ai: true,
                created_for_user: None,
            }],
            generated_at: BsonDateTime::now(),
            last_accessed: None,
            access_count: 0,
        }
    }

    #[test]
    fn ordering_is_intro_sections_summary_exercises() {
        let record = sample_record();
        let steps = build_steps(&record);
        assert_eq!(steps.len(), 5);
        assert_eq!(steps[0].section_name, "introduction");
        assert_eq!(steps[1].section_name, "section_1");
        assert_eq!(steps[2].section_name, "section_2");
        assert_eq!(steps[3].section_name, "summary");
        assert_eq!(steps[3].title, "Summary & Key Takeaways");
        assert_eq!(steps[4].step_type, StepKind::Exercise);
        assert_eq!(lecture_step_count(&record), 4);
    }

    #[test]
    fn empty_intro_and_summary_are_skipped() {
        let mut record = sample_record();
        record.lecture.introduction = String::new();
        record.lecture.summary = String::new();
        let steps = build_steps(&record);
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].section_name, "section_1");
        assert_eq!(lecture_step_count(&record), 2);
    }

    #[test]
    fn exercise_payload_never_contains_solution() {
        let steps = build_steps(&sample_record());
        let exercise_step = steps.last().unwrap();
        assert!(exercise_step.content.get("solution").is_none());
        assert!(exercise_step.content.get("test_cases").is_none());
        assert_eq!(exercise_step.content["exercise_id"], "python-1-ex1");
        assert_eq!(exercise_step.content["starter_code"], "# your code");
    }

    #[test]
    fn fully_empty_record_yields_no_steps() {
        let mut record = sample_record();
        record.lecture.introduction = String::new();
        record.lecture.sections.clear();
        record.lecture.summary = String::new();
        record.exercises.clear();
        assert!(build_steps(&record).is_empty());
    }

    #[test]
    fn summaries_are_one_indexed() {
        let steps = build_steps(&sample_record());
        let summaries = summarize(&steps);
        assert_eq!(summaries[0].step_number, 1);
        assert_eq!(summaries.last().unwrap().step_number, steps.len());
    }
}
