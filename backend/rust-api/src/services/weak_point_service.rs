//! Detects skill gaps from submitted code and accumulates them on the
//! learner's profile.
//!
//! Detection is lexical: cheap keyword checks that flag missing constructs
//! rather than judging style. A topic that is flagged repeatedly keeps the
//! same profile entry with a growing occurrence count.

use anyhow::Context;
use mongodb::bson::doc;
use mongodb::{Collection, Database};

use crate::models::weak_point::UserProfile;
use crate::utils::time;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeakPointFinding {
    pub topic: &'static str,
    pub description: &'static str,
}

/// Scans submitted code for constructs the exercise was expected to use.
/// Only consulted for non-perfect submissions, so flagging generously is
/// acceptable.
pub fn analyze_code(code: &str, passed: bool) -> Vec<WeakPointFinding> {
    let lower = code.to_lowercase();
    let mut findings = Vec::new();

    if !lower.contains("def ") && !lower.contains("function") {
        findings.push(WeakPointFinding {
            topic: "function_declaration",
            description: "Code does not define any functions",
        });
    }

    if !lower.contains("for ") && !lower.contains("while ") {
        findings.push(WeakPointFinding {
            topic: "loops",
            description: "Code does not use loops",
        });
    }

    if !lower.contains("if ") {
        findings.push(WeakPointFinding {
            topic: "conditionals",
            description: "Code does not use conditional branching",
        });
    }

    if lower.contains("class ") && !lower.contains("__init__") {
        findings.push(WeakPointFinding {
            topic: "class_initialization",
            description: "Class definition is missing a constructor",
        });
    }

    if !passed {
        findings.push(WeakPointFinding {
            topic: "algorithmic_thinking",
            description: "Solution did not pass the exercise requirements",
        });
    }

    findings
}

pub struct WeakPointService {
    mongo: Database,
}

impl WeakPointService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn profiles(&self) -> Collection<UserProfile> {
        self.mongo.collection("user_profiles")
    }

    /// Records one finding on the learner's profile. Existing topics get
    /// their occurrence count bumped through a positional update; new topics
    /// are pushed as fresh entries.
    pub async fn record_finding(
        &self,
        user_id: &str,
        exercise_id: &str,
        finding: &WeakPointFinding,
    ) -> anyhow::Result<()> {
        let now = time::now();

        let updated = self
            .profiles()
            .update_one(
                doc! { "user_id": user_id, "weak_points.topic": finding.topic },
                doc! {
                    "$inc": { "weak_points.$.occurrences": 1 },
                    "$set": { "weak_points.$.last_seen": now },
                    "$addToSet": { "weak_points.$.exercises_failed": exercise_id },
                },
            )
            .await
            .context("Failed to update existing weak point")?;

        if updated.matched_count == 0 {
            self.profiles()
                .update_one(
                    doc! { "user_id": user_id },
                    doc! {
                        "$setOnInsert": {
                            "user_id": user_id,
                            "experience_level": "beginner",
                        },
                        "$push": {
                            "weak_points": {
                                "topic": finding.topic,
                                "description": finding.description,
                                "identified_at": now,
                                "last_seen": now,
                                "occurrences": 1,
                                "exercises_failed": [exercise_id],
                            },
                        },
                    },
                )
                .upsert(true)
                .await
                .context("Failed to insert new weak point")?;
        }

        Ok(())
    }

    /// Bumps the profile's lifetime exercise counters after a graded attempt.
    pub async fn record_attempt_stats(&self, user_id: &str, passed: bool) -> anyhow::Result<()> {
        let counter = if passed {
            "total_exercises_completed"
        } else {
            "total_exercises_failed"
        };
        self.profiles()
            .update_one(
                doc! { "user_id": user_id },
                doc! {
                    "$setOnInsert": {
                        "user_id": user_id,
                        "experience_level": "beginner",
                    },
                    "$inc": { counter: 1 },
                    "$set": { "last_active": time::now() },
                },
            )
            .upsert(true)
            .await
            .context("Failed to update profile attempt stats")?;
        Ok(())
    }

    pub async fn get_profile(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>> {
        self.profiles()
            .find_one(doc! { "user_id": user_id })
            .await
            .context("Failed to load user profile")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics(code: &str, passed: bool) -> Vec<&'static str> {
        analyze_code(code, passed).iter().map(|f| f.topic).collect()
    }

    #[test]
    fn complete_passing_code_has_no_findings() {
        let code = "def solve(xs):\n    for x in xs:\n        if x > 0:\n            return x";
        assert!(analyze_code(code, true).is_empty());
    }

    #[test]
    fn missing_constructs_are_flagged() {
        let found = topics("print('hi')", true);
        assert!(found.contains(&"function_declaration"));
        assert!(found.contains(&"loops"));
        assert!(found.contains(&"conditionals"));
        assert!(!found.contains(&"algorithmic_thinking"));
    }

    #[test]
    fn while_counts_as_a_loop() {
        let code = "def f(n):\n    while n > 0:\n        n -= 1\n    if n == 0:\n        return n";
        assert!(!topics(code, true).contains(&"loops"));
    }

    #[test]
    fn class_without_constructor_is_flagged() {
        let code = "class Dog:\n    def bark(self):\n        if True:\n            return 'woof'\n    # for looping later";
        let found = topics(code, true);
        assert!(found.contains(&"class_initialization"));
    }

    #[test]
    fn class_with_constructor_is_fine() {
        let code = "class Dog:\n    def __init__(self):\n        if True:\n            pass\n    # for later";
        assert!(!topics(code, true).contains(&"class_initialization"));
    }

    #[test]
    fn failing_always_flags_algorithmic_thinking() {
        let code = "def solve(xs):\n    for x in xs:\n        if x:\n            return x";
        assert_eq!(topics(code, false), vec!["algorithmic_thinking"]);
    }
}
