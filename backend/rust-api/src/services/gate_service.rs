//! Prerequisite gates for agent-initiated writes.
//!
//! Two gates protect the tutoring flow: exercises may only be created for
//! material the learner has actually been shown, and new learning nodes may
//! only be created once the agent has asked enough discovery questions to
//! calibrate difficulty.

use anyhow::Context;
use futures::stream::TryStreamExt;
use lazy_static::lazy_static;
use mongodb::bson::doc;
use mongodb::{Collection, Database};
use regex::Regex;
use serde::Serialize;

use crate::metrics::GATE_REJECTIONS_TOTAL;
use crate::models::agent::{ChatMessageRecord, DisplayedContentRecord};
use crate::models::content::ContentRecord;

/// Categories of discovery questions, with the phrasing patterns that count
/// as having asked them.
const DISCOVERY_CATEGORIES: [(&str, &str); 3] = [
    ("experience_level", "experience.*level|level.*experience"),
    ("prior_usage", "used.*before|worked.*with|familiar"),
    ("similar_tools", "similar.*tool|other.*tools"),
];

const REQUIRED_DISCOVERY_MATCHES: usize = 2;

/// Only this many of the most recent assistant turns are inspected, so
/// questions from long-past conversation stretches do not open the gate.
const DISCOVERY_WINDOW: i64 = 10;

lazy_static! {
    static ref DISCOVERY_REGEXES: Vec<(&'static str, Regex)> = DISCOVERY_CATEGORIES
        .iter()
        .map(|(name, pattern)| {
            let re = Regex::new(&format!("(?i){}", pattern))
                .unwrap_or_else(|e| panic!("invalid discovery pattern {}: {}", name, e));
            (*name, re)
        })
        .collect();
}

#[derive(Debug, Serialize)]
pub struct ContentGateRejection {
    pub error: &'static str,
    pub message: String,
    pub pregenerated_available: bool,
    pub available_sections: Vec<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DiscoveryGateReport {
    pub can_create: bool,
    pub questions_matched: usize,
    pub missing: Vec<&'static str>,
}

pub struct GateService {
    mongo: Database,
}

impl GateService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn displayed_content(&self) -> Collection<DisplayedContentRecord> {
        self.mongo.collection("learning_content")
    }

    fn chat_messages(&self) -> Collection<ChatMessageRecord> {
        self.mongo.collection("chat_messages")
    }

    fn content(&self) -> Collection<ContentRecord> {
        self.mongo.collection("course_content")
    }

    /// Passes when lecture content matching the exercise topic was displayed
    /// to the learner. On rejection the payload tells the agent whether
    /// pregenerated content exists that it could display instead.
    pub async fn check_content_shown(
        &self,
        user_id: &str,
        node_id: &str,
        topic_title: &str,
    ) -> anyhow::Result<Option<ContentGateRejection>> {
        let pattern = regex::escape(topic_title);
        let shown = self
            .displayed_content()
            .find_one(doc! {
                "created_for_user": user_id,
                "title": { "$regex": &pattern, "$options": "i" },
            })
            .await
            .context("Failed to query displayed content")?;

        if shown.is_some() {
            return Ok(None);
        }

        let pregenerated = self
            .content()
            .find_one(doc! { "user_id": user_id, "node_id": node_id })
            .await
            .context("Failed to query pregenerated content")?;

        let (available, sections) = match pregenerated {
            Some(record) => {
                let sections = record
                    .lecture
                    .sections
                    .iter()
                    .map(|s| s.heading.clone())
                    .collect();
                (true, sections)
            }
            None => (false, vec![]),
        };

        GATE_REJECTIONS_TOTAL
            .with_label_values(&["content_not_shown"])
            .inc();

        Ok(Some(ContentGateRejection {
            error: "content_not_shown",
            message: format!(
                "Lecture content for '{}' has not been shown to the learner yet. Display it before creating exercises.",
                topic_title
            ),
            pregenerated_available: available,
            available_sections: sections,
        }))
    }

    /// Passes when the agent's conversation contains enough discovery
    /// questions. Without a session to inspect, nothing can match and the
    /// gate rejects.
    pub async fn check_discovery_questions(
        &self,
        session_id: Option<&str>,
    ) -> anyhow::Result<DiscoveryGateReport> {
        let texts: Vec<String> = match session_id {
            Some(session_id) => {
                self.chat_messages()
                    .find(doc! { "session_id": session_id, "role": "assistant" })
                    .sort(doc! { "timestamp": -1 })
                    .limit(DISCOVERY_WINDOW)
                    .await
                    .context("Failed to query chat messages")?
                    .try_collect::<Vec<ChatMessageRecord>>()
                    .await
                    .context("Failed to read chat messages")?
                    .into_iter()
                    .map(|m| m.content)
                    .collect()
            }
            None => vec![],
        };

        let report = count_discovery_questions(&texts);
        if !report.can_create {
            GATE_REJECTIONS_TOTAL
                .with_label_values(&["prerequisite_not_met"])
                .inc();
        }
        Ok(report)
    }
}

/// Counts which discovery categories appear anywhere in the given messages.
pub fn count_discovery_questions(messages: &[String]) -> DiscoveryGateReport {
    let mut matched = 0;
    let mut missing = Vec::new();

    for (name, re) in DISCOVERY_REGEXES.iter() {
        if messages.iter().any(|m| re.is_match(m)) {
            matched += 1;
        } else {
            missing.push(*name);
        }
    }

    DiscoveryGateReport {
        can_create: matched >= REQUIRED_DISCOVERY_MATCHES,
        questions_matched: matched,
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msgs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_messages_matches_nothing() {
        let report = count_discovery_questions(&[]);
        assert!(!report.can_create);
        assert_eq!(report.questions_matched, 0);
        assert_eq!(report.missing.len(), 3);
    }

    #[test]
    fn one_category_is_not_enough() {
        let report = count_discovery_questions(&msgs(&[
            "What is your experience level with Python?",
        ]));
        assert!(!report.can_create);
        assert_eq!(report.questions_matched, 1);
        assert!(report.missing.contains(&"prior_usage"));
    }

    #[test]
    fn two_categories_open_the_gate() {
        let report = count_discovery_questions(&msgs(&[
            "What's your experience level?",
            "Have you worked with databases before?",
        ]));
        assert!(report.can_create);
        assert_eq!(report.questions_matched, 2);
        assert_eq!(report.missing, vec!["similar_tools"]);
    }

    #[test]
    fn all_three_categories_match() {
        let report = count_discovery_questions(&msgs(&[
            "Tell me about your experience level.",
            "Are you familiar with Git?",
            "Have you used similar tools like Mercurial?",
        ]));
        assert!(report.can_create);
        assert_eq!(report.questions_matched, 3);
        assert!(report.missing.is_empty());
    }

    #[test]
    fn questions_older_than_the_window_do_not_count() {
        // the store hands back only the DISCOVERY_WINDOW newest turns; when
        // the discovery questions have scrolled past it, nothing matches
        let window: Vec<String> = (0..DISCOVERY_WINDOW)
            .map(|i| format!("Here is part {} of the lesson.", i))
            .collect();
        let report = count_discovery_questions(&window);
        assert!(!report.can_create);
        assert_eq!(report.questions_matched, 0);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let report = count_discovery_questions(&msgs(&[
            "WHAT IS YOUR EXPERIENCE LEVEL?",
            "ARE YOU FAMILIAR WITH RUST?",
        ]));
        assert!(report.can_create);
    }
}
