//! Decides where a learner goes after a graded submission.
//!
//! The planner turns an outcome into a concrete navigation action: advance
//! through the node's exercises, jump to the next node, detour into a
//! remedial exercise, or retry. Remedial generation can fail (the model
//! service may be down), so every branch has a non-generative fallback.

use anyhow::Context;
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Collection, Database};

use crate::models::content::ContentRecord;
use crate::models::submission::{NextAction, Outcome};
use crate::models::{path_id_of, split_exercise_id, NodeRecord};
use crate::services::content_generator::ContentGenerator;

pub struct ProgressionService {
    mongo: Database,
    generator: ContentGenerator,
}

impl ProgressionService {
    pub fn new(mongo: Database, generator: ContentGenerator) -> Self {
        Self { mongo, generator }
    }

    fn nodes(&self) -> Collection<NodeRecord> {
        self.mongo.collection("learning_nodes")
    }

    fn content(&self) -> Collection<ContentRecord> {
        self.mongo.collection("course_content")
    }

    pub async fn plan_next_action(
        &self,
        user_id: &str,
        node_id: &str,
        exercise_id: &str,
        outcome: Outcome,
        weak_topics: &[String],
    ) -> anyhow::Result<NextAction> {
        match outcome {
            Outcome::Perfect => self.advance_past_node(node_id).await,

            Outcome::PassedWithWeaknesses => {
                if let Some(next_exercise) =
                    self.next_exercise_in_node(user_id, node_id, exercise_id).await?
                {
                    return Ok(NextAction::NavigateToExercise {
                        exercise_id: next_exercise,
                        reason: "Good work! Let's reinforce these concepts with the next exercise."
                            .to_string(),
                        auto_hint: false,
                    });
                }

                match self.remedial_for(user_id, node_id, weak_topics).await {
                    Ok(exercise_id) => Ok(NextAction::NavigateToExercise {
                        exercise_id,
                        reason: "You passed, but a short practice exercise will shore up the weak spots.".to_string(),
                        auto_hint: false,
                    }),
                    Err(err) => {
                        tracing::warn!("Remedial generation failed: {:#}", err);
                        self.advance_past_node(node_id).await
                    }
                }
            }

            Outcome::NeedsRemediation => {
                match self.remedial_for(user_id, node_id, weak_topics).await {
                    Ok(exercise_id) => Ok(NextAction::NavigateToExercise {
                        exercise_id,
                        reason: "Let's work through a targeted exercise on the concepts that gave you trouble.".to_string(),
                        auto_hint: true,
                    }),
                    Err(err) => {
                        tracing::warn!("Remedial generation failed: {:#}", err);
                        Ok(NextAction::Retry {
                            reason: "Give this exercise another try with the hints.".to_string(),
                            show_hint_button: true,
                        })
                    }
                }
            }

            Outcome::Failed => Ok(NextAction::Retry {
                reason: "Not quite there yet. Review the feedback and try again.".to_string(),
                show_hint_button: true,
            }),
        }
    }

    async fn advance_past_node(&self, node_id: &str) -> anyhow::Result<NextAction> {
        match self.next_node_in_path(node_id).await? {
            Some(next) => Ok(NextAction::NavigateToNode {
                node_id: next,
                reason: "Excellent work! Moving on to the next topic.".to_string(),
            }),
            None => Ok(NextAction::CompletePath {
                reason: "You have completed every topic in this path. Well done!".to_string(),
            }),
        }
    }

    /// First node id in the same path that sorts after the current one.
    /// Node ids are authored with ordered prefixes, so lexicographic order is
    /// the path order.
    pub async fn next_node_in_path(&self, node_id: &str) -> anyhow::Result<Option<String>> {
        let path_id = path_id_of(node_id);
        let pattern = format!("^{}", regex::escape(path_id));

        let ids: Vec<String> = self
            .nodes()
            .find(doc! { "node_id": { "$regex": &pattern } })
            .sort(doc! { "node_id": 1 })
            .await
            .context("Failed to list path nodes")?
            .try_collect::<Vec<NodeRecord>>()
            .await
            .context("Failed to read path nodes")?
            .into_iter()
            .map(|n| n.node_id)
            .collect();

        Ok(next_after(&ids, node_id))
    }

    /// The node's next generated exercise after the one just submitted.
    /// Remedial exercises sit outside the node sequence and never have a
    /// successor here.
    async fn next_exercise_in_node(
        &self,
        user_id: &str,
        node_id: &str,
        exercise_id: &str,
    ) -> anyhow::Result<Option<String>> {
        let Some((_, ordinal)) = split_exercise_id(exercise_id) else {
            return Ok(None);
        };

        let record = self
            .content()
            .find_one(doc! { "user_id": user_id, "node_id": node_id })
            .await
            .context("Failed to load content record")?;

        Ok(record.and_then(|r| {
            r.exercises
                .get(ordinal as usize)
                .map(|e| e.exercise_id.clone())
        }))
    }

    async fn remedial_for(
        &self,
        user_id: &str,
        node_id: &str,
        weak_topics: &[String],
    ) -> anyhow::Result<String> {
        let topic = weak_topics
            .first()
            .map(String::as_str)
            .unwrap_or("algorithmic_thinking");
        let exercise = self
            .generator
            .generate_targeted_exercise(user_id, node_id, topic, weak_topics.to_vec())
            .await?;
        Ok(exercise.exercise_id)
    }
}

fn next_after(sorted_ids: &[String], current: &str) -> Option<String> {
    sorted_ids
        .iter()
        .find(|id| id.as_str() > current)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::next_after;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn picks_first_id_after_current() {
        let nodes = ids(&["python-01", "python-02", "python-03"]);
        assert_eq!(next_after(&nodes, "python-01"), Some("python-02".into()));
        assert_eq!(next_after(&nodes, "python-02"), Some("python-03".into()));
    }

    #[test]
    fn last_node_has_no_successor() {
        let nodes = ids(&["python-01", "python-02"]);
        assert_eq!(next_after(&nodes, "python-02"), None);
    }

    #[test]
    fn unknown_current_still_finds_next_in_order() {
        let nodes = ids(&["python-01", "python-03"]);
        assert_eq!(next_after(&nodes, "python-02"), Some("python-03".into()));
    }
}
