//! Per-node progress accounting.
//!
//! A node's completion percentage is split evenly between lecture and
//! exercises: reading the whole lecture is worth 50 points, finishing every
//! exercise is worth the other 50. The two contributions are stored in
//! separate fields and summed, so lecture and exercise updates can interleave
//! in any order without clobbering each other. Lecture points only ever move
//! forward (a `$max` update), so revisiting an earlier step never lowers the
//! score.

use anyhow::Context;
use mongodb::bson::doc;
use mongodb::{Collection, Database};

use crate::models::content::ExerciseCompletionResponse;
use crate::models::progress::{ProgressRecord, ProgressStatus};
use crate::utils::time;

const LECTURE_SHARE: i32 = 50;
const EXERCISE_SHARE: i32 = 50;

pub struct ProgressService {
    mongo: Database,
}

impl ProgressService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn progress_collection(&self) -> Collection<ProgressRecord> {
        self.mongo.collection("user_progress")
    }

    /// Creates the progress record on first contact with a node and bumps
    /// `last_accessed` on every later visit.
    pub async fn ensure_started(&self, user_id: &str, node_id: &str) -> anyhow::Result<()> {
        let now = time::now();
        self.progress_collection()
            .update_one(
                doc! { "user_id": user_id, "node_id": node_id },
                doc! {
                    "$setOnInsert": {
                        "user_id": user_id,
                        "node_id": node_id,
                        "status": ProgressStatus::InProgress.as_str(),
                        "completion_percentage": 0,
                        "lecture_points": 0,
                        "exercise_points": 0,
                        "exercises_completed": 0,
                        "started_at": now,
                    },
                    "$set": { "last_accessed": now },
                },
            )
            .upsert(true)
            .await
            .context("Failed to upsert progress record")?;
        Ok(())
    }

    /// Records that the learner reached lecture step `step_number` of
    /// `total_lecture_steps`. Returns the stored completion percentage.
    pub async fn record_lecture_step(
        &self,
        user_id: &str,
        node_id: &str,
        step_number: usize,
        total_lecture_steps: usize,
    ) -> anyhow::Result<i32> {
        let pct = lecture_progress(step_number, total_lecture_steps);
        let now = time::now();
        self.progress_collection()
            .update_one(
                doc! { "user_id": user_id, "node_id": node_id },
                doc! {
                    "$max": { "lecture_points": pct },
                    "$set": {
                        "status": ProgressStatus::InProgress.as_str(),
                        "last_accessed": now,
                    },
                    "$setOnInsert": {
                        "user_id": user_id,
                        "node_id": node_id,
                        "completion_percentage": 0,
                        "exercise_points": 0,
                        "exercises_completed": 0,
                        "started_at": now,
                    },
                },
            )
            .upsert(true)
            .await
            .context("Failed to record lecture step")?;

        let record = self
            .get_progress(user_id, node_id)
            .await?
            .context("Progress record missing after lecture update")?;
        let combined = combined_progress(record.lecture_points, record.exercise_points);

        self.progress_collection()
            .update_one(
                doc! { "user_id": user_id, "node_id": node_id },
                doc! { "$max": { "completion_percentage": combined } },
            )
            .await
            .context("Failed to merge combined progress")?;

        Ok(combined.max(record.completion_percentage))
    }

    /// Marks one more exercise as completed and recomputes the node total.
    /// The count saturates at `total_exercises`, so re-completing an exercise
    /// cannot push progress past 100.
    pub async fn record_exercise_completion(
        &self,
        user_id: &str,
        node_id: &str,
        total_exercises: i32,
    ) -> anyhow::Result<ExerciseCompletionResponse> {
        self.ensure_started(user_id, node_id).await?;

        let current = self
            .get_progress(user_id, node_id)
            .await?
            .context("Progress record missing after ensure_started")?;

        let completed = (current.exercises_completed + 1).min(total_exercises.max(0));
        let exercise_points = exercise_progress(completed, total_exercises);
        let new_pct = combined_progress(current.lecture_points, exercise_points);
        let node_completed = new_pct >= 100;

        let mut set = doc! {
            "exercises_completed": completed,
            "exercise_points": exercise_points,
            "last_accessed": time::now(),
        };
        if node_completed && current.completed_at.is_none() {
            set.insert("status", ProgressStatus::Completed.as_str());
            set.insert("completed_at", time::now());
        }

        self.progress_collection()
            .update_one(
                doc! { "user_id": user_id, "node_id": node_id },
                doc! {
                    "$set": set,
                    "$max": { "completion_percentage": new_pct },
                },
            )
            .await
            .context("Failed to record exercise completion")?;

        Ok(ExerciseCompletionResponse {
            success: true,
            node_progress: new_pct,
            exercises_completed: completed,
            total_exercises,
            node_completed,
        })
    }

    pub async fn get_progress(
        &self,
        user_id: &str,
        node_id: &str,
    ) -> anyhow::Result<Option<ProgressRecord>> {
        self.progress_collection()
            .find_one(doc! { "user_id": user_id, "node_id": node_id })
            .await
            .context("Failed to load progress record")
    }
}

/// Lecture progress for having reached `step_number` of `total` lecture
/// steps, scaled into the lecture share.
pub fn lecture_progress(step_number: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    let scaled = (step_number * LECTURE_SHARE as usize) / total;
    (scaled as i32).min(100)
}

/// Exercise progress for `completed` of `total` exercises, scaled into the
/// exercise share. Zero exercises means the lecture is the whole node.
pub fn exercise_progress(completed: i32, total: i32) -> i32 {
    if total <= 0 {
        return 0;
    }
    ((completed.clamp(0, total) * EXERCISE_SHARE) / total).min(EXERCISE_SHARE)
}

/// Sum of the two stored contributions, each capped at its share.
pub fn combined_progress(lecture_points: i32, exercise_points: i32) -> i32 {
    (lecture_points.clamp(0, LECTURE_SHARE) + exercise_points.clamp(0, EXERCISE_SHARE)).min(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lecture_progress_scales_into_fifty() {
        assert_eq!(lecture_progress(0, 4), 0);
        assert_eq!(lecture_progress(1, 4), 12);
        assert_eq!(lecture_progress(2, 4), 25);
        assert_eq!(lecture_progress(4, 4), 50);
    }

    #[test]
    fn lecture_progress_with_no_steps_is_zero() {
        assert_eq!(lecture_progress(3, 0), 0);
    }

    #[test]
    fn exercise_progress_scales_into_fifty() {
        assert_eq!(exercise_progress(0, 2), 0);
        assert_eq!(exercise_progress(1, 2), 25);
        assert_eq!(exercise_progress(2, 2), 50);
        assert_eq!(exercise_progress(5, 2), 50);
        assert_eq!(exercise_progress(1, 0), 0);
    }

    #[test]
    fn full_lecture_plus_all_exercises_is_exactly_one_hundred() {
        assert_eq!(combined_progress(50, exercise_progress(1, 2)), 75);
        assert_eq!(combined_progress(50, exercise_progress(2, 2)), 100);
    }

    #[test]
    fn overshooting_contributions_cap_at_one_hundred() {
        assert_eq!(combined_progress(80, 80), 100);
        assert_eq!(combined_progress(50, exercise_progress(5, 2)), 100);
    }

    #[test]
    fn interleaved_lecture_and_exercise_updates_reach_one_hundred() {
        // 4 lecture steps, 2 exercises, visited out of order:
        // step 1 -> exercise 1 -> step 4 -> exercise 2.
        // Mirrors the store: lecture points merge via max, the combined
        // percentage never decreases.
        let mut lecture_points = lecture_progress(1, 4);
        let mut pct = combined_progress(lecture_points, 0);
        assert_eq!(pct, 12);

        let mut exercise_points = exercise_progress(1, 2);
        pct = pct.max(combined_progress(lecture_points, exercise_points));
        assert_eq!(pct, 37);

        lecture_points = lecture_points.max(lecture_progress(4, 4));
        pct = pct.max(combined_progress(lecture_points, exercise_points));
        assert_eq!(pct, 75);

        exercise_points = exercise_progress(2, 2);
        pct = pct.max(combined_progress(lecture_points, exercise_points));
        assert_eq!(pct, 100);
    }

    #[test]
    fn partial_lecture_is_preserved_across_exercise_completions() {
        // lecture at 25, both exercises done: the node waits on the lecture
        assert_eq!(combined_progress(25, exercise_progress(2, 2)), 75);
    }
}
