//! Per-video production status and its reconciliation against disk.

use crate::api::TextEvaluator;
use crate::error::{StudioError, StudioResult};
use crate::storage;
use crate::video::VideoRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Quality scores by aspect. A `None` score means the aspect could not be scored.
pub type TextEvaluation = BTreeMap<String, Option<f64>>;

pub const AVERAGE_SCORE_KEY: &str = "average_score";
pub const WORD_COUNT_KEY: &str = "word_count";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionStatus {
    pub text_completed: bool,
    pub text_evaluation: Option<TextEvaluation>,
    pub storyboard_completed: bool,
    pub images_generated: Vec<bool>,
    pub images_completed: Vec<bool>,
    pub tts_completed: bool,
    pub ready_to_upload: bool,
}

impl ProductionStatus {
    /// Every image approved and the text scored. Nothing else gates it.
    pub fn completed(&self) -> bool {
        self.images_completed.iter().all(|done| *done) && self.text_evaluation.is_some()
    }

    pub fn scene_count(&self) -> usize {
        self.images_completed.len()
    }

    /// Resizes both per-scene lists to `image_count`, padding with `false`.
    /// Returns whether anything changed.
    pub fn reconcile(&mut self, image_count: usize) -> bool {
        let changed = self.images_generated.len() != image_count
            || self.images_completed.len() != image_count;
        self.images_generated.resize(image_count, false);
        self.images_completed.resize(image_count, false);
        changed
    }

    pub fn set_image_completed(&mut self, index: usize, is_completed: bool) -> StudioResult<()> {
        let len = self.images_completed.len();
        let slot = self
            .images_completed
            .get_mut(index)
            .ok_or(StudioError::IndexOutOfRange { index, len })?;
        *slot = is_completed;
        Ok(())
    }

    pub fn set_image_generated(&mut self, index: usize, is_generated: bool) -> StudioResult<()> {
        let len = self.images_generated.len();
        let slot = self
            .images_generated
            .get_mut(index)
            .ok_or(StudioError::IndexOutOfRange { index, len })?;
        *slot = is_generated;
        Ok(())
    }

    /// Ranking score: the stored average, else the mean of the aspect scores.
    pub fn score(&self) -> Option<f64> {
        self.text_evaluation.as_ref().and_then(evaluation_score)
    }
}

pub fn evaluation_score(evaluation: &TextEvaluation) -> Option<f64> {
    if let Some(Some(avg)) = evaluation.get(AVERAGE_SCORE_KEY) {
        return Some(*avg);
    }
    average_of_aspects(evaluation)
}

pub fn average_of_aspects(evaluation: &TextEvaluation) -> Option<f64> {
    let scores: Vec<f64> = evaluation
        .iter()
        .filter(|(key, _)| key.as_str() != WORD_COUNT_KEY && key.as_str() != AVERAGE_SCORE_KEY)
        .filter_map(|(_, score)| *score)
        .collect();
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

/// Status operations addressed by video directory. Each call re-reads disk.
pub struct StatusTracker;

impl StatusTracker {
    pub async fn get(video_dir: &Path) -> StudioResult<ProductionStatus> {
        Ok(Self::load_reconciled(video_dir).await?.production_status)
    }

    /// Loads the video record and resizes its status to the image files on
    /// disk, persisting only when the file was new or a resize happened.
    pub async fn load_reconciled(video_dir: &Path) -> StudioResult<VideoRecord> {
        let _guard = storage::lock_file(&VideoRecord::data_path(video_dir)).await;
        Self::reconcile_locked(video_dir).await
    }

    async fn reconcile_locked(video_dir: &Path) -> StudioResult<VideoRecord> {
        let data_path = VideoRecord::data_path(video_dir);
        let existed = storage::file_exists(&data_path).await;
        let mut record = VideoRecord::get(&data_path).await?;

        let image_count =
            storage::count_image_files(&video_dir.join(storage::IMAGES_DIR)).await?;
        let resized = record.production_status.reconcile(image_count);
        if resized {
            debug!(
                "resized status of {} to {} images",
                video_dir.display(),
                image_count
            );
        }
        if !existed || resized {
            record.save(None).await?;
        }
        Ok(record)
    }

    /// Reloads and reconciles the record under its file lock, applies `change`
    /// and saves. Nothing is written when `change` fails.
    pub async fn modify<F>(video_dir: &Path, change: F) -> StudioResult<VideoRecord>
    where
        F: FnOnce(&mut VideoRecord) -> StudioResult<()>,
    {
        let _guard = storage::lock_file(&VideoRecord::data_path(video_dir)).await;
        let mut record = Self::reconcile_locked(video_dir).await?;
        change(&mut record)?;
        record.save(None).await?;
        Ok(record)
    }

    pub async fn update_image_status(
        video_dir: &Path,
        index: usize,
        is_completed: bool,
    ) -> StudioResult<ProductionStatus> {
        let record = Self::modify(video_dir, |record| {
            record
                .production_status
                .set_image_completed(index, is_completed)
        })
        .await?;
        Ok(record.production_status)
    }

    /// Scores the stored narration once. A present evaluation is kept as is.
    pub async fn evaluate_text(
        video_dir: &Path,
        evaluator: &dyn TextEvaluator,
    ) -> StudioResult<ProductionStatus> {
        let record = Self::load_reconciled(video_dir).await?;
        if record.production_status.text_evaluation.is_some() {
            return Ok(record.production_status);
        }

        let text = record
            .text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(StudioError::MissingText)?;

        let evaluation = match evaluator.evaluate_text(text).await {
            Ok(Some(evaluation)) => evaluation,
            Ok(None) => {
                return Err(StudioError::incomplete(
                    "text evaluation",
                    "evaluator returned no result",
                ));
            }
            Err(err) => return Err(StudioError::incomplete("text evaluation", err.to_string())),
        };

        info!("text of {} evaluated", video_dir.display());
        let record = Self::modify(video_dir, |record| {
            let status = &mut record.production_status;
            if status.text_evaluation.is_none() {
                status.text_evaluation = Some(evaluation);
            }
            Ok(())
        })
        .await?;
        Ok(record.production_status)
    }
}
