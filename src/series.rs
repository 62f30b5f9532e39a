use crate::error::{StudioError, StudioResult};
use crate::storage;
use crate::video::VideoRecord;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A themed batch of videos. Membership comes from the numbered video
/// directories under `series_path`; the series file never embeds videos.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesRecord {
    #[serde(skip)]
    pub json_data_path: Option<PathBuf>,
    #[serde(alias = "serie_path")]
    pub series_path: Option<PathBuf>,
    pub name: Option<String>,
    #[serde(alias = "serie_theme")]
    pub series_theme: Option<String>,
    pub used_themes: Vec<String>,
    pub expertise: Option<String>,
    pub num_stories: Option<u32>,
    #[serde(skip)]
    pub videos: Vec<VideoRecord>,
}

impl SeriesRecord {
    pub fn data_path(series_dir: &Path) -> PathBuf {
        series_dir.join(storage::SERIES_DATA_FILE)
    }

    /// Directory holding the numbered video folders.
    pub fn root(&self) -> Option<PathBuf> {
        self.series_path.clone().or_else(|| {
            self.json_data_path
                .as_deref()
                .and_then(Path::parent)
                .map(Path::to_path_buf)
        })
    }

    /// Loads the series fields and always rebuilds the video list from disk,
    /// so videos saved without their series file are still members.
    pub async fn get(json_path: &Path) -> StudioResult<Self> {
        let mut series = storage::read_json::<Self>(json_path)
            .await?
            .unwrap_or_default();
        series.json_data_path = Some(json_path.to_path_buf());
        series.hydrate().await?;
        Ok(series)
    }

    /// Rebuilds the video list from the video folders on disk.
    pub async fn hydrate(&mut self) -> StudioResult<()> {
        let Some(root) = self.root() else {
            return Ok(());
        };

        let mut videos = Vec::new();
        for dir in storage::subdirectories(&root) {
            let data_path = VideoRecord::data_path(&dir);
            if !storage::file_exists(&data_path).await {
                continue;
            }
            let video = VideoRecord::get(&data_path).await?;
            let ordinal = storage::dir_ordinal(&dir).or(video.video_n);
            videos.push((ordinal.unwrap_or(u32::MAX), video));
        }
        videos.sort_by_key(|(ordinal, _)| *ordinal);

        debug!("hydrated {} videos from {}", videos.len(), root.display());
        self.videos = videos.into_iter().map(|(_, v)| v).collect();
        Ok(())
    }

    /// Saves each video to its own file, then the series fields alone.
    pub async fn save(&mut self, json_path: Option<&Path>) -> StudioResult<()> {
        let target = match json_path {
            Some(path) => path.to_path_buf(),
            None => self
                .json_data_path
                .clone()
                .ok_or(StudioError::MissingPath("series record"))?,
        };

        for video in &mut self.videos {
            video.save(None).await?;
        }

        storage::write_json(&target, self).await?;
        self.json_data_path = Some(target);
        Ok(())
    }

    /// One past the highest ordinal in memory or among the video folders.
    pub fn next_ordinal(&self) -> u32 {
        let on_disk = self
            .root()
            .and_then(|root| storage::numbered_subdirectories(&root).last().map(|(n, _)| *n));
        self.videos
            .iter()
            .filter_map(|v| v.video_n)
            .chain(on_disk)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Ranks a freshly generated batch by evaluation score, best first, then
    /// numbers it after the existing videos. Existing videos keep their place.
    pub fn add_ranked_batch(&mut self, mut batch: Vec<VideoRecord>) -> StudioResult<()> {
        let root = self.root().ok_or(StudioError::MissingPath("series record"))?;

        batch.sort_by(|a, b| compare_scores(b.production_status.score(), a.production_status.score()));

        let mut ordinal = self.next_ordinal();
        for mut video in batch {
            video.video_n = Some(ordinal);
            video.json_data_path = Some(VideoRecord::data_path(&root.join(ordinal.to_string())));
            self.videos.push(video);
            ordinal += 1;
        }
        Ok(())
    }

    /// Gives every unpublished, undated video a release date, one every
    /// `interval_days` starting at `first_day`. Returns how many were dated.
    pub fn schedule_releases(&mut self, first_day: NaiveDate, interval_days: i64) -> usize {
        if interval_days <= 0 {
            warn!("release interval must be positive, got {interval_days}");
            return 0;
        }

        let mut day = first_day;
        let mut scheduled = 0;
        for video in &mut self.videos {
            let details = &mut video.youtube_details;
            if details.uploaded || details.release_date.is_some() {
                continue;
            }
            details.release_date = Some(day.format("%Y-%m-%d").to_string());
            day += Duration::days(interval_days);
            scheduled += 1;
        }
        scheduled
    }
}

fn compare_scores(a: Option<f64>, b: Option<f64>) -> Ordering {
    a.unwrap_or(f64::NEG_INFINITY)
        .total_cmp(&b.unwrap_or(f64::NEG_INFINITY))
}
