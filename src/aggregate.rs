//! Dashboard view over every series and video under the channel root.

use crate::status::{ProductionStatus, StatusTracker};
use crate::storage;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Serialize)]
pub struct VideoStatusEntry {
    pub ordinal: u32,
    pub path: PathBuf,
    pub status: ProductionStatus,
    pub completed: bool,
    /// Set when the video could not be read; `status` is then the default.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GlobalStatus {
    /// Series name to its videos in numeric order.
    pub series: BTreeMap<String, Vec<VideoStatusEntry>>,
}

impl GlobalStatus {
    pub fn video_count(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    pub fn completed_count(&self) -> usize {
        self.series
            .values()
            .flatten()
            .filter(|entry| entry.completed)
            .count()
    }
}

/// Re-reads every video's status from disk. One unreadable video is reported
/// in its entry and does not stop the scan.
pub async fn get_global_status(root: &Path) -> GlobalStatus {
    let mut global = GlobalStatus::default();

    for series_dir in storage::subdirectories(root) {
        let Some(name) = series_dir.file_name().and_then(OsStr::to_str) else {
            continue;
        };

        let mut entries = Vec::new();
        for (ordinal, video_dir) in storage::numbered_subdirectories(&series_dir) {
            let entry = match StatusTracker::get(&video_dir).await {
                Ok(status) => VideoStatusEntry {
                    ordinal,
                    completed: status.completed(),
                    status,
                    path: video_dir,
                    error: None,
                },
                Err(err) => {
                    warn!("status of {} unreadable: {}", video_dir.display(), err);
                    VideoStatusEntry {
                        ordinal,
                        path: video_dir,
                        status: ProductionStatus::default(),
                        completed: false,
                        error: Some(err.to_string()),
                    }
                }
            };
            entries.push(entry);
        }

        global.series.insert(name.to_string(), entries);
    }

    global
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        let global = get_global_status(&tmp.path().join("nothing")).await;
        assert!(global.series.is_empty());
    }

    #[tokio::test]
    async fn corrupt_video_does_not_blank_the_series() {
        let tmp = TempDir::new().unwrap();
        let series = tmp.path().join("NORSE");
        std::fs::create_dir_all(series.join("1/images")).unwrap();
        std::fs::write(series.join("1/images/0.png"), b"png").unwrap();
        std::fs::create_dir_all(series.join("2")).unwrap();
        std::fs::write(series.join("2/video_data.json"), "{oops").unwrap();
        std::fs::create_dir_all(series.join("3")).unwrap();

        let global = get_global_status(tmp.path()).await;
        let videos = &global.series["NORSE"];
        assert_eq!(videos.len(), 3);
        assert_eq!(videos[0].status.images_completed, vec![false]);
        assert!(videos[0].error.is_none());
        assert!(videos[1].error.is_some());
        assert!(videos[2].error.is_none());
        assert_eq!(global.video_count(), 3);
        assert_eq!(global.completed_count(), 0);
    }
}
