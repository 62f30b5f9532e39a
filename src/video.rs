use crate::error::{StudioError, StudioResult};
use crate::status::ProductionStatus;
use crate::storage;
use crate::storyboard::{SceneUpdate, Storyboard};
use crate::youtube::YoutubeDetails;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything known about one video, stored as `<series>/<n>/video_data.json`.
///
/// The directory holding the data file is the video's identity; media live
/// next to it in `images/` and `audios/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoRecord {
    #[serde(skip)]
    pub json_data_path: Option<PathBuf>,
    pub video_path: Option<PathBuf>,
    pub text: Option<String>,
    pub storyboard: Storyboard,
    pub video_n: Option<u32>,
    pub youtube_details: YoutubeDetails,
    pub production_status: ProductionStatus,
    pub text_cost: Option<f64>,
}

impl VideoRecord {
    pub fn data_path(video_dir: &Path) -> PathBuf {
        video_dir.join(storage::VIDEO_DATA_FILE)
    }

    /// Missing file yields a default record that only knows its path.
    pub async fn get(json_path: &Path) -> StudioResult<Self> {
        let mut record: Self = storage::read_json(json_path).await?.unwrap_or_default();
        record.json_data_path = Some(json_path.to_path_buf());
        Ok(record)
    }

    /// Saves to `json_path`, or to the stored path when `None`, and remembers
    /// the target for later saves.
    pub async fn save(&mut self, json_path: Option<&Path>) -> StudioResult<()> {
        let target = match json_path {
            Some(path) => path.to_path_buf(),
            None => self
                .json_data_path
                .clone()
                .ok_or(StudioError::MissingPath("video record"))?,
        };
        storage::write_json(&target, self).await?;
        self.json_data_path = Some(target);
        Ok(())
    }

    pub fn dir(&self) -> Option<&Path> {
        self.json_data_path.as_deref().and_then(Path::parent)
    }

    pub fn images_dir(&self) -> Option<PathBuf> {
        self.dir().map(|d| d.join(storage::IMAGES_DIR))
    }

    pub fn audios_dir(&self) -> Option<PathBuf> {
        self.dir().map(|d| d.join(storage::AUDIOS_DIR))
    }

    pub fn image_path(&self, index: usize) -> Option<PathBuf> {
        self.images_dir().map(|d| d.join(format!("{index}.png")))
    }

    pub fn audio_path(&self, index: usize) -> Option<PathBuf> {
        self.audios_dir().map(|d| d.join(format!("{index}.mp3")))
    }

    pub fn title(&self) -> &str {
        self.youtube_details.title.as_deref().unwrap_or("untitled")
    }

    /// Applies scene edits to the storyboard embedded in the video's data file.
    pub async fn update_storyboard(
        video_dir: &Path,
        updates: &[SceneUpdate],
    ) -> StudioResult<Storyboard> {
        let data_path = Self::data_path(video_dir);
        let _guard = storage::lock_file(&data_path).await;
        let mut record = Self::get(&data_path).await?;
        record.storyboard.apply_updates(updates);
        record.save(None).await?;
        Ok(record.storyboard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storyboard::{Scene, SceneField};
    use crate::youtube::VideoType;
    use tempfile::TempDir;

    fn sample(path: &Path) -> VideoRecord {
        VideoRecord {
            json_data_path: Some(path.to_path_buf()),
            text: Some("Zeus was hidden in a cave.".into()),
            storyboard: Storyboard::from(vec![Scene::new("a", "b"), Scene::new("c", "d")]),
            video_n: Some(1),
            youtube_details: YoutubeDetails {
                title: Some("Zeus".into()),
                tags: vec!["myth".into()],
                video_type: Some(VideoType::Short),
                ..Default::default()
            },
            production_status: ProductionStatus {
                text_completed: true,
                images_completed: vec![true, false],
                images_generated: vec![true, true],
                ..Default::default()
            },
            text_cost: Some(0.0042),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_file_is_default_with_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("7/video_data.json");
        let record = VideoRecord::get(&path).await.unwrap();
        assert_eq!(record.json_data_path.as_deref(), Some(path.as_path()));
        assert!(record.storyboard.is_empty());
        assert_eq!(record.production_status, ProductionStatus::default());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn save_without_any_path_fails() {
        let mut record = VideoRecord::default();
        assert!(matches!(
            record.save(None).await,
            Err(StudioError::MissingPath(_))
        ));
    }

    #[tokio::test]
    async fn save_remembers_last_target() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("1/video_data.json");
        let second = tmp.path().join("2/video_data.json");
        let mut record = sample(&first);

        record.save(Some(&second)).await.unwrap();
        assert_eq!(record.json_data_path.as_deref(), Some(second.as_path()));
        record.text = Some("changed".into());
        record.save(None).await.unwrap();

        assert!(!first.exists());
        let loaded = VideoRecord::get(&second).await.unwrap();
        assert_eq!(loaded.text.as_deref(), Some("changed"));
    }

    #[tokio::test]
    async fn round_trip_keeps_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("video_data.json");
        let mut record = sample(&path);
        record.save(None).await.unwrap();
        let original: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        let mut loaded = VideoRecord::get(&path).await.unwrap();
        assert_eq!(loaded, record);
        loaded.save(None).await.unwrap();
        let again: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(original, again);
        assert!(again.get("json_data_path").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_scene_edits_all_persist() {
        let tmp = TempDir::new().unwrap();
        let scenes: Vec<Scene> = (0..40).map(|i| Scene::new(format!("t{i}"), "img")).collect();
        let mut record = VideoRecord {
            storyboard: Storyboard::from(scenes),
            ..Default::default()
        };
        record.save(Some(&VideoRecord::data_path(tmp.path()))).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..40 {
            let dir = tmp.path().to_path_buf();
            handles.push(tokio::spawn(async move {
                VideoRecord::update_storyboard(&dir, &[SceneUpdate::new(i, SceneField::Text, "EDITED")])
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let loaded = VideoRecord::get(&VideoRecord::data_path(tmp.path()))
            .await
            .unwrap();
        assert_eq!(loaded.storyboard.len(), 40);
        assert!(
            loaded
                .storyboard
                .scenes
                .iter()
                .all(|s| s.text.as_deref() == Some("EDITED"))
        );
    }

    #[tokio::test]
    async fn embedded_storyboard_edit_is_isolated() {
        let tmp = TempDir::new().unwrap();
        let mut record = sample(&VideoRecord::data_path(tmp.path()));
        record.save(None).await.unwrap();

        let storyboard = VideoRecord::update_storyboard(
            tmp.path(),
            &[
                SceneUpdate::new(1, SceneField::Image, "new prompt"),
                SceneUpdate::new(5, SceneField::Text, "ignored"),
            ],
        )
        .await
        .unwrap();

        assert_eq!(storyboard.scenes[0], Scene::new("a", "b"));
        assert_eq!(storyboard.scenes[1], Scene::new("c", "new prompt"));
        let loaded = VideoRecord::get(&VideoRecord::data_path(tmp.path()))
            .await
            .unwrap();
        assert_eq!(loaded.storyboard, storyboard);
        assert_eq!(loaded.production_status, record.production_status);
    }
}
