use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoType {
    Long,
    Short,
}

/// Publish metadata. `uploaded` and `url` only change through
/// [`YoutubeDetails::mark_uploaded`], called after a confirmed upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeDetails {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub thumbnail_str: Option<String>,
    pub thumbnail_path: Option<PathBuf>,
    pub uploaded: bool,
    pub url: Option<String>,
    #[serde(alias = "realse_date")]
    pub release_date: Option<String>,
    pub video_type: Option<VideoType>,
}

impl YoutubeDetails {
    pub fn short(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
            video_type: Some(VideoType::Short),
            ..Default::default()
        }
    }

    pub fn mark_uploaded(&mut self, url: impl Into<String>) {
        self.uploaded = true;
        self.url = Some(url.into());
    }
}
