use crate::error::{StudioError, StudioResult};
use crate::storage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// One narration sentence and the prompt for its image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub text: Option<String>,
    pub image: Option<String>,
}

impl Scene {
    pub fn new(text: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: Some(image.into()),
        }
    }

    pub fn field(&self, field: SceneField) -> Option<&str> {
        match field {
            SceneField::Text => self.text.as_deref(),
            SceneField::Image => self.image.as_deref(),
        }
    }

    pub fn set(&mut self, field: SceneField, value: impl Into<String>) {
        let value = Some(value.into());
        match field {
            SceneField::Text => self.text = value,
            SceneField::Image => self.image = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneField {
    Text,
    Image,
}

impl SceneField {
    pub fn as_str(self) -> &'static str {
        match self {
            SceneField::Text => "text",
            SceneField::Image => "image",
        }
    }
}

impl fmt::Display for SceneField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SceneField {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(SceneField::Text),
            "image" => Ok(SceneField::Image),
            other => Err(StudioError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneUpdate {
    pub index: usize,
    pub field: SceneField,
    pub value: String,
}

impl SceneUpdate {
    pub fn new(index: usize, field: SceneField, value: impl Into<String>) -> Self {
        Self {
            index,
            field,
            value: value.into(),
        }
    }
}

/// Ordered scenes of one video. Serialized as a bare JSON array; the older
/// `{"scenes": [...]}` wrapper is accepted on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoryboardRepr", into = "Vec<Scene>")]
pub struct Storyboard {
    pub scenes: Vec<Scene>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoryboardRepr {
    Scenes(Vec<Scene>),
    Wrapped { scenes: Vec<Scene> },
}

impl From<StoryboardRepr> for Storyboard {
    fn from(repr: StoryboardRepr) -> Self {
        match repr {
            StoryboardRepr::Scenes(scenes) | StoryboardRepr::Wrapped { scenes } => {
                Self { scenes }
            }
        }
    }
}

impl From<Storyboard> for Vec<Scene> {
    fn from(storyboard: Storyboard) -> Self {
        storyboard.scenes
    }
}

impl From<Vec<Scene>> for Storyboard {
    fn from(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }
}

impl Storyboard {
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Scene> {
        self.scenes.get(index)
    }

    pub fn image_prompts(&self) -> Vec<String> {
        self.scenes
            .iter()
            .map(|s| s.image.clone().unwrap_or_default())
            .collect()
    }

    /// Missing file is an empty storyboard.
    pub async fn load(path: &Path) -> StudioResult<Self> {
        Ok(storage::read_json(path).await?.unwrap_or_default())
    }

    pub async fn save(&self, path: &Path) -> StudioResult<()> {
        storage::write_json(path, &self.scenes).await
    }

    /// Applies in-range updates and returns how many were applied.
    pub fn apply_updates(&mut self, updates: &[SceneUpdate]) -> usize {
        let mut applied = 0;
        for update in updates {
            match self.scenes.get_mut(update.index) {
                Some(scene) => {
                    scene.set(update.field, update.value.as_str());
                    applied += 1;
                }
                None => debug!(
                    "ignoring {} update for scene {} (storyboard has {})",
                    update.field,
                    update.index,
                    self.scenes.len()
                ),
            }
        }
        applied
    }

    /// Load, apply, save. Used for standalone storyboard files.
    pub async fn update(path: &Path, updates: &[SceneUpdate]) -> StudioResult<Self> {
        let _guard = storage::lock_file(path).await;
        let mut storyboard = Self::load(path).await?;
        storyboard.apply_updates(updates);
        storyboard.save(path).await?;
        Ok(storyboard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn three_scenes() -> Storyboard {
        Storyboard::from(vec![
            Scene::new("a", "img a"),
            Scene::new("b", "img b"),
            Scene::new("c", "img c"),
        ])
    }

    #[test]
    fn serializes_as_array_with_exact_field_names() {
        let sb = Storyboard::from(vec![Scene {
            text: Some("hi".into()),
            image: None,
        }]);
        let json = serde_json::to_value(&sb).unwrap();
        assert_eq!(json, serde_json::json!([{"text": "hi", "image": null}]));
    }

    #[test]
    fn accepts_wrapped_scenes() {
        let sb: Storyboard =
            serde_json::from_str(r#"{"scenes":[{"text":"x","image":"y"}]}"#).unwrap();
        assert_eq!(sb.scenes, vec![Scene::new("x", "y")]);
    }

    #[test]
    fn unknown_field_name_is_rejected() {
        assert_eq!("image".parse::<SceneField>().unwrap(), SceneField::Image);
        assert!(matches!(
            "audio".parse::<SceneField>(),
            Err(StudioError::UnknownField(f)) if f == "audio"
        ));
    }

    #[test]
    fn out_of_range_updates_never_resize() {
        let mut sb = three_scenes();
        let applied = sb.apply_updates(&[
            SceneUpdate::new(3, SceneField::Text, "x"),
            SceneUpdate::new(1, SceneField::Image, "new b"),
        ]);
        assert_eq!(applied, 1);
        assert_eq!(sb.len(), 3);
        assert_eq!(sb.scenes[1].image.as_deref(), Some("new b"));
    }

    #[tokio::test]
    async fn load_missing_is_empty() {
        let tmp = TempDir::new().unwrap();
        let sb = Storyboard::load(&tmp.path().join("text/storyboard.json"))
            .await
            .unwrap();
        assert!(sb.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_not_replaced() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("storyboard.json");
        std::fs::write(&path, "[{\"text\": ").unwrap();

        let err = Storyboard::update(&path, &[SceneUpdate::new(0, SceneField::Text, "x")])
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::Corrupt { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[{\"text\": ");
    }

    #[tokio::test]
    async fn update_touches_only_the_named_field() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("storyboard.json");
        three_scenes().save(&path).await.unwrap();

        Storyboard::update(&path, &[SceneUpdate::new(2, SceneField::Text, "X")])
            .await
            .unwrap();

        let after = Storyboard::load(&path).await.unwrap();
        let mut expected = three_scenes();
        expected.scenes[2].text = Some("X".into());
        assert_eq!(after, expected);
        assert_eq!(after.scenes[2].image.as_deref(), Some("img c"));
    }
}
