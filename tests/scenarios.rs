use async_trait::async_trait;
use shorts_studio::StudioError;
use shorts_studio::aggregate::get_global_status;
use shorts_studio::api::TextEvaluator;
use shorts_studio::status::{StatusTracker, TextEvaluation};
use shorts_studio::storyboard::{Scene, SceneField, SceneUpdate, Storyboard};
use shorts_studio::video::VideoRecord;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

struct ScoreEight;

#[async_trait]
impl TextEvaluator for ScoreEight {
    async fn evaluate_text(&self, _text: &str) -> anyhow::Result<Option<TextEvaluation>> {
        Ok(Some(TextEvaluation::from([("score".to_string(), Some(8.0))])))
    }
}

fn add_images(video_dir: &Path, count: usize) {
    let images = video_dir.join("images");
    fs::create_dir_all(&images).unwrap();
    for i in 0..count {
        fs::write(images.join(format!("{i}.png")), b"png").unwrap();
    }
}

async fn write_video(video_dir: &Path, text: &str) {
    let mut record = VideoRecord {
        text: Some(text.to_string()),
        ..Default::default()
    };
    record.save(Some(&VideoRecord::data_path(video_dir))).await.unwrap();
}

#[tokio::test]
async fn fresh_directory_then_approvals_then_evaluation() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    add_images(dir, 3);

    let status = StatusTracker::get(dir).await.unwrap();
    assert_eq!(status.images_completed, vec![false, false, false]);
    assert_eq!(status.images_generated.len(), 3);
    assert!(!status.completed());

    for i in 0..3 {
        StatusTracker::update_image_status(dir, i, true).await.unwrap();
    }
    assert!(!StatusTracker::get(dir).await.unwrap().completed());

    let mut record = VideoRecord::get(&VideoRecord::data_path(dir)).await.unwrap();
    record.text = Some("Prometheus stole fire.".into());
    record.save(None).await.unwrap();

    let status = StatusTracker::evaluate_text(dir, &ScoreEight).await.unwrap();
    assert!(status.completed());
    assert!(StatusTracker::get(dir).await.unwrap().completed());
}

#[tokio::test]
async fn repeated_get_is_stable_and_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    add_images(dir, 2);

    let first = StatusTracker::get(dir).await.unwrap();
    let data_path = VideoRecord::data_path(dir);
    let bytes = fs::read(&data_path).unwrap();
    let modified = fs::metadata(&data_path).unwrap().modified().unwrap();

    let second = StatusTracker::get(dir).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read(&data_path).unwrap(), bytes);
    assert_eq!(fs::metadata(&data_path).unwrap().modified().unwrap(), modified);
}

#[tokio::test]
async fn lists_follow_image_files_on_disk() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    add_images(dir, 2);
    StatusTracker::update_image_status(dir, 1, true).await.unwrap();

    add_images(dir, 4);
    let status = StatusTracker::get(dir).await.unwrap();
    assert_eq!(status.images_completed, vec![false, true, false, false]);
    assert_eq!(status.images_generated.len(), 4);

    fs::remove_file(dir.join("images/3.png")).unwrap();
    fs::remove_file(dir.join("images/2.png")).unwrap();
    let status = StatusTracker::get(dir).await.unwrap();
    assert_eq!(status.images_completed, vec![false, true]);
    assert_eq!(status.images_generated.len(), 2);
}

#[tokio::test]
async fn zero_scenes_with_evaluation_is_completed() {
    let tmp = TempDir::new().unwrap();
    write_video(tmp.path(), "Short text.").await;
    let status = StatusTracker::evaluate_text(tmp.path(), &ScoreEight).await.unwrap();
    assert!(status.images_completed.is_empty());
    assert!(status.completed());
}

#[tokio::test]
async fn out_of_range_approval_leaves_file_untouched() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    add_images(dir, 2);
    StatusTracker::get(dir).await.unwrap();
    let before = fs::read(VideoRecord::data_path(dir)).unwrap();

    let err = StatusTracker::update_image_status(dir, 2, true).await.unwrap_err();
    assert!(matches!(err, StudioError::IndexOutOfRange { index: 2, len: 2 }));
    assert_eq!(fs::read(VideoRecord::data_path(dir)).unwrap(), before);
}

#[tokio::test]
async fn series_videos_are_enumerated_numerically() {
    let tmp = TempDir::new().unwrap();
    for n in ["1", "2", "10"] {
        write_video(&tmp.path().join("greek").join(n), "text").await;
    }

    let global = get_global_status(tmp.path()).await;
    let ordinals: Vec<u32> = global.series["greek"].iter().map(|e| e.ordinal).collect();
    assert_eq!(ordinals, vec![1, 2, 10]);
}

#[tokio::test]
async fn storyboard_survives_save_load_save() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("storyboard.json");
    let storyboard = Storyboard::from(vec![Scene::new("a", "b"), Scene::new("c", "d")]);

    storyboard.save(&path).await.unwrap();
    let loaded = Storyboard::load(&path).await.unwrap();
    loaded.save(&path).await.unwrap();

    let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(
        raw,
        serde_json::json!([{"text": "a", "image": "b"}, {"text": "c", "image": "d"}])
    );
    assert_eq!(Storyboard::load(&path).await.unwrap(), storyboard);
}

#[tokio::test]
async fn video_record_round_trip_keeps_content() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("video_data.json");
    fs::write(
        &path,
        r#"{
  "video_path": null,
  "text": "Athena was born.",
  "storyboard": [{"text": "Athena was born.", "image": "a goddess"}],
  "video_n": 4,
  "youtube_details": {"title": "Athena", "tags": ["myth"], "uploaded": false, "realse_date": "2025-01-02", "video_type": "short"},
  "production_status": {"text_completed": true, "text_evaluation": {"average_score": 7.5}, "images_completed": [true]},
  "text_cost": 0.01
}"#,
    )
    .unwrap();

    let original = VideoRecord::get(&path).await.unwrap();
    original.clone().save(None).await.unwrap();
    let reloaded = VideoRecord::get(&path).await.unwrap();
    assert_eq!(reloaded, original);
    assert_eq!(reloaded.youtube_details.release_date.as_deref(), Some("2025-01-02"));
}

#[tokio::test]
async fn scene_edit_touches_only_its_field() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("storyboard.json");
    let before = Storyboard::from(vec![
        Scene::new("t0", "i0"),
        Scene::new("t1", "i1"),
        Scene::new("t2", "i2"),
        Scene::new("t3", "i3"),
    ]);
    before.save(&path).await.unwrap();

    let after = Storyboard::update(&path, &[SceneUpdate::new(2, SceneField::Text, "X")])
        .await
        .unwrap();
    for i in [0, 1, 3] {
        assert_eq!(after.get(i), before.get(i));
    }
    assert_eq!(after.scenes[2].text.as_deref(), Some("X"));
    assert_eq!(after.scenes[2].image.as_deref(), Some("i2"));
    assert_eq!(Storyboard::load(&path).await.unwrap(), after);
}
