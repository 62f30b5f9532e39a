//! Per-video production stages. Each stage loads the record, reconciles its
//! status against disk, calls one collaborator and sets its flags only on
//! success. Flags are committed through [`StatusTracker::modify`] so edits
//! made while a collaborator runs are kept.

use crate::api::{ImageGenerator, Publisher, SpeechSynthesizer, VideoAssembler};
use crate::config::{ImageSettings, VideoSettings};
use crate::error::{StudioError, StudioResult};
use crate::status::{ProductionStatus, StatusTracker};
use crate::storage;
use crate::storyboard::SceneField;
use crate::video::VideoRecord;
use crate::youtube::YoutubeDetails;
use crate::{logi, logok, logw};
use std::path::{Path, PathBuf};

fn mark_generated(status: &mut ProductionStatus, index: usize) {
    if let Err(err) = status.set_image_generated(index, true) {
        logw(format!("Image {} written but not tracked: {}", index, err));
    }
}

/// One image per scene prompt into `images/{i}.png`.
pub async fn generate_images(
    video_dir: &Path,
    images: &dyn ImageGenerator,
    settings: &ImageSettings,
) -> StudioResult<ProductionStatus> {
    let record = StatusTracker::load_reconciled(video_dir).await?;
    let prompts = record.storyboard.image_prompts();
    if prompts.is_empty() {
        return Err(StudioError::incomplete(
            "image generation",
            "storyboard has no scenes",
        ));
    }

    let out_dir = video_dir.join(storage::IMAGES_DIR);
    logi(format!("Generating {} images in {}", prompts.len(), out_dir.display()));
    let written = images
        .generate_images(&prompts, &out_dir, settings)
        .await
        .map_err(|e| StudioError::incomplete("image generation", format!("{e:#}")))?;
    if written.is_empty() {
        return Err(StudioError::incomplete(
            "image generation",
            "no image was produced",
        ));
    }

    let record = StatusTracker::modify(video_dir, |record| {
        for (index, _) in &written {
            mark_generated(&mut record.production_status, *index);
        }
        Ok(())
    })
    .await?;
    if written.len() < prompts.len() {
        logw(format!(
            "{} of {} images missing; the video cannot be rendered yet",
            prompts.len() - written.len(),
            prompts.len()
        ));
    }
    logok(format!("{}/{} images generated", written.len(), prompts.len()));
    Ok(record.production_status)
}

/// Regenerates one scene image, optionally with a new prompt. The fresh image
/// needs approval again.
pub async fn remake_image(
    video_dir: &Path,
    index: usize,
    prompt: Option<&str>,
    images: &dyn ImageGenerator,
    settings: &ImageSettings,
) -> StudioResult<ProductionStatus> {
    let mut record = StatusTracker::load_reconciled(video_dir).await?;
    let len = record.storyboard.len();
    if index >= len {
        return Err(StudioError::IndexOutOfRange { index, len });
    }

    if let Some(prompt) = prompt.map(str::trim).filter(|p| !p.is_empty()) {
        record = StatusTracker::modify(video_dir, |record| {
            let len = record.storyboard.len();
            let scene = record
                .storyboard
                .scenes
                .get_mut(index)
                .ok_or(StudioError::IndexOutOfRange { index, len })?;
            scene.set(SceneField::Image, prompt);
            Ok(())
        })
        .await?;
    }
    let len = record.storyboard.len();
    let prompt = record
        .storyboard
        .scenes
        .get(index)
        .ok_or(StudioError::IndexOutOfRange { index, len })?
        .field(SceneField::Image)
        .unwrap_or_default()
        .to_string();

    let out = video_dir
        .join(storage::IMAGES_DIR)
        .join(format!("{index}.png"));
    let ok = images
        .generate_image(&prompt, &out, settings)
        .await
        .map_err(|e| StudioError::incomplete("image remake", format!("{e:#}")))?;
    if !ok {
        return Err(StudioError::incomplete("image remake", "provider returned no image"));
    }

    let record = StatusTracker::modify(video_dir, |record| {
        mark_generated(&mut record.production_status, index);
        if index < record.production_status.scene_count() {
            record.production_status.set_image_completed(index, false)?;
        }
        Ok(())
    })
    .await?;
    logok(format!("Image {} remade", index));
    Ok(record.production_status)
}

/// One mp3 per scene narration into `audios/{i}.mp3`. The stage completes only
/// when every scene got its audio.
pub async fn generate_speech(
    video_dir: &Path,
    speech: &dyn SpeechSynthesizer,
    voice: &str,
) -> StudioResult<ProductionStatus> {
    let record = StatusTracker::load_reconciled(video_dir).await?;
    if record.storyboard.is_empty() {
        return Err(StudioError::incomplete("speech", "storyboard has no scenes"));
    }

    let audios = video_dir.join(storage::AUDIOS_DIR);
    let total = record.storyboard.len();
    let mut failed = Vec::new();
    for (i, scene) in record.storyboard.scenes.iter().enumerate() {
        let text = scene.field(SceneField::Text).unwrap_or_default().trim();
        if text.is_empty() {
            failed.push(i);
            continue;
        }
        let out = audios.join(format!("{i}.mp3"));
        match speech.generate_speech(text, &out, voice).await {
            Ok(true) => {}
            Ok(false) => failed.push(i),
            Err(err) => {
                logw(format!("Speech for scene {} failed: {:#}", i, err));
                failed.push(i);
            }
        }
    }

    if !failed.is_empty() {
        return Err(StudioError::incomplete(
            "speech",
            format!("{} of {} scenes failed: {:?}", failed.len(), total, failed),
        ));
    }

    let record = StatusTracker::modify(video_dir, |record| {
        record.production_status.tts_completed = true;
        Ok(())
    })
    .await?;
    logok(format!("Speech generated for {} scenes", total));
    Ok(record.production_status)
}

/// Path of the rendered file: `<dir>/<n>.mp4`.
pub fn rendered_video_path(video_dir: &Path, record: &VideoRecord) -> PathBuf {
    let name = record
        .video_n
        .or_else(|| storage::dir_ordinal(video_dir))
        .map(|n| n.to_string())
        .unwrap_or_else(|| "video".to_string());
    video_dir.join(format!("{name}.mp4"))
}

/// Renders only when every scene has a generated image and speech is done.
pub async fn render_video(
    video_dir: &Path,
    assembler: &dyn VideoAssembler,
    settings: &VideoSettings,
) -> StudioResult<ProductionStatus> {
    let record = StatusTracker::load_reconciled(video_dir).await?;
    let status = &record.production_status;
    if status.scene_count() == 0 {
        return Err(StudioError::incomplete("render", "no images on disk"));
    }
    if status.scene_count() != record.storyboard.len() {
        return Err(StudioError::incomplete(
            "render",
            format!(
                "{} images on disk for {} scenes",
                status.scene_count(),
                record.storyboard.len()
            ),
        ));
    }
    if let Some(missing) = status.images_generated.iter().position(|done| !*done) {
        return Err(StudioError::incomplete(
            "render",
            format!("image {missing} is not generated"),
        ));
    }
    if !record.production_status.tts_completed {
        return Err(StudioError::incomplete("render", "speech is not generated"));
    }

    let out = rendered_video_path(video_dir, &record);
    let ok = assembler
        .generate_video(
            &video_dir.join(storage::IMAGES_DIR),
            &video_dir.join(storage::AUDIOS_DIR),
            &out,
            settings,
        )
        .await
        .map_err(|e| StudioError::incomplete("render", format!("{e:#}")))?;
    if !ok {
        return Err(StudioError::incomplete("render", "assembler produced no video"));
    }

    let record = StatusTracker::modify(video_dir, |record| {
        record.video_path = Some(out.clone());
        record.production_status.ready_to_upload = true;
        Ok(())
    })
    .await?;
    logok(format!("Rendered {}", out.display()));
    Ok(record.production_status)
}

/// Uploads a rendered video once; an already uploaded video is left alone.
pub async fn publish_video(
    video_dir: &Path,
    publisher: &dyn Publisher,
) -> StudioResult<YoutubeDetails> {
    let record = StatusTracker::load_reconciled(video_dir).await?;
    if record.youtube_details.uploaded {
        return Ok(record.youtube_details);
    }
    let Some(video_file) = record
        .video_path
        .clone()
        .filter(|_| record.production_status.ready_to_upload)
    else {
        return Err(StudioError::incomplete("publish", "video is not rendered"));
    };

    let url = publisher
        .publish(&record, &video_file)
        .await
        .map_err(|e| StudioError::incomplete("publish", format!("{e:#}")))?
        .ok_or_else(|| StudioError::incomplete("publish", "upload not confirmed"))?;

    let record = StatusTracker::modify(video_dir, |record| {
        record.youtube_details.mark_uploaded(url);
        Ok(())
    })
    .await?;
    logok(format!("Published '{}'", record.title()));
    Ok(record.youtube_details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storyboard::{Scene, SceneUpdate, Storyboard};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes a placeholder file unless the prompt is `"fail"`.
    struct FakeImages;

    #[async_trait]
    impl ImageGenerator for FakeImages {
        async fn generate_image(
            &self,
            prompt: &str,
            output_file: &Path,
            _settings: &ImageSettings,
        ) -> Result<bool> {
            if prompt == "fail" {
                return Ok(false);
            }
            std::fs::create_dir_all(output_file.parent().unwrap())?;
            std::fs::write(output_file, prompt)?;
            Ok(true)
        }
    }

    struct FakeSpeech {
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSpeech {
        async fn generate_speech(&self, text: &str, output_file: &Path, _voice: &str) -> Result<bool> {
            if Some(text) == self.fail_on {
                return Ok(false);
            }
            std::fs::create_dir_all(output_file.parent().unwrap())?;
            std::fs::write(output_file, text)?;
            Ok(true)
        }
    }

    struct FakeAssembler;

    #[async_trait]
    impl VideoAssembler for FakeAssembler {
        async fn generate_video(
            &self,
            _images_dir: &Path,
            _audios_dir: &Path,
            output_path: &Path,
            _settings: &VideoSettings,
        ) -> Result<bool> {
            std::fs::write(output_path, b"mp4")?;
            Ok(true)
        }
    }

    struct FakePublisher(Mutex<usize>);

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn publish(&self, _video: &VideoRecord, _video_file: &Path) -> Result<Option<String>> {
            *self.0.lock().unwrap() += 1;
            Ok(Some("https://youtu.be/abc".to_string()))
        }
    }

    async fn video_dir(scenes: Vec<Scene>) -> TempDir {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("3");
        let mut record = VideoRecord {
            storyboard: Storyboard::from(scenes),
            video_n: Some(3),
            ..Default::default()
        };
        record.save(Some(&VideoRecord::data_path(&dir))).await.unwrap();
        tmp
    }

    #[tokio::test]
    async fn images_mark_generated_and_keep_lengths_equal() {
        let tmp = video_dir(vec![Scene::new("a", "cave"), Scene::new("b", "sky")]).await;
        let dir = tmp.path().join("3");

        let status = generate_images(&dir, &FakeImages, &ImageSettings::default())
            .await
            .unwrap();
        assert_eq!(status.images_generated, vec![true, true]);
        assert_eq!(status.images_completed, vec![false, false]);
        assert!(dir.join("images/1.png").exists());
    }

    #[tokio::test]
    async fn remake_replaces_prompt_and_resets_approval() {
        let tmp = video_dir(vec![Scene::new("a", "cave"), Scene::new("b", "sky")]).await;
        let dir = tmp.path().join("3");
        generate_images(&dir, &FakeImages, &ImageSettings::default())
            .await
            .unwrap();
        StatusTracker::update_image_status(&dir, 1, true).await.unwrap();

        let status = remake_image(&dir, 1, Some("stormy sky"), &FakeImages, &ImageSettings::default())
            .await
            .unwrap();
        assert_eq!(status.images_completed, vec![false, false]);

        let record = VideoRecord::get(&VideoRecord::data_path(&dir)).await.unwrap();
        assert_eq!(record.storyboard.image_prompts(), vec!["cave", "stormy sky"]);
        assert_eq!(std::fs::read_to_string(dir.join("images/1.png")).unwrap(), "stormy sky");
    }

    #[tokio::test]
    async fn remake_out_of_range_is_rejected() {
        let tmp = video_dir(vec![Scene::new("a", "cave")]).await;
        let dir = tmp.path().join("3");
        let err = remake_image(&dir, 4, None, &FakeImages, &ImageSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::IndexOutOfRange { index: 4, len: 1 }));
    }

    #[tokio::test]
    async fn speech_completes_only_when_every_scene_succeeds() {
        let tmp = video_dir(vec![Scene::new("one", "x"), Scene::new("two", "y")]).await;
        let dir = tmp.path().join("3");

        let err = generate_speech(&dir, &FakeSpeech { fail_on: Some("two") }, "voice")
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::StageIncomplete { .. }));
        assert!(!StatusTracker::get(&dir).await.unwrap().tts_completed);

        let status = generate_speech(&dir, &FakeSpeech { fail_on: None }, "voice")
            .await
            .unwrap();
        assert!(status.tts_completed);
        assert!(dir.join("audios/1.mp3").exists());
    }

    #[tokio::test]
    async fn render_needs_every_scene_image() {
        let tmp = video_dir(vec![
            Scene::new("one", "cave"),
            Scene::new("two", "fail"),
            Scene::new("three", "sky"),
        ])
        .await;
        let dir = tmp.path().join("3");
        generate_speech(&dir, &FakeSpeech { fail_on: None }, "v").await.unwrap();

        generate_images(&dir, &FakeImages, &ImageSettings::default()).await.unwrap();
        assert!(!dir.join("images/1.png").exists());
        let err = render_video(&dir, &FakeAssembler, &VideoSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::StageIncomplete { .. }));
        assert!(!dir.join("3.mp4").exists());
        assert!(!StatusTracker::get(&dir).await.unwrap().ready_to_upload);

        // Files dropped in by hand are not generated images.
        std::fs::write(dir.join("images/1.png"), b"png").unwrap();
        let err = render_video(&dir, &FakeAssembler, &VideoSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::StageIncomplete { .. }));

        VideoRecord::update_storyboard(&dir, &[SceneUpdate::new(1, SceneField::Image, "storm")])
            .await
            .unwrap();
        generate_images(&dir, &FakeImages, &ImageSettings::default()).await.unwrap();
        let status = render_video(&dir, &FakeAssembler, &VideoSettings::default())
            .await
            .unwrap();
        assert!(status.ready_to_upload);
    }

    #[tokio::test]
    async fn render_then_publish_once() {
        let tmp = video_dir(vec![Scene::new("one", "x")]).await;
        let dir = tmp.path().join("3");

        let early = render_video(&dir, &FakeAssembler, &VideoSettings::default()).await;
        assert!(early.is_err());

        generate_images(&dir, &FakeImages, &ImageSettings::default()).await.unwrap();
        generate_speech(&dir, &FakeSpeech { fail_on: None }, "v").await.unwrap();
        let status = render_video(&dir, &FakeAssembler, &VideoSettings::default())
            .await
            .unwrap();
        assert!(status.ready_to_upload);

        let record = VideoRecord::get(&VideoRecord::data_path(&dir)).await.unwrap();
        assert_eq!(record.video_path, Some(dir.join("3.mp4")));

        let publisher = FakePublisher(Mutex::new(0));
        let details = publish_video(&dir, &publisher).await.unwrap();
        assert!(details.uploaded);
        assert_eq!(details.url.as_deref(), Some("https://youtu.be/abc"));
        publish_video(&dir, &publisher).await.unwrap();
        assert_eq!(*publisher.0.lock().unwrap(), 1);
    }
}
