use crate::api::TextGenerator;
use crate::series::SeriesRecord;
use crate::status::ProductionStatus;
use crate::storyboarder::Storyboarder;
use crate::video::VideoRecord;
use crate::writer::Writer;
use crate::youtube::YoutubeDetails;
use crate::{logi, logok, logw};
use anyhow::Result;
use std::sync::Arc;

/// Writes, scores and storyboards a batch of shorts for one series.
pub struct ShortsSeriesGenerator {
    writer: Writer,
    storyboarder: Storyboarder,
    story_words: u32,
}

impl ShortsSeriesGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>, story_words: u32) -> Self {
        Self {
            writer: Writer::new(llm.clone()),
            storyboarder: Storyboarder::new(llm),
            story_words,
        }
    }

    pub fn with_storyboarder(mut self, storyboarder: Storyboarder) -> Self {
        self.storyboarder = storyboarder;
        self
    }

    /// Produces `num_stories` videos, ranks them, appends them to the series
    /// and saves everything. Returns how many videos were added.
    pub async fn generate_series(&self, series: &mut SeriesRecord) -> Result<usize> {
        let wanted = series.num_stories.unwrap_or(0);
        if wanted == 0 {
            logw("Series asks for zero stories, nothing to do");
            return Ok(0);
        }

        let mut batch = Vec::new();
        for i in 0..wanted {
            logi(format!("Story {}/{}", i + 1, wanted));
            match self.generate_video(series).await {
                Ok(Some(video)) => batch.push(video),
                Ok(None) => logw(format!("Story {} skipped: a generation step failed", i + 1)),
                Err(err) => logw(format!("Story {} skipped: {:#}", i + 1, err)),
            }
        }

        let added = batch.len();
        series.add_ranked_batch(batch)?;
        series.save(None).await?;
        logok(format!("Added {} of {} stories to the series", added, wanted));
        Ok(added)
    }

    async fn generate_video(&self, series: &mut SeriesRecord) -> Result<Option<VideoRecord>> {
        let expertise = series.expertise.clone().unwrap_or_default();
        let theme_hint = series.series_theme.clone().unwrap_or_default();

        let Some(theme) = self
            .writer
            .generate_theme(&expertise, &theme_hint, &series.used_themes)
            .await?
        else {
            return Ok(None);
        };
        series.used_themes.push(theme.text.clone());
        logi(format!("Theme: {}", theme.text));

        let Some(story) = self
            .writer
            .generate_story(&expertise, &theme.text, self.story_words)
            .await?
        else {
            return Ok(None);
        };
        let Some(improved) = self
            .writer
            .improve_story(&expertise, &story.text, self.story_words)
            .await?
        else {
            return Ok(None);
        };
        let Some(evaluation) = self.writer.evaluate(&improved.text).await? else {
            return Ok(None);
        };
        let Some(storyboard) = self.storyboarder.generate_storyboard(&improved.text).await? else {
            return Ok(None);
        };

        Ok(Some(VideoRecord {
            text: Some(improved.text.clone()),
            storyboard: storyboard.storyboard,
            youtube_details: YoutubeDetails::short(theme.text, improved.text),
            production_status: ProductionStatus {
                text_completed: true,
                text_evaluation: Some(evaluation),
                storyboard_completed: true,
                ..Default::default()
            },
            text_cost: Some(theme.cost + story.cost + improved.cost + storyboard.cost),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::LlmResponse;
    use crate::status::AVERAGE_SCORE_KEY;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Answers each prompt kind with a canned reply. Evaluations of the first
    /// story score 3, later ones 9.
    #[derive(Default)]
    struct FakeLlm {
        themes: Mutex<u32>,
        evaluations: Mutex<u32>,
        fail_first_theme: bool,
    }

    #[async_trait]
    impl TextGenerator for FakeLlm {
        async fn generate_text(
            &self,
            prompt: &str,
            system_prompt: Option<&str>,
        ) -> Result<Option<LlmResponse>> {
            let system = system_prompt.unwrap_or_default();
            let text = if system.starts_with("Rate") {
                let mut n = self.evaluations.lock().unwrap();
                *n += 1;
                (if *n <= 3 { "3" } else { "9" }).to_string()
            } else if system.contains("storyboard artist") {
                "<visual_description>a temple</visual_description>".to_string()
            } else if system.contains("into storyboards") {
                r#"<result>[{"text": "One.", "image": "temple"}, {"text": "Two.", "image": "sky"}]</result>"#
                    .to_string()
            } else if prompt.contains("<theme>") {
                let mut n = self.themes.lock().unwrap();
                *n += 1;
                if self.fail_first_theme && *n == 1 {
                    return Ok(None);
                }
                format!("<theme>Theme {}</theme>", *n)
            } else if prompt.contains("<texto_mejorado>") {
                "<texto_mejorado>One. Two.</texto_mejorado>".to_string()
            } else {
                "<text>One two.</text>".to_string()
            };
            Ok(Some(LlmResponse {
                text,
                usage: 1,
                cost: 0.25,
            }))
        }
    }

    fn series_in(tmp: &TempDir, stories: u32) -> SeriesRecord {
        SeriesRecord {
            json_data_path: Some(SeriesRecord::data_path(tmp.path())),
            series_theme: Some("Greek myths".into()),
            expertise: Some("mythology".into()),
            num_stories: Some(stories),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn batch_is_ranked_best_first_and_saved() {
        let tmp = TempDir::new().unwrap();
        let mut series = series_in(&tmp, 2);
        let producer = ShortsSeriesGenerator::new(Arc::new(FakeLlm::default()), 100);

        let added = producer.generate_series(&mut series).await.unwrap();
        assert_eq!(added, 2);
        assert_eq!(series.used_themes, vec!["Theme 1", "Theme 2"]);

        let first = VideoRecord::get(&tmp.path().join("1/video_data.json")).await.unwrap();
        assert_eq!(first.title(), "Theme 2");
        assert_eq!(first.video_n, Some(1));
        let eval = first.production_status.text_evaluation.as_ref().unwrap();
        assert_eq!(eval[AVERAGE_SCORE_KEY], Some(9.0));
        assert!(first.production_status.text_completed);
        assert!(first.production_status.storyboard_completed);
        assert_eq!(first.storyboard.len(), 2);
        // theme + story + improved + two storyboard passes
        assert!((first.text_cost.unwrap() - 1.25).abs() < 1e-9);

        let reloaded = SeriesRecord::get(&SeriesRecord::data_path(tmp.path())).await.unwrap();
        assert_eq!(reloaded.videos.len(), 2);
        assert_eq!(reloaded.videos[1].title(), "Theme 1");
    }

    #[tokio::test]
    async fn failed_story_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let mut series = series_in(&tmp, 2);
        let llm = FakeLlm {
            fail_first_theme: true,
            ..Default::default()
        };
        let producer = ShortsSeriesGenerator::new(Arc::new(llm), 100);

        assert_eq!(producer.generate_series(&mut series).await.unwrap(), 1);
        assert_eq!(series.used_themes, vec!["Theme 2"]);
        assert_eq!(series.videos.len(), 1);
        assert!(tmp.path().join("1/video_data.json").exists());
        assert!(!tmp.path().join("2").exists());
    }
}
