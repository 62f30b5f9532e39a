use crate::api::TextGenerator;
use crate::logw;
use crate::storyboard::{Scene, Storyboard};
use anyhow::Result;
use serde::Deserialize;
use std::sync::Arc;

const VISUAL_SYSTEM: &str = "You are a storyboard artist for vertical short videos. \
    Describe the key visual moments of a narration: characters, settings, lighting and mood.";

const STORYBOARD_SYSTEM: &str = "You turn narrations into storyboards. Split the narration into \
    scenes of one or two sentences, keeping the original wording, and write one detailed \
    image prompt per scene in English. Keep characters consistent across prompts.";

const OUTPUT_FORMAT: &str = "Return the scenes inside <result></result> as a JSON array: \
    [{\"text\": \"narration of the scene\", \"image\": \"image prompt\"}]";

/// A storyboard plus the LLM cost of producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryboardDraft {
    pub storyboard: Storyboard,
    pub cost: f64,
}

#[derive(Deserialize)]
struct RawScene {
    text: String,
    image: String,
}

pub struct Storyboarder {
    llm: Arc<dyn TextGenerator>,
    style: String,
}

impl Storyboarder {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self {
            llm,
            style: "Cinematic digital painting, dramatic lighting, rich colors.".to_string(),
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    /// `Ok(None)` when either pass fails or the scene list cannot be parsed.
    pub async fn generate_storyboard(&self, text: &str) -> Result<Option<StoryboardDraft>> {
        let visual_prompt = format!(
            "Analyse this narration visually:\n\n{text}\n\n\
             Put your analysis inside <visual_description></visual_description>."
        );
        let Some(visual) = self.llm.generate_text(&visual_prompt, Some(VISUAL_SYSTEM)).await?
        else {
            return Ok(None);
        };
        let description = visual.tag_or_text("visual_description");

        let system = format!("{STORYBOARD_SYSTEM}\nImage style: {}", self.style);
        let prompt = format!(
            "Narration:\n{text}\n\nVisual analysis:\n{description}\n\n\
             Create the storyboard for this narration.\n{OUTPUT_FORMAT}"
        );
        let Some(reply) = self.llm.generate_text(&prompt, Some(&system)).await? else {
            return Ok(None);
        };

        match parse_scenes(&reply.tag_or_text("result")) {
            Some(storyboard) => Ok(Some(StoryboardDraft {
                storyboard,
                cost: visual.cost + reply.cost,
            })),
            None => {
                logw("Storyboard reply is not a scene list");
                Ok(None)
            }
        }
    }
}

/// Accepts a bare JSON array, tolerating a fenced code block around it.
fn parse_scenes(raw: &str) -> Option<Storyboard> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end < start {
        return None;
    }
    let scenes: Vec<RawScene> = serde_json::from_str(&raw[start..=end]).ok()?;
    if scenes.is_empty() {
        return None;
    }
    Some(Storyboard::from(
        scenes
            .into_iter()
            .map(|s| Scene::new(s.text, s.image))
            .collect::<Vec<_>>(),
    ))
}
