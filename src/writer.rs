use crate::api::{LlmResponse, TextEvaluator, TextGenerator};
use crate::status::{AVERAGE_SCORE_KEY, TextEvaluation, WORD_COUNT_KEY, average_of_aspects};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

const EVALUATION_ASPECTS: &[(&str, &str)] = &[
    (
        "historical_accuracy",
        "Rate the faithfulness of the following short story to its source myths or history from 1 to 10. Answer with the number only.",
    ),
    (
        "storytelling_quality",
        "Rate the storytelling quality (hook, pacing, ending) of the following short story from 1 to 10. Answer with the number only.",
    ),
    (
        "emotional_impact",
        "Rate the emotional impact of the following short story from 1 to 10. Answer with the number only.",
    ),
];

fn scriptwriter_system(expertise: &str) -> String {
    format!(
        "You are a scriptwriter for a short-video channel and an expert in {expertise}. \
         You write vivid, accurate narrations meant to be read aloud."
    )
}

/// Story text plus what it cost to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub text: String,
    pub cost: f64,
}

pub struct Writer {
    llm: Arc<dyn TextGenerator>,
}

impl Writer {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    pub async fn generate_theme(
        &self,
        expertise: &str,
        series_theme: &str,
        used_themes: &[String],
    ) -> Result<Option<Draft>> {
        let used = if used_themes.is_empty() {
            "none".to_string()
        } else {
            used_themes.join("; ")
        };
        let prompt = format!(
            "Series topic: {series_theme}\nAlready covered: {used}\n\
             Propose ONE new story for this series that is not already covered. \
             Reply with a short title inside <theme></theme>."
        );
        let out = self
            .llm
            .generate_text(&prompt, Some(&scriptwriter_system(expertise)))
            .await?;
        Ok(out.map(|r| Draft {
            text: clean_text(&r.tag_or_text("theme")),
            cost: r.cost,
        }))
    }

    pub async fn generate_story(
        &self,
        expertise: &str,
        theme: &str,
        words_number: u32,
    ) -> Result<Option<Draft>> {
        let prompt = format!(
            "Write a narration of about {words_number} words about: {theme}.\n\
             Put only the narration inside <text></text>."
        );
        let out = self
            .llm
            .generate_text(&prompt, Some(&scriptwriter_system(expertise)))
            .await?;
        Ok(out.map(|r| draft_from(&r, "text")))
    }

    pub async fn improve_story(
        &self,
        expertise: &str,
        text: &str,
        words_number: u32,
    ) -> Result<Option<Draft>> {
        let prompt = format!(
            "Improve the following narration, keeping it around {words_number} words. \
             Strengthen the opening hook and the ending.\n\n{text}\n\n\
             Put only the improved narration inside <texto_mejorado></texto_mejorado>."
        );
        let out = self
            .llm
            .generate_text(&prompt, Some(&scriptwriter_system(expertise)))
            .await?;
        Ok(out.map(|r| draft_from(&r, "texto_mejorado")))
    }

    /// Scores each aspect; an unparsable answer scores `None`. A failed call
    /// means no evaluation at all.
    pub async fn evaluate(&self, text: &str) -> Result<Option<TextEvaluation>> {
        let mut evaluation = TextEvaluation::new();
        for (aspect, system) in EVALUATION_ASPECTS {
            let prompt = format!("Evaluate the following text:\n\n{text}");
            let Some(reply) = self.llm.generate_text(&prompt, Some(system)).await? else {
                return Ok(None);
            };
            evaluation.insert((*aspect).to_string(), reply.first_number());
        }

        let average = average_of_aspects(&evaluation);
        evaluation.insert(
            WORD_COUNT_KEY.to_string(),
            Some(text.split_whitespace().count() as f64),
        );
        evaluation.insert(AVERAGE_SCORE_KEY.to_string(), average);
        Ok(Some(evaluation))
    }
}

#[async_trait]
impl TextEvaluator for Writer {
    async fn evaluate_text(&self, text: &str) -> Result<Option<TextEvaluation>> {
        self.evaluate(text).await
    }
}

fn draft_from(reply: &LlmResponse, tag: &str) -> Draft {
    Draft {
        text: clean_text(&reply.tag_or_text(tag)),
        cost: reply.cost,
    }
}

/// Narrations end up inside JSON prompts downstream.
fn clean_text(text: &str) -> String {
    text.replace('"', "'")
}
