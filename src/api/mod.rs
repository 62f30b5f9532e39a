//! Contracts for the external generation services, and their HTTP clients.

pub mod anthropic;
pub mod elevenlabs;
pub mod openai;
pub mod replicate;

use crate::config::{Config, ImageSettings, VideoSettings};
use crate::status::TextEvaluation;
use crate::video::VideoRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    pub text: String,
    /// Prompt plus completion tokens.
    pub usage: u64,
    pub cost: f64,
}

impl LlmResponse {
    /// Content of the first `<tag>...</tag>` block, trimmed.
    pub fn extract_tag(&self, tag: &str) -> Option<String> {
        let pattern = format!(r"(?s)<{0}>(.*?)</{0}>", regex::escape(tag));
        let re = Regex::new(&pattern).ok()?;
        re.captures(&self.text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    }

    /// Tagged content, or the whole reply when the tag is absent.
    pub fn tag_or_text(&self, tag: &str) -> String {
        self.extract_tag(tag)
            .unwrap_or_else(|| self.text.trim().to_string())
    }

    /// First number in the reply.
    pub fn first_number(&self) -> Option<f64> {
        number_regex()
            .ok()?
            .find(&self.text)
            .and_then(|m| m.as_str().parse::<f64>().ok())
    }
}

fn number_regex() -> Result<&'static Regex> {
    static NUMBER_RE: OnceCell<Regex> = OnceCell::new();
    NUMBER_RE.get_or_try_init(|| {
        Regex::new(r"-?\d+(\.\d+)?").context("failed to compile number regex")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
}

/// USD per token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub input: f64,
    pub output: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmModel {
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    #[default]
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
    #[serde(rename = "claude-3-5-sonnet")]
    Claude35Sonnet,
}

impl LlmModel {
    pub const fn provider(self) -> Provider {
        match self {
            LlmModel::Gpt4o | LlmModel::Gpt4oMini => Provider::OpenAi,
            LlmModel::Claude35Sonnet => Provider::Anthropic,
        }
    }

    pub const fn api_name(self) -> &'static str {
        match self {
            LlmModel::Gpt4o => "gpt-4o",
            LlmModel::Gpt4oMini => "gpt-4o-mini",
            LlmModel::Claude35Sonnet => "claude-3-5-sonnet-20240620",
        }
    }

    pub const fn pricing(self) -> Pricing {
        match self {
            LlmModel::Gpt4o => Pricing {
                input: 2.5e-6,
                output: 10e-6,
            },
            LlmModel::Gpt4oMini => Pricing {
                input: 0.15e-6,
                output: 0.6e-6,
            },
            LlmModel::Claude35Sonnet => Pricing {
                input: 3e-6,
                output: 15e-6,
            },
        }
    }

    pub fn cost(self, input_tokens: u64, output_tokens: u64) -> f64 {
        let p = self.pricing();
        input_tokens as f64 * p.input + output_tokens as f64 * p.output
    }
}

/// `Ok(None)` means the provider answered but produced nothing usable.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<Option<LlmResponse>>;
}

#[async_trait]
pub trait TextEvaluator: Send + Sync {
    async fn evaluate_text(&self, text: &str) -> Result<Option<TextEvaluation>>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Writes one image to `output_file`; `Ok(false)` when the provider failed.
    async fn generate_image(
        &self,
        prompt: &str,
        output_file: &Path,
        settings: &ImageSettings,
    ) -> Result<bool>;

    /// Writes `{i}.png` into `output_dir` per prompt; returns the files written.
    async fn generate_images(
        &self,
        prompts: &[String],
        output_dir: &Path,
        settings: &ImageSettings,
    ) -> Result<Vec<(usize, PathBuf)>> {
        let mut written = Vec::new();
        for (i, prompt) in prompts.iter().enumerate() {
            let out = output_dir.join(format!("{i}.png"));
            if self.generate_image(prompt, &out, settings).await? {
                written.push((i, out));
            }
        }
        Ok(written)
    }
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn generate_speech(&self, text: &str, output_file: &Path, voice: &str) -> Result<bool>;
}

#[async_trait]
pub trait VideoAssembler: Send + Sync {
    async fn generate_video(
        &self,
        images_dir: &Path,
        audios_dir: &Path,
        output_path: &Path,
        settings: &VideoSettings,
    ) -> Result<bool>;
}

/// Returns the public URL once the upload is confirmed.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, video: &VideoRecord, video_file: &Path) -> Result<Option<String>>;
}

pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")
}

/// Picks the client for the configured model's provider.
pub fn text_generator(cfg: &Config, client: reqwest::Client) -> Result<Arc<dyn TextGenerator>> {
    let generator: Arc<dyn TextGenerator> = match cfg.llm.model.provider() {
        Provider::OpenAi => Arc::new(openai::OpenAiChat::new(client, cfg)?),
        Provider::Anthropic => Arc::new(anthropic::AnthropicChat::new(client, cfg)?),
    };
    Ok(generator)
}
