use crate::api::LlmModel;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_channel_root")]
    pub channel_root: PathBuf,
    #[serde(default = "default_server_addr")]
    pub server_addr: String,
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default)]
    pub anthropic_api_key: String,
    #[serde(rename = "elevenlabs_api_key")]
    #[serde(default)]
    pub elevenlabs_key: String,
    #[serde(default)]
    pub replicate_api_token: String,
    #[serde(rename = "eleven_voice_id")]
    #[serde(default = "default_voice_id")]
    pub eleven_voice_id: String,
    #[serde(rename = "eleven_model_id")]
    #[serde(default = "default_model_id")]
    pub eleven_model_id: String,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub image: ImageSettings,
    #[serde(default)]
    pub video: VideoSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: LlmModel,
    pub max_tokens: u32,
    pub temperature: f32,
    pub story_words: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: LlmModel::default(),
            max_tokens: 1000,
            temperature: 0.0,
            story_words: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub aspect_ratio: String,
    pub guidance_scale: f32,
    pub num_inference_steps: u32,
    pub output_quality: u32,
    /// Fixed seed; a random one is drawn per image when unset.
    pub seed: Option<u64>,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            aspect_ratio: "9:16".to_string(),
            guidance_scale: 3.5,
            num_inference_steps: 28,
            output_quality: 80,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    /// Longer renders are sped up to fit.
    pub max_duration_s: f64,
    pub zoom_per_frame: f64,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            fps: 30,
            width: 768,
            height: 1344,
            max_duration_s: 59.0,
            zoom_per_frame: 0.0008,
        }
    }
}

fn default_channel_root() -> PathBuf {
    PathBuf::from("data/MITO_TV/SHORTS")
}

fn default_server_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_voice_id() -> String {
    "JBFqnCBsd6RMkjVDRZzb".to_string()
}

fn default_model_id() -> String {
    "eleven_multilingual_v2".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel_root: default_channel_root(),
            server_addr: default_server_addr(),
            openai_api_key: String::new(),
            anthropic_api_key: String::new(),
            elevenlabs_key: String::new(),
            replicate_api_token: String::new(),
            eleven_voice_id: default_voice_id(),
            eleven_model_id: default_model_id(),
            llm: LlmSettings::default(),
            image: ImageSettings::default(),
            video: VideoSettings::default(),
        }
    }
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let mut config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
        config.fill_keys_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file gives the defaults.
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if fs::metadata(&path).await.is_ok() {
            return Self::load(path).await;
        }
        let mut config = Config::default();
        config.fill_keys_from_env();
        config.validate()?;
        Ok(config)
    }

    fn fill_keys_from_env(&mut self) {
        let slots = [
            (&mut self.openai_api_key, "OPENAI_API_KEY"),
            (&mut self.anthropic_api_key, "ANTHROPIC_API_KEY"),
            (&mut self.elevenlabs_key, "ELEVENLABS_API_KEY"),
            (&mut self.replicate_api_token, "REPLICATE_API_TOKEN"),
        ];
        for (slot, var) in slots {
            if slot.is_empty() {
                if let Ok(value) = std::env::var(var) {
                    *slot = value;
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_root.as_os_str().is_empty() {
            anyhow::bail!("config.json: channel_root is empty");
        }
        if self.server_addr.parse::<std::net::SocketAddr>().is_err() {
            anyhow::bail!("config.json: server_addr '{}' is not host:port", self.server_addr);
        }
        if self.llm.max_tokens == 0 {
            anyhow::bail!("config.json: llm.max_tokens must be positive");
        }
        if self.image.num_inference_steps == 0 || self.image.guidance_scale <= 0.0 {
            anyhow::bail!("config.json: image steps and guidance must be positive");
        }
        if self.video.fps == 0 || self.video.max_duration_s <= 0.0 {
            anyhow::bail!("config.json: video fps and max_duration_s must be positive");
        }
        if self.video.width % 2 != 0 || self.video.height % 2 != 0 {
            anyhow::bail!("config.json: video width/height must be even");
        }
        Ok(())
    }

    /// Returns a credential, failing with the config key that is missing.
    pub fn require<'a>(&self, value: &'a str, key: &str) -> Result<&'a str> {
        if value.is_empty() {
            anyhow::bail!("config.json: {key} missing");
        }
        Ok(value)
    }
}
