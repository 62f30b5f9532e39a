use crate::api::SpeechSynthesizer;
use crate::config::Config;
use crate::logw;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use tokio::fs;

pub struct ElevenLabsTts {
    client: Client,
    api_key: String,
    model_id: String,
}

impl ElevenLabsTts {
    pub fn new(client: Client, cfg: &Config) -> Result<Self> {
        let api_key = cfg.require(&cfg.elevenlabs_key, "elevenlabs_api_key")?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model_id: cfg.eleven_model_id.clone(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsTts {
    async fn generate_speech(&self, text: &str, out_mp3_path: &Path, voice: &str) -> Result<bool> {
        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}?output_format=mp3_44100_128",
            voice
        );

        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.8,
            },
        });

        let resp = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .timeout(std::time::Duration::from_secs(300))
            .send()
            .await
            .context("ElevenLabs request failed")?;

        if !resp.status().is_success() {
            logw(format!("ElevenLabs TTS failed HTTP {}", resp.status().as_u16()));
            return Ok(false);
        }

        let bytes = resp.bytes().await.context("ElevenLabs response read failed")?;
        if let Some(parent) = out_mp3_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }
        fs::write(out_mp3_path, &bytes).await?;

        Ok(fs::metadata(out_mp3_path).await.is_ok())
    }
}
