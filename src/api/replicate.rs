use crate::api::ImageGenerator;
use crate::config::{Config, ImageSettings};
use crate::{logi, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

const PREDICTIONS_URL: &str =
    "https://api.replicate.com/v1/models/black-forest-labs/flux-dev/predictions";
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_POLLS: usize = 90;

/// flux-dev on Replicate.
pub struct ReplicateFlux {
    client: Client,
    api_token: String,
}

impl ReplicateFlux {
    pub fn new(client: Client, cfg: &Config) -> Result<Self> {
        let api_token = cfg.require(&cfg.replicate_api_token, "replicate_api_token")?;
        Ok(Self {
            client,
            api_token: api_token.to_string(),
        })
    }

    async fn create_prediction(&self, prompt: &str, settings: &ImageSettings) -> Result<Value> {
        let seed = settings
            .seed
            .unwrap_or_else(|| rand::thread_rng().gen_range(0..u32::MAX as u64));
        let body = json!({
            "input": {
                "prompt": prompt,
                "go_fast": true,
                "guidance": settings.guidance_scale,
                "num_outputs": 1,
                "aspect_ratio": settings.aspect_ratio,
                "output_format": "png",
                "output_quality": settings.output_quality,
                "prompt_strength": 0.8,
                "num_inference_steps": settings.num_inference_steps,
                "seed": seed,
            }
        });

        let resp = self
            .client
            .post(PREDICTIONS_URL)
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&body)
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .context("Replicate request failed")?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!(
                "Replicate HTTP {}: {}",
                status.as_u16(),
                raw.chars().take(400).collect::<String>()
            );
        }
        serde_json::from_str(&raw).context("Replicate response is not JSON")
    }

    async fn wait_for_output(&self, mut prediction: Value) -> Result<Option<String>> {
        for _ in 0..MAX_POLLS {
            match prediction.get("status").and_then(Value::as_str) {
                Some("succeeded") => return Ok(output_url(&prediction)),
                Some("failed") | Some("canceled") => {
                    let why = prediction
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    logw(format!("Replicate prediction failed: {}", why));
                    return Ok(None);
                }
                _ => {}
            }

            let Some(poll_url) = prediction
                .get("urls")
                .and_then(|u| u.get("get"))
                .and_then(Value::as_str)
                .map(str::to_string)
            else {
                return Ok(output_url(&prediction));
            };

            tokio::time::sleep(POLL_INTERVAL).await;
            prediction = self
                .client
                .get(&poll_url)
                .bearer_auth(&self.api_token)
                .send()
                .await
                .context("Replicate poll failed")?
                .json()
                .await
                .context("Replicate poll response is not JSON")?;
        }

        logw("Replicate prediction timed out".to_string());
        Ok(None)
    }
}

fn output_url(prediction: &Value) -> Option<String> {
    match prediction.get("output")? {
        Value::String(url) => Some(url.clone()),
        Value::Array(items) => items.first()?.as_str().map(str::to_string),
        _ => None,
    }
}

#[async_trait]
impl ImageGenerator for ReplicateFlux {
    async fn generate_image(
        &self,
        prompt: &str,
        output_file: &Path,
        settings: &ImageSettings,
    ) -> Result<bool> {
        let prediction = self.create_prediction(prompt, settings).await?;
        let Some(url) = self.wait_for_output(prediction).await? else {
            return Ok(false);
        };

        let bytes = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .context("Replicate image download failed")?
            .error_for_status()?
            .bytes()
            .await?;

        if let Some(parent) = output_file.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }
        fs::write(output_file, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", output_file.display()))?;
        logi(format!("Image saved: {}", output_file.display()));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_url_accepts_string_or_list() {
        let list = json!({"status": "succeeded", "output": ["https://x/0.png"]});
        assert_eq!(output_url(&list).as_deref(), Some("https://x/0.png"));
        let single = json!({"output": "https://x/1.png"});
        assert_eq!(output_url(&single).as_deref(), Some("https://x/1.png"));
        assert_eq!(output_url(&json!({"output": null})), None);
    }
}
