use crate::api::{LlmModel, LlmResponse, TextGenerator};
use crate::config::Config;
use crate::logw;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiChat {
    client: Client,
    api_key: String,
    model: LlmModel,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiChat {
    pub fn new(client: Client, cfg: &Config) -> Result<Self> {
        let api_key = cfg.require(&cfg.openai_api_key, "openai_api_key")?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: cfg.llm.model,
            max_tokens: cfg.llm.max_tokens,
            temperature: cfg.llm.temperature,
        })
    }
}

fn log_openai_error(root: &serde_json::Value) {
    if let Some(err) = root.get("error") {
        if let Some(msg) = err.get("message").and_then(|v| v.as_str()) {
            logw(format!("OpenAI error message: {}", msg));
        }
        if let Some(code) = err.get("code").and_then(|v| v.as_str()) {
            logw(format!("OpenAI error code: {}", code));
        }
    }
}

fn parse_chat_response(model: LlmModel, raw: &str) -> Option<LlmResponse> {
    let root: serde_json::Value = serde_json::from_str(raw).ok()?;
    if root.get("error").is_some() {
        log_openai_error(&root);
        return None;
    }

    let text = root
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()?
        .to_string();

    let usage = root.get("usage");
    let prompt_tokens = usage
        .and_then(|u| u.get("prompt_tokens"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let completion_tokens = usage
        .and_then(|u| u.get("completion_tokens"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0);

    Some(LlmResponse {
        text,
        usage: prompt_tokens + completion_tokens,
        cost: model.cost(prompt_tokens, completion_tokens),
    })
}

#[async_trait]
impl TextGenerator for OpenAiChat {
    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<Option<LlmResponse>> {
        let mut messages = Vec::new();
        if let Some(system) = system_prompt {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));

        let body = json!({
            "model": self.model.api_name(),
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let resp = self
            .client
            .post(CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(std::time::Duration::from_secs(600))
            .send()
            .await
            .context("OpenAI request failed")?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            logw(format!("OpenAI HTTP {}", status.as_u16()));
            if !raw.is_empty() {
                let snippet = raw.chars().take(800).collect::<String>();
                logw(format!("OpenAI raw body: {}", snippet));
            }
            return Ok(None);
        }

        let parsed = parse_chat_response(self.model, &raw);
        if parsed.is_none() {
            logw("OpenAI response parse failed.".to_string());
        }
        Ok(parsed)
    }
}
