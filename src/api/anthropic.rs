use crate::api::{LlmModel, LlmResponse, TextGenerator};
use crate::config::Config;
use crate::logw;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicChat {
    client: Client,
    api_key: String,
    model: LlmModel,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicChat {
    pub fn new(client: Client, cfg: &Config) -> Result<Self> {
        let api_key = cfg.require(&cfg.anthropic_api_key, "anthropic_api_key")?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: cfg.llm.model,
            max_tokens: cfg.llm.max_tokens,
            temperature: cfg.llm.temperature,
        })
    }
}

fn parse_message(model: LlmModel, raw: &str) -> Option<LlmResponse> {
    let root: serde_json::Value = serde_json::from_str(raw).ok()?;
    if let Some(err) = root.get("error") {
        let msg = err.get("message").and_then(|v| v.as_str()).unwrap_or("?");
        logw(format!("Anthropic error: {}", msg));
        return None;
    }

    let text = root
        .get("content")?
        .as_array()?
        .iter()
        .find(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))?
        .get("text")?
        .as_str()?
        .to_string();

    let usage = root.get("usage");
    let input = usage
        .and_then(|u| u.get("input_tokens"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let output = usage
        .and_then(|u| u.get("output_tokens"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0);

    Some(LlmResponse {
        text,
        usage: input + output,
        cost: model.cost(input, output),
    })
}

#[async_trait]
impl TextGenerator for AnthropicChat {
    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<Option<LlmResponse>> {
        let mut body = json!({
            "model": self.model.api_name(),
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(system) = system_prompt {
            body["system"] = json!(system);
        }

        let resp = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .timeout(std::time::Duration::from_secs(600))
            .send()
            .await
            .context("Anthropic request failed")?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            logw(format!("Anthropic HTTP {}", status.as_u16()));
            if !raw.is_empty() {
                let snippet = raw.chars().take(800).collect::<String>();
                logw(format!("Anthropic raw body: {}", snippet));
            }
            return Ok(None);
        }

        Ok(parse_message(self.model, &raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_text_block() {
        let raw = r#"{"content":[{"type":"text","text":"<result>[]</result>"}],
                      "usage":{"input_tokens":10,"output_tokens":20}}"#;
        let r = parse_message(LlmModel::Claude35Sonnet, raw).unwrap();
        assert_eq!(r.text, "<result>[]</result>");
        assert_eq!(r.usage, 30);
        assert!((r.cost - (10.0 * 3e-6 + 20.0 * 15e-6)).abs() < 1e-12);
    }
}
