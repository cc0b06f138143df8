//! Google Gemini model client
//!
//! Sends the whole dialogue on every call through the stateless
//! `generateContent` endpoint, so the session's history is the only source
//! of conversational context.

use crate::llm::client::{ModelClient, ModelError};
use crate::llm::config::ModelConfig;
use crate::messages::{Speaker, Utterance, UtteranceKind};
use crate::{AmicaError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

/// Header carrying the API key; it never goes into the URL
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Blocking Gemini client backed by a private tokio runtime
pub struct GeminiClient {
    runtime: Runtime,
    client: Client,
    endpoint: String,
    api_key: String,
    model_id: String,
    system_prompt: String,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

impl GeminiClient {
    pub fn new(config: &ModelConfig, api_key: impl Into<String>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("amica-gemini")
            .enable_all()
            .build()
            .map_err(|e| AmicaError::ClientError(format!("Failed to create runtime: {}", e)))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AmicaError::ClientError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            runtime,
            client,
            endpoint: config.endpoint(),
            api_key: api_key.into(),
            model_id: config.model_id.clone(),
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    /// Create a client, reading the API key from the environment
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        Self::new(config, api_key)
    }

    fn build_request(&self, history: &[Utterance], new_text: &str) -> GeminiRequest {
        let mut contents: Vec<GeminiContent> = history
            .iter()
            .filter(|u| u.kind == UtteranceKind::Message)
            .map(|u| GeminiContent::text(role_for(u.speaker), &u.text))
            .collect();
        contents.push(GeminiContent::text("user", new_text));

        let system_instruction = if self.system_prompt.trim().is_empty() {
            None
        } else {
            Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: Some(self.system_prompt.clone()),
                }],
            })
        };

        let generation_config = if self.temperature.is_some() || self.max_output_tokens.is_some() {
            Some(GeminiGenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            })
        } else {
            None
        };

        GeminiRequest {
            contents,
            system_instruction,
            generation_config,
        }
    }

    async fn send_async(&self, request: &GeminiRequest) -> std::result::Result<String, ModelError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                // Error text ends up in the transcript; keep the URL out of it
                let e = e.without_url();
                if e.is_timeout() {
                    ModelError::Request(format!("request timeout: {}", e))
                } else if e.is_connect() {
                    ModelError::Request(format!("connection failed: {}", e))
                } else {
                    ModelError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| {
                ModelError::Request(format!("failed to read response: {}", e.without_url()))
            })?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        let parsed: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        extract_reply(parsed)
    }
}

impl ModelClient for GeminiClient {
    fn send(&self, history: &[Utterance], new_text: &str) -> std::result::Result<String, ModelError> {
        let request = self.build_request(history, new_text);
        debug!(
            model = %self.model_id,
            turns = request.contents.len(),
            "sending generateContent request"
        );
        let result = self.runtime.block_on(self.send_async(&request));
        if let Err(e) = &result {
            warn!(model = %self.model_id, "generateContent failed: {}", e);
        }
        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

fn role_for(speaker: Speaker) -> &'static str {
    match speaker {
        Speaker::User => "user",
        Speaker::Assistant => "model",
    }
}

fn api_error(status: u16, body: &str) -> ModelError {
    let message = serde_json::from_str::<GeminiErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    ModelError::Api { status, message }
}

fn extract_reply(response: GeminiResponse) -> std::result::Result<String, ModelError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return match response.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => Err(ModelError::Blocked(reason)),
            None => Err(ModelError::EmptyReply),
        };
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_default();
        if matches!(reason.as_str(), "SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST") {
            return Err(ModelError::Blocked(reason));
        }
        return Err(ModelError::EmptyReply);
    }

    Ok(text)
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![GeminiPart {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> GeminiClient {
        GeminiClient::new(&ModelConfig::default(), "test-key").unwrap()
    }

    fn parse(value: serde_json::Value) -> GeminiResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_request_carries_history_in_order() {
        let history = vec![
            Utterance::user("I can't sleep"),
            Utterance::assistant("That sounds exhausting."),
        ];
        let request = client().build_request(&history, "It's been a week");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value["contents"],
            json!([
                {"role": "user", "parts": [{"text": "I can't sleep"}]},
                {"role": "model", "parts": [{"text": "That sounds exhausting."}]},
                {"role": "user", "parts": [{"text": "It's been a week"}]},
            ])
        );
        assert!(value["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Amica"));
        assert!(value.get("generationConfig").is_none());
    }

    #[test]
    fn test_request_skips_display_only_lines() {
        let history = vec![Utterance::status("Listening..."), Utterance::user("hi")];
        let request = client().build_request(&history, "there");
        assert_eq!(request.contents.len(), 2);
    }

    #[test]
    fn test_generation_config_serialized_when_set() {
        let config = ModelConfig::default().with_temperature(0.4);
        let client = GeminiClient::new(&config, "k").unwrap();
        let value = serde_json::to_value(client.build_request(&[], "x")).unwrap();
        assert!(value["generationConfig"]["temperature"].is_number());
        assert!(value["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn test_extract_reply_joins_parts() {
        let response = parse(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "That's "}, {"text": "understandable."}]},
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(extract_reply(response).unwrap(), "That's understandable.");
    }

    #[test]
    fn test_extract_reply_empty() {
        let response = parse(json!({
            "candidates": [{"content": {"parts": [{"text": "  "}]}, "finishReason": "STOP"}]
        }));
        assert_eq!(extract_reply(response), Err(ModelError::EmptyReply));
        assert_eq!(extract_reply(parse(json!({}))), Err(ModelError::EmptyReply));
    }

    #[test]
    fn test_extract_reply_blocked() {
        let response = parse(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        assert_eq!(
            extract_reply(response),
            Err(ModelError::Blocked("SAFETY".to_string()))
        );

        let response = parse(json!({"candidates": [{"finishReason": "SAFETY"}]}));
        assert_eq!(
            extract_reply(response),
            Err(ModelError::Blocked("SAFETY".to_string()))
        );
    }

    #[test]
    fn test_transport_error_hides_api_key() {
        let config = ModelConfig::default()
            .with_base_url("http://127.0.0.1:9")
            .with_timeout_secs(5);
        let client = GeminiClient::new(&config, "SECRET-KEY-123").unwrap();

        let err = client.send(&[], "hello").unwrap_err();
        assert!(matches!(err, ModelError::Request(_)));
        let message = err.to_string();
        assert!(!message.contains("SECRET-KEY-123"), "{}", message);
        assert!(!message.contains("127.0.0.1"), "{}", message);
    }

    #[test]
    fn test_system_instruction_uses_configured_helpline() {
        let config = crate::integration::AmicaConfig::default().with_safety(
            crate::safety::SafetyConfig::default().with_helpline_message("Please call 988."),
        );
        let client = GeminiClient::new(&config.model_config(), "k").unwrap();
        let value = serde_json::to_value(client.build_request(&[], "hi")).unwrap();

        let instruction = value["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
        assert!(instruction.contains("\"Please call 988.\""));
        assert!(!instruction.contains("9152987821"));
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(
            api_error(400, body),
            ModelError::Api {
                status: 400,
                message: "API key not valid".to_string()
            }
        );
        assert_eq!(
            api_error(502, "bad gateway\n"),
            ModelError::Api {
                status: 502,
                message: "bad gateway".to_string()
            }
        );
    }
}
