//! Gemini LLM Provider
//!
//! `LlmProvider` over the Generative Language REST API (`generateContent`).
//! The API key comes from configuration only.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        Completion, FinishReason, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo,
        TokenUsage,
    },
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-lite";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider configuration
#[derive(Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// API root, without the `/models` suffix
    pub base_url: String,
    /// Per-request HTTP timeout
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.into(),
            base_url: DEFAULT_GEMINI_BASE_URL.into(),
            timeout: Duration::from_secs(60),
        }
    }
}

// Keep the key out of logs.
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Gemini LLM provider
pub struct GeminiProvider {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Fails when the API key is blank
    pub fn from_config(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AgentError::Config("GEMINI_API_KEY is not set".into()));
        }
        
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::Config(format!("HTTP client: {}", e)))?;
        
        Ok(Self { client, config })
    }
    
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }
    
    fn model_for<'a>(&'a self, options: &'a GenerationOptions) -> &'a str {
        // The shared default names an Ollama model; only honor Gemini names.
        if options.model.starts_with("gemini") {
            &options.model
        } else {
            &self.config.model
        }
    }
    
    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }
    
    /// Build the `generateContent` body.
    ///
    /// System messages become `system_instruction`; tool output is fed back
    /// as user content, the same way the Ollama provider does.
    fn build_payload(messages: &[Message], options: &GenerationOptions) -> Value {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        
        let contents: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();
        
        let mut generation = json!({
            "temperature": options.temperature,
            "topP": options.top_p,
            "maxOutputTokens": options.max_tokens,
        });
        if !options.stop_sequences.is_empty() {
            generation["stopSequences"] = json!(options.stop_sequences);
        }
        
        let mut payload = json!({
            "contents": contents,
            "generationConfig": generation,
        });
        if !system.is_empty() {
            payload["system_instruction"] = json!({"parts": [{"text": system.join("\n\n")}]});
        }
        
        payload
    }
    
    fn convert_response(response: GenerateResponse, model: &str) -> Result<Completion> {
        let candidate = response
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Provider("Gemini returned no candidates".into()))?;
        
        let content: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        
        let finish_reason = candidate.finish_reason.as_deref().map(|reason| match reason {
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::Length,
            "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => FinishReason::ContentFilter,
            _ => FinishReason::Error,
        });
        
        Ok(Completion {
            content,
            model: model.to_string(),
            usage: response.usage_metadata.map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
            truncated: finish_reason == Some(FinishReason::Length),
            finish_reason,
        })
    }
    
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        
        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AgentError::Auth(format!("Gemini rejected the API key ({})", status))
            }
            StatusCode::SERVICE_UNAVAILABLE => AgentError::ProviderUnavailable(format!("Gemini {}: {}", status, body)),
            _ => AgentError::Provider(format!("Gemini {}: {}", status, body)),
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        let models = self.list_models().await.unwrap_or_default();
        
        Ok(ProviderInfo {
            name: "Gemini".into(),
            version: Some("v1beta".into()),
            models,
            supports_tools: false,
        })
    }
    
    async fn health_check(&self) -> Result<bool> {
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Gemini health check failed: {}", e);
                Ok(false)
            }
        }
    }
    
    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let model = self.model_for(options);
        let url = format!("{}/models/{}:generateContent", self.base(), model);
        let payload = Self::build_payload(messages, options);
        
        tracing::debug!(model = %model, messages = messages.len(), "Sending request to Gemini");
        
        let response = self.client
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;
        
        let response: GenerateResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("invalid Gemini response: {}", e)))?;
        
        Self::convert_response(response, model)
    }
    
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self.client
            .get(format!("{}/models", self.base()))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;
        
        let listing: ModelList = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("invalid Gemini model list: {}", e)))?;
        
        Ok(listing
            .models
            .into_iter()
            .map(|m| {
                let id = m.name.trim_start_matches("models/").to_string();
                ModelInfo {
                    name: m.display_name.unwrap_or_else(|| id.clone()),
                    id,
                    context_length: m.input_token_limit,
                }
            })
            .collect())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEntry {
    name: String,
    display_name: Option<String>,
    input_token_limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_key_is_rejected() {
        let err = GeminiProvider::from_config(GeminiConfig::new("  ")).err().unwrap();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[test]
    fn debug_hides_key() {
        let rendered = format!("{:?}", GeminiConfig::new("secret-key"));
        assert!(!rendered.contains("secret-key"));
    }

    #[test]
    fn payload_splits_system_and_maps_roles() {
        let messages = vec![
            Message::system("You are a travel assistant."),
            Message::user("Weather in Paris?"),
            Message::assistant("```tool\n{\"tool\": \"get_weather\"}\n```"),
            Message::tool("[Tool 'get_weather' returned]\nsunny", None),
        ];
        
        let payload = GeminiProvider::build_payload(&messages, &GenerationOptions::default());
        
        assert_eq!(payload["system_instruction"]["parts"][0]["text"], "You are a travel assistant.");
        let roles: Vec<_> = payload["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(payload["generationConfig"]["temperature"], 0.0);
        assert!(payload["generationConfig"].get("stopSequences").is_none());
    }

    #[test]
    fn response_text_and_usage() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Paris is "}, {"text": "sunny."}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 4, "totalTokenCount": 16}
        }))
        .unwrap();
        
        let completion = GeminiProvider::convert_response(response, DEFAULT_GEMINI_MODEL).unwrap();
        assert_eq!(completion.content, "Paris is sunny.");
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
        assert_eq!(completion.usage.unwrap().total_tokens, 16);
    }

    #[test]
    fn response_without_candidates_is_an_error() {
        let response: GenerateResponse = serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(GeminiProvider::convert_response(response, DEFAULT_GEMINI_MODEL).is_err());
    }

    #[test]
    fn only_gemini_model_names_override_config() {
        let provider = GeminiProvider::from_config(GeminiConfig::new("key")).unwrap();
        assert_eq!(provider.model_for(&GenerationOptions::default()), DEFAULT_GEMINI_MODEL);
        
        let options = GenerationOptions { model: "gemini-2.0-flash".into(), ..Default::default() };
        assert_eq!(provider.model_for(&options), "gemini-2.0-flash");
    }
}
