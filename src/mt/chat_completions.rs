//! OpenAI-compatible chat completion provider
//!
//! Any service exposing `POST {endpoint}/chat/completions` (OpenAI, Gemini's
//! OpenAI-compatible surface, DeepSeek, a local vLLM, ...) can be used as a
//! ranked AI backend. The system message carries the fidelity rules from
//! [`TranslationInstructions`]; the user message carries the text.

use crate::mt::error::{MtError, MtResult};
use crate::mt::instructions::TranslationInstructions;
use crate::mt::response::{classify_http_failure, clean_text_reply, parse_string_array};
use crate::mt::translator::MachineTranslator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ReplyMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Chat-model backend speaking the chat completions protocol
#[derive(Clone)]
pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
}

impl ChatCompletionsProvider {
    /// Create a provider for `model` at `endpoint` (the part before `/chat/completions`)
    pub fn new(endpoint: &str, model: &str, api_key: String) -> MtResult<Self> {
        if model.trim().is_empty() {
            return Err(MtError::ConfigError("Model name cannot be empty".to_string()));
        }
        if api_key.trim().is_empty() {
            return Err(MtError::ConfigError("API key cannot be empty".to_string()));
        }

        // The guard timeout at the call boundary is authoritative; this only
        // stops sockets from hanging forever.
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| MtError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            temperature: 0.3,
        })
    }

    /// Create a provider reading the API key from the environment variable `var`
    pub fn from_env_var(endpoint: &str, model: &str, var: &str) -> MtResult<Self> {
        let api_key = std::env::var(var).map_err(|_| {
            MtError::ConfigError(format!("{} environment variable not set", var))
        })?;
        Self::new(endpoint, model, api_key)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> MtResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(status, &body));
        }

        let body = response.text().await?;
        extract_content(&body)
    }
}

/// Pull the assistant text out of a chat completion body
fn extract_content(body: &str) -> MtResult<String> {
    let parsed: ChatResponse = serde_json::from_str(body)?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| MtError::MalformedResponse("Reply has no choices".to_string()))?;

    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(MtError::ContentPolicyRejected(
            "Completion stopped by content filter".to_string(),
        ));
    }

    let content = choice
        .message
        .and_then(|m| m.content)
        .ok_or_else(|| MtError::MalformedResponse("Reply has no message content".to_string()))?;
    clean_text_reply(&content)
}

impl std::fmt::Debug for ChatCompletionsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"***")
            .finish()
    }
}

#[async_trait]
impl MachineTranslator for ChatCompletionsProvider {
    async fn translate(
        &self,
        text: &str,
        instructions: &TranslationInstructions,
    ) -> MtResult<String> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }
        self.complete(&instructions.system_prompt, text).await
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        instructions: &TranslationInstructions,
    ) -> MtResult<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let reply = self
            .complete(&instructions.system_prompt, &instructions.batch_prompt(texts))
            .await?;
        parse_string_array(&reply)
    }

    fn provider_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mt::error::ErrorClass;

    #[test]
    fn test_new_rejects_empty_key() {
        assert!(ChatCompletionsProvider::new("https://api.example.com/v1", "m", " ".into()).is_err());
        assert!(ChatCompletionsProvider::new("https://api.example.com/v1", "", "k".into()).is_err());
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let provider =
            ChatCompletionsProvider::new("https://api.example.com/v1/", "gpt-4o-mini", "k".into())
                .unwrap();
        assert_eq!(provider.endpoint, "https://api.example.com/v1");
        assert_eq!(provider.provider_name(), "gpt-4o-mini");
    }

    #[test]
    fn test_debug_masks_key() {
        let provider =
            ChatCompletionsProvider::new("https://api.example.com/v1", "m", "sk-secret".into())
                .unwrap();
        let debug = format!("{:?}", provider);
        assert!(debug.contains("***"));
        assert!(!debug.contains("sk-secret"));
    }

    // ========== Reply Extraction Tests ==========

    #[test]
    fn test_extract_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":" Hello, world. "},"finish_reason":"stop"}]}"#;
        assert_eq!(extract_content(body).unwrap(), "Hello, world.");
    }

    #[test]
    fn test_extract_content_filter() {
        let body = r#"{"choices":[{"message":{"content":null},"finish_reason":"content_filter"}]}"#;
        assert_eq!(
            extract_content(body).unwrap_err().class(),
            ErrorClass::ContentPolicy
        );
    }

    #[test]
    fn test_extract_no_choices() {
        assert_eq!(
            extract_content(r#"{"choices":[]}"#).unwrap_err().class(),
            ErrorClass::Malformed
        );
        assert_eq!(
            extract_content("<html>bad gateway</html>").unwrap_err().class(),
            ErrorClass::Malformed
        );
    }

    #[tokio::test]
    async fn test_blank_text_skips_call() {
        let provider =
            ChatCompletionsProvider::new("http://127.0.0.1:9", "m", "k".into()).unwrap();
        let instructions = TranslationInstructions::new("zh", "en").unwrap();
        assert_eq!(provider.translate("  ", &instructions).await.unwrap(), "  ");
    }

    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_real_api_translation() {
        if std::env::var("OPENAI_API_KEY").is_err() {
            eprintln!("Skipping: OPENAI_API_KEY not set");
            return;
        }
        let provider = ChatCompletionsProvider::from_env_var(
            "https://api.openai.com/v1",
            "gpt-4o-mini",
            "OPENAI_API_KEY",
        )
        .unwrap();
        let instructions = TranslationInstructions::new("zh", "en").unwrap();
        let result = provider.translate("你好。世界！", &instructions).await.unwrap();
        println!("Translation: {}", result);
        assert!(!result.is_empty());
    }
}
