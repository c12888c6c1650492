//! Google Translate provider for machine translation
//!
//! Two flavours share this provider:
//!
//! - the keyless public endpoint (`translate_a/single`), which is the usual
//!   last resort of a fallback chain, and
//! - the Cloud Translation API v2, authenticated with an API key from the
//!   `GOOGLE_TRANSLATE_API_KEY` environment variable.
//!
//! Neither takes a system prompt; only the language pair of the
//! [`TranslationInstructions`] is used.
//!
//! # Example
//!
//! ```ignore
//! use cascade_translate::mt::{GoogleTranslateProvider, MachineTranslator, TranslationInstructions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = GoogleTranslateProvider::public()?;
//!     let instructions = TranslationInstructions::new("zh", "en")?;
//!     let result = provider.translate("你好，世界", &instructions).await?;
//!     println!("{}", result);
//!     Ok(())
//! }
//! ```

use crate::mt::error::{MtError, MtResult};
use crate::mt::instructions::TranslationInstructions;
use crate::mt::response::classify_http_failure;
use crate::mt::translator::MachineTranslator;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::json;

const PUBLIC_URL: &str = "https://translate.googleapis.com/translate_a/single";
const V2_URL: &str = "https://translation.googleapis.com/language/translate/v2";

#[derive(Clone)]
enum Endpoint {
    /// Keyless public endpoint
    Public,
    /// Cloud Translation v2 with API key
    V2 { api_key: String },
}

/// Google Translate provider
#[derive(Clone)]
pub struct GoogleTranslateProvider {
    endpoint: Endpoint,
    /// HTTP client for async requests
    client: reqwest::Client,
    /// Base URL, overridable for tests and proxies
    base_url: String,
}

impl GoogleTranslateProvider {
    /// Maximum number of texts per v2 API request
    const MAX_BATCH_SIZE: usize = 128;

    /// Maximum characters per string accepted by either endpoint
    pub const MAX_CHARS_PER_STRING: usize = 5_000;

    fn build_client() -> MtResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MtError::ConfigError(format!("Failed to create HTTP client: {}", e)))
    }

    /// Create a provider for the keyless public endpoint
    pub fn public() -> MtResult<Self> {
        Ok(Self {
            endpoint: Endpoint::Public,
            client: Self::build_client()?,
            base_url: PUBLIC_URL.to_string(),
        })
    }

    /// Create a Cloud Translation v2 provider with an explicit API key
    ///
    /// # Returns
    ///
    /// * `Ok(Self)` - New provider instance
    /// * `Err(MtError)` - If API key is empty or HTTP client creation fails
    pub fn new(api_key: String) -> MtResult<Self> {
        if api_key.trim().is_empty() {
            return Err(MtError::ConfigError("API key cannot be empty".to_string()));
        }

        Ok(Self {
            endpoint: Endpoint::V2 { api_key },
            client: Self::build_client()?,
            base_url: V2_URL.to_string(),
        })
    }

    /// Create a v2 provider from the `GOOGLE_TRANSLATE_API_KEY` environment variable
    pub fn from_env() -> MtResult<Self> {
        Self::from_env_var("GOOGLE_TRANSLATE_API_KEY")
    }

    /// Create a v2 provider reading the API key from `var`
    pub fn from_env_var(var: &str) -> MtResult<Self> {
        let api_key = std::env::var(var).map_err(|_| {
            MtError::ConfigError(format!("{} environment variable not set", var))
        })?;

        Self::new(api_key)
    }

    /// Point the provider at a different base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn check_length(text: &str) -> MtResult<()> {
        if text.chars().count() > Self::MAX_CHARS_PER_STRING {
            return Err(MtError::Other(format!(
                "Text exceeds maximum length of {} characters",
                Self::MAX_CHARS_PER_STRING
            )));
        }
        Ok(())
    }

    /// Chunk a batch of texts into API-safe sizes
    fn chunk_batch(texts: &[String]) -> Vec<&[String]> {
        texts.chunks(Self::MAX_BATCH_SIZE).collect()
    }

    async fn check_status(response: reqwest::Response) -> MtResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(classify_http_failure(status, &body))
    }

    /// One call to the public endpoint
    async fn translate_public(&self, text: &str, source: &str, target: &str) -> MtResult<String> {
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ],
        )
        .map_err(|e| MtError::ConfigError(format!("Invalid endpoint URL: {}", e)))?;

        let response = self.client.get(url).send().await?;
        let json: serde_json::Value = Self::check_status(response).await?.json().await?;
        parse_public_reply(&json)
    }

    /// One call to the v2 API for up to `MAX_BATCH_SIZE` texts
    async fn translate_v2_chunk(
        &self,
        api_key: &str,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> MtResult<Vec<String>> {
        let url = format!("{}?key={}", self.base_url, api_key);
        let body = json!({
            "q": texts,
            "source": source,
            "target": target,
            "format": "text"
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let json: serde_json::Value = Self::check_status(response).await?.json().await?;
        parse_v2_reply(&json)
    }
}

/// Extract the translation from a public-endpoint reply
///
/// The reply is a nested array whose first element lists sentence segments,
/// each segment starting with its translated text.
fn parse_public_reply(json: &serde_json::Value) -> MtResult<String> {
    let segments = json
        .get(0)
        .and_then(|s| s.as_array())
        .ok_or_else(|| MtError::MalformedResponse("Missing segment array".to_string()))?;

    let text: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        return Err(MtError::MalformedResponse(
            "No translated segments in reply".to_string(),
        ));
    }
    Ok(text)
}

/// Extract translations from a v2 API reply
fn parse_v2_reply(json: &serde_json::Value) -> MtResult<Vec<String>> {
    let translations = json["data"]["translations"].as_array().ok_or_else(|| {
        MtError::MalformedResponse(
            "Invalid API response: missing 'data.translations' array".to_string(),
        )
    })?;

    translations
        .iter()
        .map(|t| {
            t["translatedText"]
                .as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    MtError::MalformedResponse(
                        "Invalid API response: missing 'translatedText' field".to_string(),
                    )
                })
        })
        .collect()
}

impl std::fmt::Debug for GoogleTranslateProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let endpoint = match &self.endpoint {
            Endpoint::Public => "public",
            Endpoint::V2 { .. } => "v2",
        };
        f.debug_struct("GoogleTranslateProvider")
            .field("endpoint", &endpoint)
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl MachineTranslator for GoogleTranslateProvider {
    async fn translate(
        &self,
        text: &str,
        instructions: &TranslationInstructions,
    ) -> MtResult<String> {
        if text.is_empty() {
            return Ok(String::new());
        }
        Self::check_length(text)?;
        let (source, target) = instructions.language_pair();

        match &self.endpoint {
            Endpoint::Public => self.translate_public(text, &source, &target).await,
            Endpoint::V2 { api_key } => {
                let results = self
                    .translate_v2_chunk(api_key, &[text.to_string()], &source, &target)
                    .await?;
                results.into_iter().next().ok_or_else(|| {
                    MtError::MalformedResponse("Empty translations array".to_string())
                })
            }
        }
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        instructions: &TranslationInstructions,
    ) -> MtResult<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for text in texts {
            Self::check_length(text)?;
        }
        let (source, target) = instructions.language_pair();

        match &self.endpoint {
            Endpoint::Public => {
                // One request; lines come back in order, one per input
                let joined = texts.join("\n");
                Self::check_length(&joined)?;
                let translated = self.translate_public(&joined, &source, &target).await?;
                Ok(translated.lines().map(|l| l.trim().to_string()).collect())
            }
            Endpoint::V2 { api_key } => {
                let mut all_results = Vec::with_capacity(texts.len());
                for chunk in Self::chunk_batch(texts) {
                    let chunk_results = self
                        .translate_v2_chunk(api_key, chunk, &source, &target)
                        .await?;
                    all_results.extend(chunk_results);
                }
                Ok(all_results)
            }
        }
    }

    fn provider_name(&self) -> &str {
        match self.endpoint {
            Endpoint::Public => "Google Translate (public)",
            Endpoint::V2 { .. } => "Google Translate",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mt::error::ErrorClass;

    fn en() -> TranslationInstructions {
        TranslationInstructions::new("zh-CN", "en").unwrap()
    }

    // ========== Initialization Tests ==========

    #[test]
    fn test_new_with_valid_key() {
        let provider = GoogleTranslateProvider::new("test-api-key".to_string()).unwrap();
        assert_eq!(provider.provider_name(), "Google Translate");
    }

    #[test]
    fn test_new_with_empty_key() {
        match GoogleTranslateProvider::new("   ".to_string()) {
            Err(MtError::ConfigError(msg)) => assert!(msg.contains("empty")),
            _ => panic!("Expected ConfigError"),
        }
    }

    #[test]
    fn test_from_env_var_without_key() {
        match GoogleTranslateProvider::from_env_var("CASCADE_TEST_UNSET_GOOGLE_KEY") {
            Err(MtError::ConfigError(msg)) => assert!(msg.contains("not set")),
            _ => panic!("Expected ConfigError"),
        }
    }

    #[test]
    fn test_public_provider_name() {
        let provider = GoogleTranslateProvider::public().unwrap();
        assert_eq!(provider.provider_name(), "Google Translate (public)");
    }

    // ========== Chunking Tests ==========

    #[test]
    fn test_chunk_over_limit() {
        let texts = (0..200).map(|i| format!("text{}", i)).collect::<Vec<_>>();
        let chunks = GoogleTranslateProvider::chunk_batch(&texts);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 128);
        assert_eq!(chunks[1].len(), 72);
    }

    // ========== Reply Parsing Tests ==========

    #[test]
    fn test_parse_public_reply_joins_segments() {
        let json = serde_json::json!([
            [["Hello, ", "你好，", null, null], ["world.", "世界。", null, null]],
            null,
            "zh-CN"
        ]);
        assert_eq!(parse_public_reply(&json).unwrap(), "Hello, world.");
    }

    #[test]
    fn test_parse_public_reply_malformed() {
        let err = parse_public_reply(&serde_json::json!({"error": "nope"})).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Malformed);
    }

    #[test]
    fn test_parse_v2_reply() {
        let json = serde_json::json!({
            "data": {"translations": [{"translatedText": "Hello"}, {"translatedText": "Bye"}]}
        });
        assert_eq!(parse_v2_reply(&json).unwrap(), vec!["Hello", "Bye"]);
    }

    #[test]
    fn test_parse_v2_reply_missing_field() {
        let json = serde_json::json!({"data": {"translations": [{"text": "x"}]}});
        assert!(parse_v2_reply(&json).is_err());
    }

    // ========== Validation Tests ==========

    #[tokio::test]
    async fn test_translate_empty_text() {
        let provider = GoogleTranslateProvider::public().unwrap();
        assert_eq!(provider.translate("", &en()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_translate_text_too_long() {
        let provider = GoogleTranslateProvider::public().unwrap();
        let long_text = "x".repeat(GoogleTranslateProvider::MAX_CHARS_PER_STRING + 1);
        match provider.translate(&long_text, &en()).await {
            Err(MtError::Other(msg)) => assert!(msg.contains("exceeds maximum")),
            other => panic!("Expected length error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_failure() {
        let provider = GoogleTranslateProvider::public()
            .unwrap()
            .with_base_url("http://127.0.0.1:9/translate_a/single");
        let err = provider.translate("你好", &en()).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Network);
    }

    #[test]
    fn test_debug_output() {
        let provider = GoogleTranslateProvider::new("test-key".to_string()).unwrap();
        let debug_str = format!("{:?}", provider);
        assert!(debug_str.contains("***"));
        assert!(!debug_str.contains("test-key"));
    }

    // ========== Integration Tests (require network) ==========

    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_real_public_translation() {
        let provider = GoogleTranslateProvider::public().unwrap();
        let result = provider.translate("你好。", &en()).await.unwrap();
        println!("Translation: 你好。 → {}", result);
        assert!(!result.is_empty());
    }

    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_real_api_batch_translation() {
        if std::env::var("GOOGLE_TRANSLATE_API_KEY").is_err() {
            eprintln!("Skipping: GOOGLE_TRANSLATE_API_KEY not set");
            return;
        }

        let provider = GoogleTranslateProvider::from_env().unwrap();
        let texts = vec!["你好".to_string(), "再见".to_string()];
        let results = provider.translate_batch(&texts, &en()).await.unwrap();
        assert_eq!(results.len(), 2);
    }
}
