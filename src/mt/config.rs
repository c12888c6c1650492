//! Engine configuration
//!
//! Loaded from a TOML file; every tunable has a default so a file only needs
//! to list its backends:
//!
//! ```toml
//! source_lang = "zh"
//! target_lang = "en"
//!
//! [[backends]]
//! name = "gemini"
//! kind = "chat"
//! endpoint = "https://generativelanguage.googleapis.com/v1beta/openai"
//! model = "gemini-2.0-flash"
//! api_key_env = "GEMINI_API_KEY"
//! priority = 0
//!
//! [last_resort]
//! name = "google"
//! kind = "google-public"
//! ```
//!
//! API keys are never read from the file, only from the environment
//! variable named by `api_key_env`.

use crate::mt::batch::{BatchOrchestrator, BatchSettings};
use crate::mt::chat_completions::ChatCompletionsProvider;
use crate::mt::error::{MtError, MtResult};
use crate::mt::fallback::{FallbackChain, RetryPolicy};
use crate::mt::google_translate::GoogleTranslateProvider;
use crate::mt::instructions::TranslationInstructions;
use crate::mt::mock::{MockMode, MockTranslator};
use crate::mt::translator::{Backend, MachineTranslator};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_CHAT_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_CHAT_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_GOOGLE_KEY_ENV: &str = "GOOGLE_TRANSLATE_API_KEY";

/// Kind of service behind a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// OpenAI-compatible chat completions
    Chat,
    /// Keyless public Google Translate endpoint
    GooglePublic,
    /// Google Cloud Translation v2 with an API key
    GoogleV2,
    /// Deterministic offline translator
    Mock,
}

/// One `[[backends]]` or `[last_resort]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    pub kind: BackendKind,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Lower values are tried first
    #[serde(default)]
    pub priority: u32,
}

impl BackendConfig {
    /// Instantiate the translator this table describes
    pub fn build(&self) -> MtResult<Backend> {
        let translator: Arc<dyn MachineTranslator> = match self.kind {
            BackendKind::Chat => {
                let model = self.model.as_deref().ok_or_else(|| {
                    MtError::ConfigError(format!("Backend '{}' needs a model", self.name))
                })?;
                let endpoint = self.endpoint.as_deref().unwrap_or(DEFAULT_CHAT_ENDPOINT);
                let var = self.api_key_env.as_deref().unwrap_or(DEFAULT_CHAT_KEY_ENV);
                Arc::new(ChatCompletionsProvider::from_env_var(endpoint, model, var)?)
            }
            BackendKind::GooglePublic => {
                let provider = GoogleTranslateProvider::public()?;
                match &self.endpoint {
                    Some(url) => Arc::new(provider.with_base_url(url.clone())),
                    None => Arc::new(provider),
                }
            }
            BackendKind::GoogleV2 => {
                let var = self.api_key_env.as_deref().unwrap_or(DEFAULT_GOOGLE_KEY_ENV);
                let provider = GoogleTranslateProvider::from_env_var(var)?;
                match &self.endpoint {
                    Some(url) => Arc::new(provider.with_base_url(url.clone())),
                    None => Arc::new(provider),
                }
            }
            BackendKind::Mock => Arc::new(MockTranslator::new(MockMode::Suffix).named(&self.name)),
        };
        Ok(Backend::new(self.name.clone(), self.priority, translator))
    }

    fn mock(name: &str, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            kind: BackendKind::Mock,
            model: None,
            endpoint: None,
            api_key_env: None,
            priority,
        }
    }
}

/// Whole engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub source_lang: String,
    pub target_lang: String,
    pub concurrency_limit: usize,
    pub concurrent: bool,
    pub stagger_ms: u64,
    pub call_timeout_secs: u64,
    pub same_backend_retries: usize,
    pub batch_size_ceiling: usize,
    pub batch_size_floor: usize,
    /// Chunk size for ranked backends
    pub model_chunk_chars: usize,
    /// Chunk size for the last-resort backend
    pub max_chunk_chars: usize,
    pub last_resort_max_attempts: usize,
    pub backoff_base_ms: u64,
    /// Replaces the built-in translation rules
    pub system_prompt: Option<String>,
    pub backends: Vec<BackendConfig>,
    pub last_resort: Option<BackendConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            source_lang: "zh".to_string(),
            target_lang: "en".to_string(),
            concurrency_limit: 3,
            concurrent: true,
            stagger_ms: 300,
            call_timeout_secs: 60,
            same_backend_retries: 1,
            batch_size_ceiling: 20,
            batch_size_floor: 1,
            model_chunk_chars: 4000,
            max_chunk_chars: 1500,
            last_resort_max_attempts: 3,
            backoff_base_ms: 1000,
            system_prompt: None,
            backends: Vec::new(),
            last_resort: None,
        }
    }
}

impl EngineConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> MtResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MtError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> MtResult<Self> {
        toml::from_str(content).map_err(|e| MtError::ConfigError(e.to_string()))
    }

    /// Replace the backends with offline mocks
    pub fn with_mock_backends(mut self) -> Self {
        self.backends = vec![BackendConfig::mock("mock-primary", 0)];
        self.last_resort = Some(BackendConfig::mock("mock-last-resort", u32::MAX));
        self
    }

    /// Check sizes, counts and languages
    pub fn validate(&self) -> MtResult<()> {
        if self.backends.is_empty() {
            return Err(MtError::ConfigError(
                "At least one [[backends]] entry is required".to_string(),
            ));
        }
        let sizes = [
            ("concurrency_limit", self.concurrency_limit),
            ("batch_size_ceiling", self.batch_size_ceiling),
            ("batch_size_floor", self.batch_size_floor),
            ("model_chunk_chars", self.model_chunk_chars),
            ("max_chunk_chars", self.max_chunk_chars),
            ("last_resort_max_attempts", self.last_resort_max_attempts),
        ];
        if let Some((field, _)) = sizes.iter().find(|(_, value)| *value == 0) {
            return Err(MtError::ConfigError(format!("{} must be positive", field)));
        }
        if self.batch_size_floor > self.batch_size_ceiling {
            return Err(MtError::ConfigError(format!(
                "batch_size_floor ({}) exceeds batch_size_ceiling ({})",
                self.batch_size_floor, self.batch_size_ceiling
            )));
        }
        if self.call_timeout_secs == 0 {
            return Err(MtError::ConfigError("call_timeout_secs must be positive".to_string()));
        }
        let mut names: Vec<&str> = self.backends.iter().map(|b| b.name.as_str()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(MtError::ConfigError(format!("Duplicate backend name '{}'", pair[0])));
        }
        self.instructions().map(|_| ())
    }

    pub fn instructions(&self) -> MtResult<TranslationInstructions> {
        let instructions = TranslationInstructions::new(&self.source_lang, &self.target_lang)?;
        Ok(match &self.system_prompt {
            Some(prompt) => instructions.with_system_prompt(prompt.clone()),
            None => instructions,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            same_backend_retries: self.same_backend_retries,
            last_resort_max_attempts: self.last_resort_max_attempts,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            model_chunk_chars: self.model_chunk_chars,
            last_resort_chunk_chars: self.max_chunk_chars,
        }
    }

    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            batch_size_ceiling: self.batch_size_ceiling,
            batch_size_floor: self.batch_size_floor,
            concurrent: self.concurrent,
            stagger: Duration::from_millis(self.stagger_ms),
            concurrency_limit: self.concurrency_limit,
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }

    pub fn build_chain(&self) -> MtResult<FallbackChain> {
        let backends = self
            .backends
            .iter()
            .map(BackendConfig::build)
            .collect::<MtResult<Vec<_>>>()?;
        let last_resort = self.last_resort.as_ref().map(BackendConfig::build).transpose()?;
        FallbackChain::new(backends, last_resort, self.retry_policy())
    }

    /// Validate and assemble a ready-to-run orchestrator
    pub fn build_orchestrator(&self) -> MtResult<BatchOrchestrator> {
        self.validate()?;
        Ok(BatchOrchestrator::new(
            self.build_chain()?,
            self.batch_settings(),
            self.instructions()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
source_lang = "zh"
target_lang = "en"
concurrency_limit = 5
stagger_ms = 0

[[backends]]
name = "fast"
kind = "mock"
priority = 1

[[backends]]
name = "best"
kind = "mock"
priority = 0

[last_resort]
name = "google"
kind = "google-public"
"#;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.concurrency_limit, 3);
        assert_eq!(config.batch_size_ceiling, 20);
        assert_eq!(config.max_chunk_chars, 1500);
        assert_eq!(config.last_resort_max_attempts, 3);
        assert!(config.concurrent);
    }

    #[test]
    fn test_parse_sample() {
        let config = EngineConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.concurrency_limit, 5);
        assert_eq!(config.stagger_ms, 0);
        // untouched fields keep their defaults
        assert_eq!(config.call_timeout_secs, 60);
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].kind, BackendKind::Mock);
        assert_eq!(
            config.last_resort.as_ref().map(|b| b.kind),
            Some(BackendKind::GooglePublic)
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_build_chain_orders_by_priority() {
        let config = EngineConfig::from_toml_str(SAMPLE).unwrap();
        let chain = config.build_chain().unwrap();
        let names: Vec<_> = chain.backends().iter().map(|b| b.name()).collect();
        assert_eq!(names, vec!["best", "fast"]);
        assert_eq!(chain.last_resort().map(|b| b.name()), Some("google"));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let toml = "[[backends]]\nname = \"x\"\nkind = \"telepathy\"\n";
        let err = EngineConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, MtError::ConfigError(_)));
    }

    // ========== Validation Tests ==========

    #[test]
    fn test_validate_requires_backends() {
        assert!(EngineConfig::default().validate().is_err());
        assert!(EngineConfig::default().with_mock_backends().validate().is_ok());
    }

    #[test]
    fn test_validate_floor_above_ceiling() {
        let config = EngineConfig {
            batch_size_floor: 8,
            batch_size_ceiling: 4,
            ..EngineConfig::default().with_mock_backends()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_sizes() {
        let config = EngineConfig {
            model_chunk_chars: 0,
            ..EngineConfig::default().with_mock_backends()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("model_chunk_chars"));
    }

    #[test]
    fn test_validate_duplicate_names() {
        let mut config = EngineConfig::default().with_mock_backends();
        config.backends.push(BackendConfig::mock("mock-primary", 3));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_locale() {
        let config = EngineConfig {
            target_lang: "not a locale!".to_string(),
            ..EngineConfig::default().with_mock_backends()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chat_backend_needs_key_variable() {
        let backend = BackendConfig {
            name: "gpt".to_string(),
            kind: BackendKind::Chat,
            model: Some("gpt-4o-mini".to_string()),
            endpoint: None,
            api_key_env: Some("CASCADE_TRANSLATE_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
            priority: 0,
        };
        assert!(matches!(backend.build(), Err(MtError::ConfigError(_))));
    }

    #[test]
    fn test_chat_backend_needs_model() {
        let backend = BackendConfig {
            name: "gpt".to_string(),
            kind: BackendKind::Chat,
            model: None,
            endpoint: None,
            api_key_env: None,
            priority: 0,
        };
        assert!(backend.build().is_err());
    }

    #[test]
    fn test_settings_conversion() {
        let config = EngineConfig {
            stagger_ms: 250,
            backoff_base_ms: 10,
            ..EngineConfig::default()
        };
        assert_eq!(config.batch_settings().stagger, Duration::from_millis(250));
        assert_eq!(config.retry_policy().backoff_base, Duration::from_millis(10));
        assert_eq!(config.retry_policy().last_resort_chunk_chars, 1500);
    }
}
