//! Machine Translation trait and backend descriptors
//!
//! This module defines the `MachineTranslator` trait for provider abstraction,
//! enabling support for different MT backends (chat models, Google Translate,
//! mock) without coupling the engine to any specific implementation, and the
//! [`Backend`] descriptor that ranks a provider inside a fallback chain.
//!
//! # Example
//!
//! ```ignore
//! use cascade_translate::mt::{Backend, GoogleTranslateProvider, TranslationInstructions};
//! use std::sync::Arc;
//!
//! let provider = GoogleTranslateProvider::public()?;
//! let backend = Backend::new("google-public", 99, Arc::new(provider));
//! let instructions = TranslationInstructions::new("zh", "en")?;
//! let text = backend.translator().translate("你好", &instructions).await?;
//! ```

use crate::mt::error::{ErrorClass, MtError, MtResult};
use crate::mt::instructions::TranslationInstructions;
use async_trait::async_trait;
use std::sync::Arc;

/// Generic trait for machine translation providers
///
/// Implementations perform exactly one remote (or simulated) call per method
/// invocation and never retry internally. Failures are reported as [`MtError`]
/// variants so the fallback chain can classify them.
#[async_trait]
pub trait MachineTranslator: Send + Sync {
    /// Translate a single text
    ///
    /// # Arguments
    ///
    /// * `text` - The text to translate
    /// * `instructions` - Language pair and system prompt
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The translated text
    /// * `Err(MtError)` - If translation fails
    async fn translate(
        &self,
        text: &str,
        instructions: &TranslationInstructions,
    ) -> MtResult<String>;

    /// Translate several strings in one combined request
    ///
    /// Implementations return whatever the service produced; callers check
    /// that the output length equals the input length.
    async fn translate_batch(
        &self,
        texts: &[String],
        instructions: &TranslationInstructions,
    ) -> MtResult<Vec<String>>;

    /// Get the name of this translation provider
    ///
    /// Used for logging to identify which provider handled a translation.
    fn provider_name(&self) -> &str;

    /// Map an error produced by this provider onto the failure taxonomy
    ///
    /// The default trusts the variant the provider chose.
    fn classify(&self, err: &MtError) -> ErrorClass {
        err.class()
    }
}

/// A ranked, swappable unit of translation capability
///
/// Lower `priority` values are tried first.
#[derive(Clone)]
pub struct Backend {
    name: String,
    priority: u32,
    translator: Arc<dyn MachineTranslator>,
}

impl Backend {
    pub fn new(name: impl Into<String>, priority: u32, translator: Arc<dyn MachineTranslator>) -> Self {
        Self {
            name: name.into(),
            priority,
            translator,
        }
    }

    /// Identifier recorded as `TranslationResult::model`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn translator(&self) -> &dyn MachineTranslator {
        self.translator.as_ref()
    }

    pub fn classify(&self, err: &MtError) -> ErrorClass {
        self.translator.classify(err)
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("provider", &self.translator.provider_name())
            .finish()
    }
}

/// Normalize a locale code by stripping region information
///
/// Converts locale codes from BCP 47 format to ISO 639-1 format:
/// - `en-US` → `en`
/// - `zh-Hans` → `zh`
/// - `en` → `en` (unchanged)
pub fn normalize_locale(locale: &str) -> String {
    locale.split('-').next().unwrap_or(locale).to_lowercase()
}

/// Validate that a locale code is in acceptable format
///
/// Checks that the locale code contains only alphanumeric characters,
/// hyphens, and underscores (following ISO 639 conventions).
pub fn validate_locale(locale: &str) -> MtResult<()> {
    if locale.is_empty() {
        return Err(MtError::InvalidLocale("Locale code is empty".to_string()));
    }

    if !locale
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(MtError::InvalidLocale(format!(
            "Invalid characters in locale code: {}",
            locale
        )));
    }

    Ok(())
}
