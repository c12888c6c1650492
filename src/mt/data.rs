//! Core data structures for batch translation
//!
//! Items are identified by their position in the input list; every result
//! list has the same length and order as the item list it came from.

use crate::mt::error::{ErrorClass, MtError};
use serde::{Deserialize, Serialize};

/// Model recorded when no backend produced the text (nothing translated it)
pub const ORIGINAL_MODEL: &str = "original";

/// Model recorded for blank text that needed no call
pub const PASSTHROUGH_MODEL: &str = "passthrough";

/// One input record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationItem {
    pub title: String,
    pub content: String,
}

impl TranslationItem {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// One output record, positionally matching its [`TranslationItem`]
///
/// `translated == false` means the original text (or part of it) was kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub title: String,
    pub content: String,
    pub translated: bool,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranslationResult {
    /// Combine the title and content outcomes of one item
    ///
    /// The item is translated only if both parts are. The model is the
    /// content's, or the title's when the content needed no call. The error
    /// is the title's when both failed, since titles are translated first.
    pub fn from_parts(title: TextOutcome, content: TextOutcome) -> Self {
        let model = if content.model == PASSTHROUGH_MODEL {
            title.model
        } else {
            content.model
        };
        Self {
            translated: title.translated && content.translated,
            error: title.error.or(content.error),
            title: title.text,
            content: content.text,
            model,
        }
    }
}

/// Outcome of translating one piece of text through the fallback chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextOutcome {
    pub text: String,
    pub translated: bool,
    pub model: String,
    pub error: Option<String>,
    /// Class of the failure that kept the original text
    pub failure: Option<ErrorClass>,
}

impl TextOutcome {
    pub fn translated(text: String, model: &str) -> Self {
        Self {
            text,
            translated: true,
            model: model.to_string(),
            error: None,
            failure: None,
        }
    }

    /// The original text kept, with the reason
    pub fn original(text: &str, model: &str, error: Option<&MtError>) -> Self {
        Self {
            text: text.to_string(),
            translated: false,
            model: model.to_string(),
            error: error.map(MtError::tagged),
            failure: error.map(MtError::class),
        }
    }

    pub fn is_policy_rejection(&self) -> bool {
        self.failure == Some(ErrorClass::ContentPolicy)
    }

    /// Blank text, returned untouched without calling any backend
    pub fn passthrough(text: &str) -> Self {
        Self::translated(text.to_string(), PASSTHROUGH_MODEL)
    }
}

/// Results of one batch run plus its counters
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub results: Vec<TranslationResult>,
    pub success_count: usize,
    pub fail_count: usize,
}

impl BatchOutcome {
    pub fn from_results(results: Vec<TranslationResult>) -> Self {
        let success_count = results.iter().filter(|r| r.translated).count();
        let fail_count = results.len() - success_count;
        Self {
            results,
            success_count,
            fail_count,
        }
    }
}
