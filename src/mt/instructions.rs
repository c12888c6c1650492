//! Translation instructions sent alongside every call
//!
//! AI backends receive [`TranslationInstructions::system_prompt`] as their
//! system message; plain translation endpoints only use the language pair.

use crate::mt::error::MtResult;
use crate::mt::translator::{normalize_locale, validate_locale};

/// Language pair plus the fixed fidelity rules for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationInstructions {
    pub source_lang: String,
    pub target_lang: String,
    pub system_prompt: String,
}

impl TranslationInstructions {
    /// Build instructions with the default fidelity rules
    ///
    /// # Example
    ///
    /// ```ignore
    /// let instructions = TranslationInstructions::new("zh", "en")?;
    /// assert!(instructions.system_prompt.contains("proper nouns"));
    /// ```
    pub fn new(source_lang: &str, target_lang: &str) -> MtResult<Self> {
        validate_locale(source_lang)?;
        validate_locale(target_lang)?;
        Ok(Self {
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            system_prompt: default_system_prompt(source_lang, target_lang),
        })
    }

    /// Replace the system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Base language codes, e.g. `zh-CN` → `zh`
    pub fn language_pair(&self) -> (String, String) {
        (
            normalize_locale(&self.source_lang),
            normalize_locale(&self.target_lang),
        )
    }

    /// User message for a multi-item call
    ///
    /// The model is asked for a bare JSON array with one string per input,
    /// in input order.
    pub fn batch_prompt(&self, texts: &[String]) -> String {
        let payload = serde_json::to_string_pretty(texts).unwrap_or_else(|_| "[]".to_string());
        format!(
            "Translate each string in the following JSON array. Reply with a JSON array of exactly {} strings, in the same order, and nothing else.\n\n{}",
            texts.len(),
            payload
        )
    }
}

fn default_system_prompt(source_lang: &str, target_lang: &str) -> String {
    format!(
        "You are a professional literary translator. Translate the user's text from {source} to {target}.\n\
         Rules:\n\
         - Keep proper nouns (people, places, sects, titles) as proper nouns; transliterate rather than paraphrase them.\n\
         - Preserve the tone and register of dialogue, including quotation marks.\n\
         - Translate organizational and technical terms when that makes the text easier to read.\n\
         - Keep paragraph breaks and line structure.\n\
         - Output only the translation, without notes, explanations or markdown.",
        source = source_lang,
        target = target_lang
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompt_mentions_rules() {
        let instructions = TranslationInstructions::new("zh", "en").unwrap();
        assert!(instructions.system_prompt.contains("from zh to en"));
        assert!(instructions.system_prompt.contains("proper nouns"));
        assert!(instructions.system_prompt.contains("dialogue"));
    }

    #[test]
    fn test_invalid_locale_rejected() {
        assert!(TranslationInstructions::new("zh@", "en").is_err());
    }

    #[test]
    fn test_language_pair_normalized() {
        let instructions = TranslationInstructions::new("zh-CN", "en-US").unwrap();
        assert_eq!(
            instructions.language_pair(),
            ("zh".to_string(), "en".to_string())
        );
    }

    #[test]
    fn test_batch_prompt_states_count() {
        let instructions = TranslationInstructions::new("zh", "en").unwrap();
        let prompt = instructions.batch_prompt(&["甲".to_string(), "乙".to_string()]);
        assert!(prompt.contains("exactly 2 strings"));
        assert!(prompt.contains("\"甲\""));
    }

    #[test]
    fn test_custom_system_prompt() {
        let instructions = TranslationInstructions::new("zh", "en")
            .unwrap()
            .with_system_prompt("Be terse.");
        assert_eq!(instructions.system_prompt, "Be terse.");
    }
}
