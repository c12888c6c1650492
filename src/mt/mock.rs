//! Mock Machine Translator for testing
//!
//! This module provides a deterministic, API-free translator for testing
//! the fallback chain and batch orchestrator without API keys or network
//! access. Besides a fixed [`MockMode`], a mock can carry a script of
//! [`MockStep`]s that are consumed one per call, which is how tests simulate
//! "quota on the first call, fine afterwards".
//!
//! # Example
//!
//! ```ignore
//! use cascade_translate::mt::{MachineTranslator, MockTranslator, MockMode, TranslationInstructions};
//!
//! #[tokio::test]
//! async fn test_translation() {
//!     let mock = MockTranslator::new(MockMode::Suffix);
//!     let instructions = TranslationInstructions::new("zh", "en").unwrap();
//!     let result = mock.translate("你好", &instructions).await.unwrap();
//!     assert_eq!(result, "你好_en");
//! }
//! ```

use crate::mt::error::{MtError, MtResult};
use crate::mt::instructions::TranslationInstructions;
use crate::mt::translator::MachineTranslator;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock translation modes for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append target language suffix: "你好" → "你好_en"
    Suffix,

    /// Use predefined mappings, falling back to suffix mode
    Mappings(HashMap<String, String>),

    /// Always fail with the given error
    Error(MtError),

    /// Return an empty string
    Empty,

    /// No-op: return input unchanged
    NoOp,
}

/// One scripted call outcome, consumed before the mode applies
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Behave according to the mode
    Succeed,
    /// Fail this call with the given error
    Fail(MtError),
    /// Translate per mode, then drop the last entry of a batch reply
    DropLast,
}

/// Mock translator that simulates various translation scenarios
///
/// Clones share the script and the call counter.
#[derive(Debug, Clone)]
pub struct MockTranslator {
    name: String,
    mode: MockMode,
    /// Optional simulated network delay (in milliseconds)
    delay_ms: u64,
    script: Arc<Mutex<VecDeque<MockStep>>>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockTranslator {
    /// Create a new MockTranslator with the given mode
    pub fn new(mode: MockMode) -> Self {
        Self {
            name: "Mock Translator".to_string(),
            mode,
            delay_ms: 0,
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a MockTranslator with simulated network delay
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mock = MockTranslator::with_delay(MockMode::Suffix, 50);
    /// // Each translation will have ~50ms delay
    /// ```
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::new(mode)
        }
    }

    /// Queue outcomes for the next calls, one step per call
    pub fn with_script(self, steps: Vec<MockStep>) -> Self {
        self.lock_script().extend(steps);
        self
    }

    /// Override the provider name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of calls received so far (single and batch)
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Texts received so far; a batch is recorded as its lines joined by `\n`
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<MockStep>> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count the call, record its input, wait, and pick the scripted step
    async fn begin_call(&self, input: String) -> MockStep {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(input);
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        self.lock_script().pop_front().unwrap_or(MockStep::Succeed)
    }

    /// Apply translation logic based on the mode
    fn apply_translation(&self, text: &str, target: &str) -> MtResult<String> {
        match &self.mode {
            MockMode::Suffix => Ok(format!("{}_{}", text, target)),
            MockMode::Mappings(map) => Ok(map
                .get(text)
                .cloned()
                .unwrap_or_else(|| format!("{}_{}", text, target))),
            MockMode::Error(err) => Err(err.clone()),
            MockMode::Empty => Ok(String::new()),
            MockMode::NoOp => Ok(text.to_string()),
        }
    }
}

#[async_trait]
impl MachineTranslator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        instructions: &TranslationInstructions,
    ) -> MtResult<String> {
        match self.begin_call(text.to_string()).await {
            MockStep::Fail(err) => Err(err),
            MockStep::Succeed | MockStep::DropLast => {
                self.apply_translation(text, &instructions.target_lang)
            }
        }
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        instructions: &TranslationInstructions,
    ) -> MtResult<Vec<String>> {
        let step = self.begin_call(texts.join("\n")).await;
        if let MockStep::Fail(err) = step {
            return Err(err);
        }

        let mut results = texts
            .iter()
            .map(|text| self.apply_translation(text, &instructions.target_lang))
            .collect::<MtResult<Vec<_>>>()?;
        if let MockStep::DropLast = step {
            results.pop();
        }
        Ok(results)
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}
