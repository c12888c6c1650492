//! Fallback chain over ranked translation backends
//!
//! The chain tries ranked backends in priority order and reacts to each
//! failure class:
//!
//! | class | reaction |
//! |---|---|
//! | quota | mark the backend exhausted for the run, move to the next one |
//! | transient, malformed, network | retry the same backend, then move on |
//! | content policy | stop; keep the original text |
//! | other | move to the next backend |
//!
//! When every ranked backend has failed, the text is split into small
//! chunks and sent to the last-resort backend with exponential backoff.
//!
//! The "sticky" backend index lives in a [`RunContext`], one per batch run.
//! Once a lower-ranked backend works, later calls in the same run start from
//! it instead of retrying backends known to be out of quota.

use crate::mt::chunker::{chunk_text, rewrap, split_edges};
use crate::mt::data::{ORIGINAL_MODEL, TextOutcome};
use crate::mt::error::{ErrorClass, MtError, MtResult};
use crate::mt::instructions::TranslationInstructions;
use crate::mt::translator::Backend;
use crate::mt::unit::UnitTranslator;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Retry and sizing knobs of the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts on the same ranked backend after a transient failure
    pub same_backend_retries: usize,
    /// Total attempts per chunk on the last-resort backend
    pub last_resort_max_attempts: usize,
    /// First backoff delay; doubles on each further attempt
    pub backoff_base: Duration,
    /// Chunk size (characters) for ranked backends
    pub model_chunk_chars: usize,
    /// Chunk size (characters) for the last-resort backend
    pub last_resort_chunk_chars: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            same_backend_retries: 1,
            last_resort_max_attempts: 3,
            backoff_base: Duration::from_millis(1000),
            model_chunk_chars: 4000,
            last_resort_chunk_chars: 1500,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`: base × 2^(attempt - 1)
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        self.backoff_base.saturating_mul(2u32.pow(exponent))
    }
}

/// Mutable state of one batch run shared by all its calls
#[derive(Debug)]
pub struct RunContext {
    sticky: AtomicUsize,
    unit: UnitTranslator,
    instructions: TranslationInstructions,
}

impl RunContext {
    pub fn new(unit: UnitTranslator, instructions: TranslationInstructions) -> Self {
        Self {
            sticky: AtomicUsize::new(0),
            unit,
            instructions,
        }
    }

    /// Index of the ranked backend calls currently start from
    ///
    /// Equal to the number of ranked backends once all are exhausted.
    pub fn sticky_index(&self) -> usize {
        self.sticky.load(Ordering::SeqCst)
    }

    pub fn unit(&self) -> &UnitTranslator {
        &self.unit
    }

    pub fn instructions(&self) -> &TranslationInstructions {
        &self.instructions
    }

    /// Start later calls at `index`; the sticky index never moves back
    fn prefer(&self, index: usize) {
        let previous = self.sticky.fetch_max(index, Ordering::SeqCst);
        if previous < index {
            info!(from = previous, to = index, "sticky backend changed");
        }
    }

    fn mark_exhausted(&self, index: usize) {
        self.sticky.fetch_max(index + 1, Ordering::SeqCst);
    }
}

/// Reply of a multi-item call and the backend that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReply {
    pub texts: Vec<String>,
    pub model: String,
}

/// Ranked backends plus an optional last resort
#[derive(Debug, Clone)]
pub struct FallbackChain {
    backends: Vec<Backend>,
    last_resort: Option<Backend>,
    policy: RetryPolicy,
}

impl FallbackChain {
    /// Build a chain; ranked backends are ordered by ascending priority
    ///
    /// # Returns
    ///
    /// * `Err(MtError::ConfigError)` - If there is no backend at all
    pub fn new(
        mut backends: Vec<Backend>,
        last_resort: Option<Backend>,
        policy: RetryPolicy,
    ) -> MtResult<Self> {
        if backends.is_empty() && last_resort.is_none() {
            return Err(MtError::ConfigError(
                "At least one backend is required".to_string(),
            ));
        }
        backends.sort_by_key(|b| b.priority());
        Ok(Self {
            backends,
            last_resort,
            policy,
        })
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    pub fn last_resort(&self) -> Option<&Backend> {
        self.last_resort.as_ref()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Whether any ranked backend is still worth calling in this run
    pub fn has_available_ranked(&self, run: &RunContext) -> bool {
        run.sticky_index() < self.backends.len()
    }

    /// Translate a whole text, splitting it when it exceeds the model chunk size
    ///
    /// Blank text is returned untouched. Chunks are translated one after
    /// another and merged in order; a failed chunk keeps its original text
    /// and marks the whole outcome untranslated. A content-policy rejection
    /// of any chunk returns the entire original text.
    pub async fn translate_text(&self, run: &RunContext, text: &str) -> TextOutcome {
        if text.trim().is_empty() {
            return TextOutcome::passthrough(text);
        }

        let chunks = chunk_text(text, self.policy.model_chunk_chars);
        if chunks.len() > 1 {
            debug!(chunks = chunks.len(), "text split for ranked backends");
        }

        let mut merged = String::with_capacity(text.len());
        let mut models: Vec<String> = Vec::new();
        let mut translated = true;
        let mut first_failure: Option<TextOutcome> = None;

        for chunk in &chunks {
            let (_, core, _) = split_edges(chunk);
            if core.is_empty() {
                merged.push_str(chunk);
                continue;
            }

            let outcome = self.translate_with_fallback(run, core).await;
            if outcome.is_policy_rejection() {
                return TextOutcome {
                    text: text.to_string(),
                    ..outcome
                };
            }

            merged.push_str(&rewrap(chunk, &outcome.text));
            if !models.contains(&outcome.model) {
                models.push(outcome.model.clone());
            }
            if !outcome.translated {
                translated = false;
                first_failure.get_or_insert(outcome);
            }
        }

        TextOutcome {
            text: merged,
            translated,
            model: models.join("+"),
            error: first_failure.as_ref().and_then(|f| f.error.clone()),
            failure: first_failure.and_then(|f| f.failure),
        }
    }

    /// Translate one piece of text through the ranked backends, then the last resort
    pub async fn translate_with_fallback(&self, run: &RunContext, text: &str) -> TextOutcome {
        let mut cause: Option<MtError> = None;

        for index in run.sticky_index()..self.backends.len() {
            let backend = &self.backends[index];
            let mut attempt = 0;

            loop {
                attempt += 1;
                let err = match run.unit().translate(backend, text, run.instructions()).await {
                    Ok(translation) => {
                        run.prefer(index);
                        return TextOutcome::translated(translation, backend.name());
                    }
                    Err(err) => err,
                };

                match backend.classify(&err) {
                    ErrorClass::ContentPolicy => {
                        warn!(backend = backend.name(), error = %err, "content rejected, keeping original");
                        return TextOutcome::original(text, backend.name(), Some(&err));
                    }
                    ErrorClass::Quota => {
                        warn!(backend = backend.name(), error = %err, "quota exhausted, switching backend");
                        run.mark_exhausted(index);
                        cause = Some(err);
                        break;
                    }
                    class if class.is_retryable() && attempt <= self.policy.same_backend_retries => {
                        warn!(backend = backend.name(), attempt, error = %err, "retrying same backend");
                        tokio::time::sleep(self.policy.backoff(attempt)).await;
                    }
                    _ => {
                        warn!(backend = backend.name(), error = %err, "backend failed, falling through");
                        cause = Some(err);
                        break;
                    }
                }
            }
        }

        self.translate_last_resort(run, text, cause).await
    }

    /// Send chunked text to the last-resort backend
    async fn translate_last_resort(
        &self,
        run: &RunContext,
        text: &str,
        cause: Option<MtError>,
    ) -> TextOutcome {
        let Some(backend) = &self.last_resort else {
            return TextOutcome::original(text, ORIGINAL_MODEL, cause.as_ref());
        };
        info!(backend = backend.name(), chars = text.chars().count(), "using last-resort backend");

        let mut merged = String::with_capacity(text.len());
        for chunk in chunk_text(text, self.policy.last_resort_chunk_chars) {
            let (_, core, _) = split_edges(&chunk);
            if core.is_empty() {
                merged.push_str(&chunk);
                continue;
            }
            match self.call_with_backoff(run, backend, core).await {
                Ok(translation) => merged.push_str(&rewrap(&chunk, &translation)),
                Err(err) => {
                    warn!(backend = backend.name(), error = %err, "last resort failed, keeping original");
                    return TextOutcome::original(text, backend.name(), Some(&err));
                }
            }
        }
        TextOutcome::translated(merged, backend.name())
    }

    /// Bounded retry loop with exponential backoff
    ///
    /// Content-policy and `other` failures do not change on retry and end the loop at once.
    async fn call_with_backoff(
        &self,
        run: &RunContext,
        backend: &Backend,
        text: &str,
    ) -> MtResult<String> {
        let max_attempts = self.policy.last_resort_max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match run.unit().translate(backend, text, run.instructions()).await {
                Ok(translation) => return Ok(translation),
                Err(err) => err,
            };
            let class = backend.classify(&err);
            if attempt >= max_attempts
                || matches!(class, ErrorClass::ContentPolicy | ErrorClass::Other)
            {
                return Err(err);
            }
            let delay = self.policy.backoff(attempt);
            warn!(backend = backend.name(), attempt, max_attempts, ?delay, error = %err, "retrying after backoff");
            tokio::time::sleep(delay).await;
        }
    }

    /// Translate several texts in one combined request
    ///
    /// Starts at the sticky backend. Quota moves on to the next ranked
    /// backend; transient failures are retried once on the same backend;
    /// anything else is returned so the caller can shrink the batch.
    pub async fn translate_batch(&self, run: &RunContext, texts: &[String]) -> MtResult<BatchReply> {
        let mut cause: Option<MtError> = None;

        for index in run.sticky_index()..self.backends.len() {
            let backend = &self.backends[index];
            let mut attempt = 0;

            loop {
                attempt += 1;
                let err = match run
                    .unit()
                    .translate_batch(backend, texts, run.instructions())
                    .await
                {
                    Ok(replies) => {
                        run.prefer(index);
                        return Ok(BatchReply {
                            texts: replies,
                            model: backend.name().to_string(),
                        });
                    }
                    Err(err) => err,
                };

                match backend.classify(&err) {
                    ErrorClass::Quota => {
                        warn!(backend = backend.name(), error = %err, "quota exhausted on batch, switching backend");
                        run.mark_exhausted(index);
                        cause = Some(err);
                        break;
                    }
                    ErrorClass::Transient | ErrorClass::Network
                        if attempt <= self.policy.same_backend_retries =>
                    {
                        warn!(backend = backend.name(), attempt, error = %err, "retrying batch on same backend");
                        tokio::time::sleep(self.policy.backoff(attempt)).await;
                    }
                    _ => return Err(err),
                }
            }
        }

        Err(cause.unwrap_or_else(|| {
            MtError::QuotaExceeded("All ranked backends are exhausted".to_string())
        }))
    }
}
