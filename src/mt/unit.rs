//! Single-unit translation calls
//!
//! One call, one backend, one piece of text. Each call holds a limiter slot
//! for its whole duration and is cut off by the guard timeout. Replies are
//! validated here so callers only ever see a usable translation or a typed
//! error. Nothing is retried at this level.

use crate::mt::error::{MtError, MtResult};
use crate::mt::instructions::TranslationInstructions;
use crate::mt::limiter::ConcurrencyLimiter;
use crate::mt::response::ensure_count;
use crate::mt::translator::Backend;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct UnitTranslator {
    limiter: ConcurrencyLimiter,
    call_timeout: Duration,
}

impl UnitTranslator {
    pub fn new(limiter: ConcurrencyLimiter, call_timeout: Duration) -> Self {
        Self {
            limiter,
            call_timeout,
        }
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Translate one text with one backend
    ///
    /// An empty reply for non-empty input is reported as malformed.
    pub async fn translate(
        &self,
        backend: &Backend,
        text: &str,
        instructions: &TranslationInstructions,
    ) -> MtResult<String> {
        debug!(backend = backend.name(), chars = text.chars().count(), "translate call");
        let reply = self
            .guarded(backend, backend.translator().translate(text, instructions))
            .await?;

        if reply.trim().is_empty() && !text.trim().is_empty() {
            return Err(MtError::MalformedResponse(format!(
                "{} returned an empty translation",
                backend.name()
            )));
        }
        Ok(reply)
    }

    /// Translate several texts in one combined request
    ///
    /// Fails with [`MtError::CountMismatch`] when the reply does not contain
    /// exactly one entry per input.
    pub async fn translate_batch(
        &self,
        backend: &Backend,
        texts: &[String],
        instructions: &TranslationInstructions,
    ) -> MtResult<Vec<String>> {
        debug!(backend = backend.name(), items = texts.len(), "batch call");
        let replies = self
            .guarded(backend, backend.translator().translate_batch(texts, instructions))
            .await?;
        ensure_count(texts.len(), replies)
    }

    async fn guarded<F, T>(&self, backend: &Backend, call: F) -> MtResult<T>
    where
        F: std::future::Future<Output = MtResult<T>>,
    {
        let timed = self
            .limiter
            .run(tokio::time::timeout(self.call_timeout, call))
            .await?;
        match timed {
            Ok(result) => result,
            Err(_) => Err(MtError::Timeout(format!(
                "{} did not answer within {:?}",
                backend.name(),
                self.call_timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mt::error::ErrorClass;
    use crate::mt::mock::{MockMode, MockStep, MockTranslator};
    use std::sync::Arc;

    fn instructions() -> TranslationInstructions {
        TranslationInstructions::new("zh", "en").unwrap()
    }

    fn unit(timeout_ms: u64) -> UnitTranslator {
        UnitTranslator::new(ConcurrencyLimiter::new(2), Duration::from_millis(timeout_ms))
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let backend = Backend::new("m", 0, Arc::new(MockTranslator::new(MockMode::Suffix)));
        let out = unit(1000).translate(&backend, "你好", &instructions()).await.unwrap();
        assert_eq!(out, "你好_en");
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let mock = MockTranslator::with_delay(MockMode::Suffix, 200);
        let backend = Backend::new("slow", 0, Arc::new(mock));
        let err = unit(20)
            .translate(&backend, "你好", &instructions())
            .await
            .unwrap_err();
        assert!(matches!(err, MtError::Timeout(_)));
        assert_eq!(err.class(), ErrorClass::Transient);
    }

    #[tokio::test]
    async fn test_empty_reply_is_malformed() {
        let mock = MockTranslator::new(MockMode::Empty);
        let backend = Backend::new("blank", 0, Arc::new(mock));
        let err = unit(1000)
            .translate(&backend, "你好", &instructions())
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Malformed);
    }

    #[tokio::test]
    async fn test_batch_count_mismatch() {
        let mock = MockTranslator::new(MockMode::Suffix).with_script(vec![MockStep::DropLast]);
        let backend = Backend::new("m", 0, Arc::new(mock));
        let texts = vec!["甲".to_string(), "乙".to_string()];
        let err = unit(1000)
            .translate_batch(&backend, &texts, &instructions())
            .await
            .unwrap_err();
        assert_eq!(err, MtError::CountMismatch { expected: 2, got: 1 });
    }

    #[tokio::test]
    async fn test_slot_released_after_call() {
        let backend = Backend::new("m", 0, Arc::new(MockTranslator::new(MockMode::Suffix)));
        let unit = unit(1000);
        unit.translate(&backend, "a", &instructions()).await.unwrap();
        assert_eq!(unit.limiter().in_flight(), 0);
    }
}
