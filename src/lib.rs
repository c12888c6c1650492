pub mod mt;

pub use mt::{
    BatchOrchestrator, BatchOutcome, EngineConfig, MtError, MtResult, TranslationItem,
    TranslationResult,
};

/// Translate `items` with the backends and tunables in `config`
///
/// Fails only on invalid configuration; backend failures end up in the
/// individual results.
pub async fn translate_batch(
    items: &[TranslationItem],
    config: &EngineConfig,
) -> MtResult<BatchOutcome> {
    let engine = config.build_orchestrator()?;
    Ok(engine.run(items).await)
}
