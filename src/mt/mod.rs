//! Resilient batch translation engine
//!
//! This module translates lists of `{title, content}` items through an ordered
//! chain of machine translation backends, surviving quota exhaustion, flaky
//! servers and malformed model replies without losing a single item.
//!
//! # Overview
//!
//! 1. **Chunker** - Splits long text into sentence-aligned chunks
//! 2. **Concurrency Limiter** - FIFO semaphore bounding in-flight backend calls
//! 3. **Unit Translator** - One guarded call to one backend, typed failures
//! 4. **Fallback Chain** - Ranked backends, sticky fallback and a chunked last resort
//! 5. **Batch Orchestrator** - Adaptive title batches, staggered contents, statistics
//!
//! # Example
//!
//! ```ignore
//! use cascade_translate::mt::{EngineConfig, TranslationItem};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::load_from_file("cascade.toml")?;
//!     let engine = config.build_orchestrator()?;
//!
//!     let items = vec![TranslationItem::new("甲", "你好。世界！")];
//!     let outcome = engine.run(&items).await;
//!
//!     println!("{}/{} translated", outcome.success_count, items.len());
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod chat_completions;
pub mod chunker;
pub mod config;
pub mod data;
pub mod error;
pub mod fallback;
pub mod google_translate;
pub mod instructions;
pub mod io;
pub mod limiter;
pub mod mock;
pub mod response;
pub mod translator;
pub mod unit;


pub use batch::{BatchOrchestrator, BatchSettings};
pub use chat_completions::ChatCompletionsProvider;
pub use chunker::{chunk_text, split_sentences};
pub use config::{BackendConfig, BackendKind, EngineConfig};
pub use data::{BatchOutcome, TextOutcome, TranslationItem, TranslationResult};
pub use error::{ErrorClass, MtError, MtResult};
pub use fallback::{FallbackChain, RetryPolicy, RunContext};
pub use google_translate::GoogleTranslateProvider;
pub use instructions::TranslationInstructions;
pub use io::{
    HttpJsonSource, ItemSource, JsonFileSink, JsonFileSource, ResultSink, load_previous_results,
};
pub use limiter::{ConcurrencyLimiter, LimiterPermit};
pub use mock::{MockMode, MockStep, MockTranslator};
pub use translator::{Backend, MachineTranslator};
pub use unit::UnitTranslator;
