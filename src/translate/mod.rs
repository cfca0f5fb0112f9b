// Translation
//
// - Backend / handle traits: what an inference engine must provide
// - Cache: bounded, lazily loaded handles keyed by language pair
// - Segment: token-budget splitting
// - Engine: per-language transcripts for a job
// - Ollama: HTTP backend

pub mod cache;
pub mod engine;
pub mod ollama;
pub mod segment;

use async_trait::async_trait;
use std::sync::Arc;

pub use cache::{LeasedHandle, ModelCache};
pub use engine::TranslationEngine;
pub use ollama::OllamaBackend;

use crate::error::Result;
use crate::language::LanguagePair;

/// A loaded engine for one language pair.
///
/// Calls against one handle are serialized by the cache; implementations
/// need not be reentrant.
#[async_trait]
pub trait TranslationHandle: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;

    fn detokenize(&self, tokens: &[String]) -> String;

    async fn translate(&self, text: &str) -> Result<String>;
}

#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Fails with `UnsupportedLanguage` when the backend has no engine for `pair`
    async fn load(&self, pair: &LanguagePair) -> Result<Arc<dyn TranslationHandle>>;
}
