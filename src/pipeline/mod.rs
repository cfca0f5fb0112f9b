// Job pipeline
//
// - Orchestrator: the job state machine, one stage component per transition
// - Runner: one task per job with a concurrency bound
//
// `build` wires the production components from configuration.

pub mod orchestrator;
pub mod runner;

use std::sync::Arc;

pub use orchestrator::{PipelineComponents, PipelineOrchestrator};
pub use runner::JobRunner;

use crate::config::Config;
use crate::error::Result;
use crate::language::LanguageRegistry;
use crate::media::{ExtractOptions, FfmpegProcessor, MediaExtractor, MediaTool, SubtitleMultiplexer};
use crate::setup::Workspace;
use crate::store::JsonStore;
use crate::subtitle::SubtitleFormatter;
use crate::transcribe::{SpeechRecognizer, WhisperCppEngine};
use crate::translate::{ModelCache, OllamaBackend, TranslationEngine};

/// Orchestrator over ffmpeg, whisper.cpp, Ollama and the JSON store
pub fn build(config: &Config, workspace: &Workspace, store: Arc<JsonStore>) -> Result<PipelineOrchestrator> {
    let registry = Arc::new(LanguageRegistry::new());
    let media: Arc<dyn MediaTool> = Arc::new(FfmpegProcessor::new(&config.media));

    let backend = Arc::new(OllamaBackend::new(config.translate.clone(), registry.clone())?);
    let cache = Arc::new(ModelCache::new(backend, config.translate.cache_capacity));

    let auxiliary = config.translate.auxiliary_language.trim();

    Ok(PipelineOrchestrator::new(PipelineComponents {
        jobs: store.clone(),
        transcripts: store.clone(),
        registry: registry.clone(),
        extractor: MediaExtractor::new(
            media.clone(),
            workspace.audios_dir.clone(),
            ExtractOptions::from(&config.media),
        ),
        recognizer: SpeechRecognizer::new(
            Arc::new(WhisperCppEngine::new(config.transcriber.clone())),
            registry.clone(),
            config.transcriber.sample_rate,
        ),
        translator: TranslationEngine::new(cache, registry.clone(), store.clone(), config.translate.token_budget),
        formatter: SubtitleFormatter::new(workspace.transcriptions_dir.clone(), store),
        multiplexer: SubtitleMultiplexer::new(media, registry, workspace.processed_dir.clone()),
        auxiliary_language: (!auxiliary.is_empty()).then(|| auxiliary.to_string()),
    }))
}
