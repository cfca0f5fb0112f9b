use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::{LingomuxError, Result};
use crate::language::{LanguagePair, LanguageRegistry};
use crate::models::{Chunk, JobId, Transcript};
use crate::store::{TranscriptFilter, TranscriptStore};
use super::ModelCache;
use super::segment::{rejoin, split_tokens};

/// Produces and persists one transcript per requested language
pub struct TranslationEngine {
    cache: Arc<ModelCache>,
    registry: Arc<LanguageRegistry>,
    transcripts: Arc<dyn TranscriptStore>,
    token_budget: usize,
}

impl TranslationEngine {
    pub fn new(
        cache: Arc<ModelCache>,
        registry: Arc<LanguageRegistry>,
        transcripts: Arc<dyn TranscriptStore>,
        token_budget: usize,
    ) -> Self {
        Self {
            cache,
            registry,
            transcripts,
            token_budget: token_budget.max(1),
        }
    }

    /// Pass-through transcript first, then one translated transcript per unique
    /// remaining target, in request order. A language that fails is logged and
    /// left out; the others proceed.
    pub async fn translate_transcription_to_multiple_languages(
        &self,
        source: &Transcript,
        target_languages: &[String],
    ) -> Result<Vec<Transcript>> {
        if source.original_chunks.is_empty() {
            return Err(LingomuxError::Validation(format!(
                "job {} has an empty transcript",
                source.job_id
            )));
        }

        let source_language = source.input_language.as_str();
        let mut pass_through = source.clone();
        pass_through.target_language = source_language.to_string();
        pass_through.translated_text.clear();
        pass_through.translated_chunks.clear();
        let mut results = vec![self.persist(pass_through).await?];

        let mut seen = vec![self.registry.canonical_key(source_language)];
        for target in target_languages {
            let key = self.registry.canonical_key(target);
            if seen.contains(&key) {
                debug!("Job {}: {} already covered, skipping", source.job_id, target);
                continue;
            }
            seen.push(key);

            let translated = match self.translate_into(source, target).await {
                Ok(translated) => translated,
                Err(e) => {
                    error!("Job {}: translation into {} failed: {}", source.job_id, target, e);
                    continue;
                }
            };

            match self.persist(translated).await {
                Ok(saved) => results.push(saved),
                Err(e) => error!("Job {}: could not save {} transcript: {}", source.job_id, target, e),
            }
        }

        info!(
            "Job {}: {} transcript(s) ready from {}",
            source.job_id,
            results.len(),
            source_language
        );
        Ok(results)
    }

    async fn translate_into(&self, source: &Transcript, target: &str) -> Result<Transcript> {
        let pair = self.registry.pair(&source.input_language, target)?;
        let text = self.translate_pair(&source.original_text, &pair).await?;
        let chunks = self.translate_chunks(&source.job_id, &source.original_chunks, &pair).await?;
        Ok(Transcript::translated_from(source, target, text, chunks))
    }

    /// Create, or replace the record already stored for (job, language)
    async fn persist(&self, mut transcript: Transcript) -> Result<Transcript> {
        let filter = TranscriptFilter::for_job_language(&transcript.job_id, &transcript.target_language);
        match self.transcripts.find_where(&filter).await?.into_iter().next() {
            Some(existing) => {
                transcript.id = existing.id;
                transcript.created_at = existing.created_at;
                if transcript.output_path.is_none() {
                    transcript.output_path = existing.output_path;
                }
                self.transcripts.update(&transcript).await?;
            }
            None => {
                self.transcripts.create(&transcript).await?;
            }
        }
        Ok(transcript)
    }

    /// Translate `text` between two languages given by code or name
    pub async fn translate_text(&self, text: &str, source_code: &str, target_code: &str) -> Result<String> {
        let pair = self.registry.pair(source_code, target_code)?;
        self.translate_pair(text, &pair).await
    }

    async fn translate_pair(&self, text: &str, pair: &LanguagePair) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        match self.translate_segments(text, pair).await {
            Err(e) if e.is_resource_exhaustion() => {
                warn!("Translation {} exhausted resources, releasing cached engines: {}", pair, e);
                self.clear_models_cache().await;
                self.translate_segments(text, pair).await
            }
            other => other,
        }
    }

    async fn translate_segments(&self, text: &str, pair: &LanguagePair) -> Result<String> {
        let lease = self.cache.acquire(pair).await?;
        let handle = lease.handle();

        let tokens = handle.tokenize(text);
        if tokens.len() <= self.token_budget {
            return handle.translate(text).await;
        }

        let segments = split_tokens(&tokens, self.token_budget);
        debug!("Translating {} tokens in {} segments ({})", tokens.len(), segments.len(), pair);

        let mut pieces = Vec::with_capacity(segments.len());
        for segment in segments {
            pieces.push(handle.translate(&handle.detokenize(segment)).await?);
        }
        Ok(rejoin(&pieces))
    }

    /// Chunk-level translation. Malformed chunks are skipped; a chunk whose
    /// call fails becomes empty text. Resource exhaustion still aborts.
    pub async fn translate_chunks(
        &self,
        job_id: &JobId,
        chunks: &[Chunk],
        pair: &LanguagePair,
    ) -> Result<Vec<Chunk>> {
        let mut translated = Vec::with_capacity(chunks.len());

        for (index, chunk) in chunks.iter().enumerate() {
            let (Some(timestamp), Some(text)) = (chunk.timestamp, chunk.text.as_deref()) else {
                warn!("Job {}: skipping chunk {} ({}): missing timestamp or text", job_id, index, pair);
                continue;
            };

            let text = match self.translate_pair(text, pair).await {
                Ok(text) => text,
                Err(e) if e.is_resource_exhaustion() => return Err(e),
                Err(e) => {
                    error!("Job {}: chunk {} ({}) failed to translate: {}", job_id, index, pair, e);
                    String::new()
                }
            };

            translated.push(Chunk {
                timestamp: Some(timestamp),
                text: Some(text),
            });
        }

        Ok(translated)
    }

    pub async fn clear_models_cache(&self) {
        self.cache.clear().await;
    }
}
