// Speech recognition boundary
//
// The recognizer adapter owns input validation, the single low-resource retry
// and the mapping into a source-language Transcript. Engines only turn samples
// into timed text:
// - WhisperCpp: whisper.cpp command line (whisper-cli)

pub mod whisper_cpp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub use whisper_cpp::WhisperCppEngine;

use crate::audio;
use crate::error::{LingomuxError, Result};
use crate::language::LanguageRegistry;
use crate::models::{AudioTrack, Chunk, JobId, Transcript};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Engine output: full text plus ordered timed segments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognizedSpeech {
    pub text: String,
    pub segments: Vec<RecognizedSegment>,
}

impl RecognizedSpeech {
    pub fn into_chunks(self) -> (String, Vec<Chunk>) {
        let chunks = self
            .segments
            .into_iter()
            .map(|seg| Chunk::new(seg.start, seg.end, seg.text))
            .collect();
        (self.text, chunks)
    }
}

/// Speech-to-text engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechRecognitionEngine: Send + Sync {
    /// `language` is a language code
    async fn transcribe(&self, samples: &[f32], sample_rate: u32, language: &str) -> Result<RecognizedSpeech>;

    /// Switch to the lower-resource execution path. False when already there.
    fn degrade(&self) -> bool;
}

/// Fixed-contract adapter in front of a recognition engine
pub struct SpeechRecognizer {
    engine: Arc<dyn SpeechRecognitionEngine>,
    registry: Arc<LanguageRegistry>,
    sample_rate: u32,
}

impl SpeechRecognizer {
    pub fn new(engine: Arc<dyn SpeechRecognitionEngine>, registry: Arc<LanguageRegistry>, sample_rate: u32) -> Self {
        Self {
            engine,
            registry,
            sample_rate,
        }
    }

    /// Decode the extracted track and recognize it
    pub async fn recognize(&self, audio: &AudioTrack) -> Result<Transcript> {
        let samples = audio::load_samples(&audio.path, self.sample_rate).await?;
        self.transcribe_samples(&audio.job_id, &samples, self.sample_rate, &audio.language)
            .await
    }

    pub async fn transcribe_samples(
        &self,
        job_id: &JobId,
        samples: &[f32],
        sample_rate: u32,
        language: &str,
    ) -> Result<Transcript> {
        if job_id.as_str().is_empty() {
            return Err(LingomuxError::Validation("job id is required".into()));
        }
        if samples.is_empty() {
            return Err(LingomuxError::Validation(format!("job {} has no audio samples", job_id)));
        }
        if sample_rate == 0 {
            return Err(LingomuxError::Validation("sample rate must be positive".into()));
        }
        let code = self.registry.code(language)?;

        let speech = match self.engine.transcribe(samples, sample_rate, code).await {
            Err(e) if e.is_resource_exhaustion() => {
                warn!("Job {}: recognition exhausted resources: {}", job_id, e);
                if !self.engine.degrade() {
                    return Err(e);
                }
                info!("Job {}: retrying recognition on the low-resource path", job_id);
                self.engine.transcribe(samples, sample_rate, code).await?
            }
            other => other?,
        };

        info!(
            "Job {}: recognized {} segment(s) in {}",
            job_id,
            speech.segments.len(),
            language
        );

        let (text, chunks) = speech.into_chunks();
        Ok(Transcript::source(job_id, language, text, chunks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;

    fn speech() -> RecognizedSpeech {
        RecognizedSpeech {
            text: "Bonjour tout le monde".into(),
            segments: vec![
                RecognizedSegment {
                    start: 0.0,
                    end: 1.5,
                    text: "Bonjour".into(),
                },
                RecognizedSegment {
                    start: 1.5,
                    end: 3.0,
                    text: "tout le monde".into(),
                },
            ],
        }
    }

    fn recognizer(engine: MockSpeechRecognitionEngine) -> SpeechRecognizer {
        SpeechRecognizer::new(Arc::new(engine), Arc::new(LanguageRegistry::new()), 16000)
    }

    #[tokio::test]
    async fn builds_source_transcript_with_language_code() {
        let mut engine = MockSpeechRecognitionEngine::new();
        engine
            .expect_transcribe()
            .withf(|samples, rate, lang| samples.len() == 4 && *rate == 16000 && lang == "fr")
            .times(1)
            .returning(|_, _, _| Ok(speech()));

        let job_id = JobId::from("job_1");
        let transcript = recognizer(engine)
            .transcribe_samples(&job_id, &[0.0; 4], 16000, "french")
            .await
            .unwrap();

        assert_eq!(transcript.job_id, job_id);
        assert_eq!(transcript.target_language, "french");
        assert!(transcript.is_pass_through());
        assert_eq!(transcript.original_chunks.len(), 2);
        assert_eq!(transcript.original_chunks[1].text.as_deref(), Some("tout le monde"));
    }

    #[tokio::test]
    async fn exhaustion_degrades_and_retries_once() {
        let mut seq = Sequence::new();
        let mut engine = MockSpeechRecognitionEngine::new();
        engine
            .expect_transcribe()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(LingomuxError::ResourceExhaustion("CUDA out of memory".into())));
        engine.expect_degrade().times(1).in_sequence(&mut seq).return_const(true);
        engine
            .expect_transcribe()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(speech()));

        let transcript = recognizer(engine)
            .transcribe_samples(&JobId::from("job_1"), &[0.1; 8], 16000, "fr")
            .await
            .unwrap();
        assert_eq!(transcript.original_text, "Bonjour tout le monde");
    }

    #[tokio::test]
    async fn second_exhaustion_is_surfaced() {
        let mut engine = MockSpeechRecognitionEngine::new();
        engine
            .expect_transcribe()
            .times(2)
            .returning(|_, _, _| Err(LingomuxError::ResourceExhaustion("out of memory".into())));
        engine.expect_degrade().times(1).return_const(true);

        let err = recognizer(engine)
            .transcribe_samples(&JobId::from("job_1"), &[0.1; 8], 16000, "fr")
            .await
            .unwrap_err();
        assert!(err.is_resource_exhaustion());
    }

    #[tokio::test]
    async fn engine_failure_is_not_retried() {
        let mut engine = MockSpeechRecognitionEngine::new();
        engine
            .expect_transcribe()
            .times(1)
            .returning(|_, _, _| Err(LingomuxError::engine("whisper-cli failed", "bad model")));
        engine.expect_degrade().times(0);

        let err = recognizer(engine)
            .transcribe_samples(&JobId::from("job_1"), &[0.1; 8], 16000, "fr")
            .await
            .unwrap_err();
        assert!(matches!(err, LingomuxError::Engine { .. }));
    }

    #[tokio::test]
    async fn rejects_empty_samples_and_unknown_language() {
        let engine = MockSpeechRecognitionEngine::new();
        let recognizer = recognizer(engine);
        let job_id = JobId::from("job_1");

        let err = recognizer.transcribe_samples(&job_id, &[], 16000, "fr").await.unwrap_err();
        assert!(matches!(err, LingomuxError::Validation(_)));

        let err = recognizer
            .transcribe_samples(&job_id, &[0.1; 4], 16000, "klingon")
            .await
            .unwrap_err();
        assert!(matches!(err, LingomuxError::UnsupportedLanguage(_)));
    }
}
