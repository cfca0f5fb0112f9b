use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LingomuxError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        Self(format!("job_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranscriptId(String);

impl TranscriptId {
    pub fn generate(job_id: &JobId) -> Self {
        Self(format!("transcript_{}_{}", Uuid::new_v4().simple(), job_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TranscriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a job. `Muxed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Created,
    AudioExtracted,
    Transcribed,
    Translated,
    Formatted,
    Muxed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Muxed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::AudioExtracted => "AUDIO_EXTRACTED",
            Self::Transcribed => "TRANSCRIBED",
            Self::Translated => "TRANSLATED",
            Self::Formatted => "FORMATTED",
            Self::Muxed => "MUXED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = LingomuxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "CREATED" => Ok(Self::Created),
            "AUDIO_EXTRACTED" => Ok(Self::AudioExtracted),
            "TRANSCRIBED" => Ok(Self::Transcribed),
            "TRANSLATED" => Ok(Self::Translated),
            "FORMATTED" => Ok(Self::Formatted),
            "MUXED" => Ok(Self::Muxed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(LingomuxError::Validation(format!("Unknown job status '{}'", s))),
        }
    }
}

/// One transition of the job state machine; each invokes exactly one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    ExtractAudio,
    Transcribe,
    Translate,
    Format,
    Mux,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 5] = [
        Self::ExtractAudio,
        Self::Transcribe,
        Self::Translate,
        Self::Format,
        Self::Mux,
    ];

    /// Status a job must be in before this stage may run
    pub fn requires(self) -> JobStatus {
        match self {
            Self::ExtractAudio => JobStatus::Created,
            Self::Transcribe => JobStatus::AudioExtracted,
            Self::Translate => JobStatus::Transcribed,
            Self::Format => JobStatus::Translated,
            Self::Mux => JobStatus::Formatted,
        }
    }

    /// Status a job reaches once this stage succeeds
    pub fn completes(self) -> JobStatus {
        match self {
            Self::ExtractAudio => JobStatus::AudioExtracted,
            Self::Transcribe => JobStatus::Transcribed,
            Self::Translate => JobStatus::Translated,
            Self::Format => JobStatus::Formatted,
            Self::Mux => JobStatus::Muxed,
        }
    }

    /// The stage to run next for a job in `status`, if any
    pub fn after(status: JobStatus) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.requires() == status)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExtractAudio => "extract_audio",
            Self::Transcribe => "transcribe",
            Self::Translate => "translate",
            Self::Format => "format",
            Self::Mux => "mux",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: PipelineStage,
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

/// Audio pulled out of the source video. Written once per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub job_id: JobId,
    pub path: PathBuf,
    pub sample_rate: u32,
    pub language: String,
}

/// One end-to-end video processing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub source_path: PathBuf,
    pub input_language: String,
    /// Insertion order is the canonical subtitle stream order
    pub target_languages: Vec<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub failure: Option<StageFailure>,
    #[serde(default)]
    pub audio: Option<AudioTrack>,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default)]
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new<P: Into<PathBuf>>(source_path: P, input_language: &str, target_languages: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::generate(),
            source_path: source_path.into(),
            input_language: input_language.trim().to_string(),
            target_languages,
            status: JobStatus::Created,
            failure: None,
            audio: None,
            output_path: None,
            processed: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn advance(&mut self, status: JobStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, stage: PipelineStage, message: String) {
        self.failure = Some(StageFailure {
            stage,
            message,
            failed_at: Utc::now(),
        });
        self.advance(JobStatus::Failed);
    }
}

/// Timestamp pair as produced by the recognizer; either end may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timestamp(pub Option<f64>, pub Option<f64>);

/// Raw timestamped unit as it comes out of recognition or translation.
/// Not validated: the formatter decides what is well-formed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub text: Option<String>,
}

impl Chunk {
    pub fn new<S: Into<String>>(start: f64, end: f64, text: S) -> Self {
        Self {
            timestamp: Some(Timestamp(Some(start), Some(end))),
            text: Some(text.into()),
        }
    }
}

/// Validated subtitle unit with `start < end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Ordered text segments for a job in one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: TranscriptId,
    pub job_id: JobId,
    pub input_language: String,
    pub target_language: String,
    pub original_text: String,
    pub original_chunks: Vec<Chunk>,
    #[serde(default)]
    pub translated_text: String,
    #[serde(default)]
    pub translated_chunks: Vec<Chunk>,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl Transcript {
    /// Transcript in the spoken language, as recognized.
    pub fn source<S: Into<String>>(job_id: &JobId, language: &str, text: S, chunks: Vec<Chunk>) -> Self {
        Self {
            id: TranscriptId::generate(job_id),
            job_id: job_id.clone(),
            input_language: language.to_string(),
            target_language: language.to_string(),
            original_text: text.into(),
            original_chunks: chunks,
            translated_text: String::new(),
            translated_chunks: Vec::new(),
            output_path: None,
            created_at: Utc::now(),
        }
    }

    /// New record carrying a translation of `source`; `source` is left untouched.
    pub fn translated_from(source: &Transcript, target_language: &str, text: String, chunks: Vec<Chunk>) -> Self {
        Self {
            id: TranscriptId::generate(&source.job_id),
            job_id: source.job_id.clone(),
            input_language: source.input_language.clone(),
            target_language: target_language.to_string(),
            original_text: source.original_text.clone(),
            original_chunks: source.original_chunks.clone(),
            translated_text: text,
            translated_chunks: chunks,
            output_path: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_pass_through(&self) -> bool {
        self.translated_text.is_empty()
            || self.input_language.eq_ignore_ascii_case(&self.target_language)
    }

    /// Chunks the subtitle file is built from
    pub fn subtitle_chunks(&self) -> &[Chunk] {
        if self.is_pass_through() {
            &self.original_chunks
        } else {
            &self.translated_chunks
        }
    }

    pub fn subtitle_track(&self) -> Option<SubtitleTrack> {
        self.output_path.as_ref().map(|path| SubtitleTrack {
            language: self.target_language.clone(),
            path: path.clone(),
        })
    }
}

/// File-backed subtitle artifact of a formatted transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub language: String,
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_chain_through_every_status() {
        let mut status = JobStatus::Created;
        let mut visited = Vec::new();
        while let Some(stage) = PipelineStage::after(status) {
            visited.push(stage);
            status = stage.completes();
        }
        assert_eq!(visited, PipelineStage::ALL.to_vec());
        assert_eq!(status, JobStatus::Muxed);
        assert!(PipelineStage::after(JobStatus::Failed).is_none());
    }

    #[test]
    fn status_parses_loosely() {
        assert_eq!("audio-extracted".parse::<JobStatus>().unwrap(), JobStatus::AudioExtracted);
        assert_eq!("muxed".parse::<JobStatus>().unwrap(), JobStatus::Muxed);
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[test]
    fn pass_through_uses_original_chunks() {
        let job_id = JobId::from("job_1");
        let source = Transcript::source(&job_id, "french", "Bonjour", vec![Chunk::new(0.0, 1.0, "Bonjour")]);
        assert!(source.is_pass_through());
        assert_eq!(source.subtitle_chunks()[0].text.as_deref(), Some("Bonjour"));

        let english = Transcript::translated_from(
            &source,
            "english",
            "Hello".into(),
            vec![Chunk::new(0.0, 1.0, "Hello")],
        );
        assert!(!english.is_pass_through());
        assert_eq!(english.subtitle_chunks()[0].text.as_deref(), Some("Hello"));
        assert_ne!(english.id, source.id);
    }

    #[test]
    fn chunk_json_tolerates_missing_fields() {
        let chunk: Chunk = serde_json::from_str(r#"{"timestamp":[0.5,null]}"#).unwrap();
        assert_eq!(chunk.timestamp, Some(Timestamp(Some(0.5), None)));
        assert!(chunk.text.is_none());
    }
}
