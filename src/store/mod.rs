// Narrow per-entity persistence
//
// The pipeline needs create / find / update on jobs and transcripts and nothing
// else. Queries take typed filters instead of field names:
// - MemoryStore: process-local tables
// - JsonStore: the same tables persisted as one JSON document

pub mod json;
pub mod memory;

use async_trait::async_trait;

pub use json::JsonStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::{Job, JobId, JobStatus, Transcript, TranscriptId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub processed: Option<bool>,
}

impl JobFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, job: &Job) -> bool {
        self.status.map_or(true, |status| job.status == status)
            && self.processed.map_or(true, |processed| job.processed == processed)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptFilter {
    pub job_id: Option<JobId>,
    /// Matched case-insensitively against the transcript's target language
    pub language: Option<String>,
}

impl TranscriptFilter {
    pub fn for_job(job_id: &JobId) -> Self {
        Self {
            job_id: Some(job_id.clone()),
            language: None,
        }
    }

    pub fn for_job_language(job_id: &JobId, language: &str) -> Self {
        Self {
            job_id: Some(job_id.clone()),
            language: Some(language.to_string()),
        }
    }

    pub fn matches(&self, transcript: &Transcript) -> bool {
        self.job_id.as_ref().map_or(true, |id| &transcript.job_id == id)
            && self
                .language
                .as_ref()
                .map_or(true, |lang| transcript.target_language.eq_ignore_ascii_case(lang))
    }
}

/// Job persistence. Updates are last-write-wins, serialized by the implementation.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: &Job) -> Result<JobId>;

    async fn find(&self, id: &JobId) -> Result<Option<Job>>;

    async fn find_where(&self, filter: &JobFilter) -> Result<Vec<Job>>;

    /// Replace the stored job with the same id; false when it does not exist
    async fn update(&self, job: &Job) -> Result<bool>;
}

/// Transcript persistence, one record per (job, language)
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn create(&self, transcript: &Transcript) -> Result<TranscriptId>;

    async fn create_many(&self, transcripts: &[Transcript]) -> Result<usize> {
        let mut count = 0;
        for transcript in transcripts {
            self.create(transcript).await?;
            count += 1;
        }
        Ok(count)
    }

    async fn find(&self, id: &TranscriptId) -> Result<Option<Transcript>>;

    async fn find_where(&self, filter: &TranscriptFilter) -> Result<Vec<Transcript>>;

    async fn update(&self, transcript: &Transcript) -> Result<bool>;
}
