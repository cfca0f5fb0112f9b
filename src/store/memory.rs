use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{JobFilter, JobStore, TranscriptFilter, TranscriptStore};
use crate::error::{LingomuxError, Result};
use crate::models::{Job, JobId, Transcript, TranscriptId};

/// Record tables shared by the memory and JSON stores. Insertion order is kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Tables {
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub transcripts: Vec<Transcript>,
}

impl Tables {
    pub fn insert_job(&mut self, job: &Job) -> Result<JobId> {
        if self.jobs.iter().any(|existing| existing.id == job.id) {
            return Err(LingomuxError::Validation(format!("job {} already exists", job.id)));
        }
        self.jobs.push(job.clone());
        Ok(job.id.clone())
    }

    pub fn find_job(&self, id: &JobId) -> Option<Job> {
        self.jobs.iter().find(|job| &job.id == id).cloned()
    }

    pub fn jobs_where(&self, filter: &JobFilter) -> Vec<Job> {
        self.jobs.iter().filter(|job| filter.matches(job)).cloned().collect()
    }

    pub fn replace_job(&mut self, job: &Job) -> bool {
        match self.jobs.iter_mut().find(|existing| existing.id == job.id) {
            Some(existing) => {
                *existing = job.clone();
                true
            }
            None => false,
        }
    }

    pub fn insert_transcript(&mut self, transcript: &Transcript) -> Result<TranscriptId> {
        if self.transcripts.iter().any(|existing| existing.id == transcript.id) {
            return Err(LingomuxError::Validation(format!(
                "transcript {} already exists",
                transcript.id
            )));
        }
        self.transcripts.push(transcript.clone());
        Ok(transcript.id.clone())
    }

    pub fn find_transcript(&self, id: &TranscriptId) -> Option<Transcript> {
        self.transcripts.iter().find(|t| &t.id == id).cloned()
    }

    pub fn transcripts_where(&self, filter: &TranscriptFilter) -> Vec<Transcript> {
        self.transcripts.iter().filter(|t| filter.matches(t)).cloned().collect()
    }

    pub fn replace_transcript(&mut self, transcript: &Transcript) -> bool {
        match self.transcripts.iter_mut().find(|existing| existing.id == transcript.id) {
            Some(existing) => {
                *existing = transcript.clone();
                true
            }
            None => false,
        }
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create(&self, job: &Job) -> Result<JobId> {
        self.tables.write().await.insert_job(job)
    }

    async fn find(&self, id: &JobId) -> Result<Option<Job>> {
        Ok(self.tables.read().await.find_job(id))
    }

    async fn find_where(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        Ok(self.tables.read().await.jobs_where(filter))
    }

    async fn update(&self, job: &Job) -> Result<bool> {
        Ok(self.tables.write().await.replace_job(job))
    }
}

#[async_trait]
impl TranscriptStore for MemoryStore {
    async fn create(&self, transcript: &Transcript) -> Result<TranscriptId> {
        self.tables.write().await.insert_transcript(transcript)
    }

    async fn find(&self, id: &TranscriptId) -> Result<Option<Transcript>> {
        Ok(self.tables.read().await.find_transcript(id))
    }

    async fn find_where(&self, filter: &TranscriptFilter) -> Result<Vec<Transcript>> {
        Ok(self.tables.read().await.transcripts_where(filter))
    }

    async fn update(&self, transcript: &Transcript) -> Result<bool> {
        Ok(self.tables.write().await.replace_transcript(transcript))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, JobStatus};

    #[tokio::test]
    async fn job_create_find_update() {
        let store = MemoryStore::new();
        let mut job = Job::new("/videos/a.mp4", "french", vec!["english".into()]);

        let id = JobStore::create(&store, &job).await.unwrap();
        assert_eq!(JobStore::find(&store, &id).await.unwrap().unwrap().status, JobStatus::Created);

        job.advance(JobStatus::AudioExtracted);
        assert!(JobStore::update(&store, &job).await.unwrap());

        let extracted = JobStore::find_where(&store, &JobFilter::with_status(JobStatus::AudioExtracted))
            .await
            .unwrap();
        assert_eq!(extracted.len(), 1);

        let unknown = Job::new("/videos/b.mp4", "french", vec![]);
        assert!(!JobStore::update(&store, &unknown).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_job_is_rejected() {
        let store = MemoryStore::new();
        let job = Job::new("/videos/a.mp4", "french", vec![]);
        JobStore::create(&store, &job).await.unwrap();
        assert!(JobStore::create(&store, &job).await.is_err());
    }

    #[tokio::test]
    async fn transcripts_filter_by_job_and_language() {
        let store = MemoryStore::new();
        let job = Job::new("/videos/a.mp4", "french", vec![]);
        let other = Job::new("/videos/b.mp4", "french", vec![]);

        let source = Transcript::source(&job.id, "french", "Bonjour", vec![Chunk::new(0.0, 1.0, "Bonjour")]);
        let arabic = Transcript::translated_from(&source, "arabic", "مرحبا".into(), vec![]);
        let foreign = Transcript::source(&other.id, "french", "Salut", vec![]);
        store.create_many(&[source, arabic, foreign]).await.unwrap();

        assert_eq!(
            TranscriptStore::find_where(&store, &TranscriptFilter::for_job(&job.id)).await.unwrap().len(),
            2
        );
        let found = TranscriptStore::find_where(&store, &TranscriptFilter::for_job_language(&job.id, "ARABIC"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].translated_text, "مرحبا");
    }
}
