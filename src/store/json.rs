use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::memory::Tables;
use super::{JobFilter, JobStore, TranscriptFilter, TranscriptStore};
use crate::error::{LingomuxError, Result};
use crate::models::{Job, JobId, Transcript, TranscriptId};

/// Jobs and transcripts kept in a single JSON document.
///
/// Every mutation rewrites the document through a temp file and a rename, so a
/// crash mid-write leaves the previous version in place. A mutation whose write
/// fails is not visible in memory either. The lock serializes
/// writers; concurrent updates of one record are last-write-wins.
pub struct JsonStore {
    path: PathBuf,
    tables: Mutex<Tables>,
}

impl JsonStore {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let tables = if fs::try_exists(&path).await? {
            let content = fs::read_to_string(&path).await?;
            if content.trim().is_empty() {
                Tables::default()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    LingomuxError::Config(format!("Failed to parse store {}: {}", path.display(), e))
                })?
            }
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            Tables::default()
        };

        info!(
            "Opened store {} ({} jobs, {} transcripts)",
            path.display(),
            tables.jobs.len(),
            tables.transcripts.len()
        );

        Ok(Self {
            path,
            tables: Mutex::new(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, tables: &Tables) -> Result<()> {
        let content = serde_json::to_string_pretty(tables)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!("Store flushed to {}", self.path.display());
        Ok(())
    }

    /// Persist `next` and only then make it the live state
    async fn commit(&self, live: &mut Tables, next: Tables) -> Result<()> {
        self.flush(&next).await?;
        *live = next;
        Ok(())
    }
}

#[async_trait]
impl JobStore for JsonStore {
    async fn create(&self, job: &Job) -> Result<JobId> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let id = next.insert_job(job)?;
        self.commit(&mut tables, next).await?;
        Ok(id)
    }

    async fn find(&self, id: &JobId) -> Result<Option<Job>> {
        Ok(self.tables.lock().await.find_job(id))
    }

    async fn find_where(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        Ok(self.tables.lock().await.jobs_where(filter))
    }

    async fn update(&self, job: &Job) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let updated = next.replace_job(job);
        if updated {
            self.commit(&mut tables, next).await?;
        }
        Ok(updated)
    }
}

#[async_trait]
impl TranscriptStore for JsonStore {
    async fn create(&self, transcript: &Transcript) -> Result<TranscriptId> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let id = next.insert_transcript(transcript)?;
        self.commit(&mut tables, next).await?;
        Ok(id)
    }

    async fn create_many(&self, transcripts: &[Transcript]) -> Result<usize> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        for transcript in transcripts {
            next.insert_transcript(transcript)?;
        }
        self.commit(&mut tables, next).await?;
        Ok(transcripts.len())
    }

    async fn find(&self, id: &TranscriptId) -> Result<Option<Transcript>> {
        Ok(self.tables.lock().await.find_transcript(id))
    }

    async fn find_where(&self, filter: &TranscriptFilter) -> Result<Vec<Transcript>> {
        Ok(self.tables.lock().await.transcripts_where(filter))
    }

    async fn update(&self, transcript: &Transcript) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let updated = next.replace_transcript(transcript);
        if updated {
            self.commit(&mut tables, next).await?;
        }
        Ok(updated)
    }
}
