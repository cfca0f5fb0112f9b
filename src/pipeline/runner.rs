use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{LingomuxError, Result};
use crate::models::{Job, JobId};
use super::PipelineOrchestrator;

/// Runs jobs on their own tasks, at most `max_concurrent` at a time
pub struct JobRunner {
    orchestrator: Arc<PipelineOrchestrator>,
    permits: Arc<Semaphore>,
}

impl JobRunner {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>, max_concurrent: usize) -> Self {
        Self {
            orchestrator,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn spawn(&self, job_id: JobId) -> JoinHandle<Result<Job>> {
        let orchestrator = self.orchestrator.clone();
        let permits = self.permits.clone();

        tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| LingomuxError::engine(format!("job runner closed: {}", e), String::new()))?;
            debug!("Job {}: worker started", job_id);
            orchestrator.run(&job_id).await
        })
    }

    /// Run every job and collect the outcomes in input order
    pub async fn run_all(&self, job_ids: Vec<JobId>) -> Vec<(JobId, Result<Job>)> {
        let handles: Vec<_> = job_ids
            .into_iter()
            .map(|id| {
                let handle = self.spawn(id.clone());
                (id, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Job {}: worker task ended abnormally: {}", id, e);
                    Err(LingomuxError::engine(format!("worker for job {} panicked or was cancelled", id), e.to_string()))
                }
            };
            outcomes.push((id, outcome));
        }
        outcomes
    }
}
