use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use crate::error::{LingomuxError, Result};
use crate::language::LanguageRegistry;
use crate::media::{MediaExtractor, SubtitleMultiplexer};
use crate::models::{Job, JobId, JobStatus, PipelineStage, SubtitleTrack, Transcript};
use crate::store::{JobStore, TranscriptFilter, TranscriptStore};
use crate::subtitle::SubtitleFormatter;
use crate::transcribe::SpeechRecognizer;
use crate::translate::TranslationEngine;

/// Everything the orchestrator drives, built once at startup
pub struct PipelineComponents {
    pub jobs: Arc<dyn JobStore>,
    pub transcripts: Arc<dyn TranscriptStore>,
    pub registry: Arc<LanguageRegistry>,
    pub extractor: MediaExtractor,
    pub recognizer: SpeechRecognizer,
    pub translator: TranslationEngine,
    pub formatter: SubtitleFormatter,
    pub multiplexer: SubtitleMultiplexer,
    /// Added to every job's targets before extraction
    pub auxiliary_language: Option<String>,
}

/// Runs a persisted job through its stages.
///
/// `CREATED -> AUDIO_EXTRACTED -> TRANSCRIBED -> TRANSLATED -> FORMATTED -> MUXED`,
/// with `FAILED` reachable from any of them. Each stage's artifacts are saved
/// before the job's status moves on; a failure keeps what earlier stages saved.
pub struct PipelineOrchestrator {
    components: PipelineComponents,
    active: Mutex<HashSet<JobId>>,
}

/// Exclusive claim on a job id; released on drop
struct ActiveJob<'a> {
    id: JobId,
    active: &'a Mutex<HashSet<JobId>>,
}

impl Drop for ActiveJob<'_> {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.id);
    }
}

impl PipelineOrchestrator {
    pub fn new(components: PipelineComponents) -> Self {
        Self {
            components,
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Persist a new job for `source_path`
    pub async fn submit<P: Into<PathBuf>>(
        &self,
        source_path: P,
        input_language: &str,
        target_languages: &[String],
    ) -> Result<Job> {
        let source_path = source_path.into();
        if source_path.as_os_str().is_empty() {
            return Err(LingomuxError::Validation("source video path is required".into()));
        }
        if input_language.trim().is_empty() {
            return Err(LingomuxError::Validation("input language is required".into()));
        }
        self.components.registry.code(input_language)?;

        let targets = self.components.registry.normalize_targets(target_languages);
        let job = Job::new(source_path, &input_language.trim().to_lowercase(), targets);
        self.components.jobs.create(&job).await?;

        info!(
            "Job {} submitted: {} ({} -> {:?})",
            job.id,
            job.source_path.display(),
            job.input_language,
            job.target_languages
        );
        Ok(job)
    }

    pub async fn find_job(&self, job_id: &JobId) -> Result<Job> {
        self.components
            .jobs
            .find(job_id)
            .await?
            .ok_or_else(|| LingomuxError::NotFound(format!("job {}", job_id)))
    }

    /// Run every remaining stage of the job
    pub async fn run(&self, job_id: &JobId) -> Result<Job> {
        self.run_observed(job_id, |_, _| {}).await
    }

    /// Like [`run`](Self::run), calling `observer` before each stage starts
    pub async fn run_observed<F>(&self, job_id: &JobId, observer: F) -> Result<Job>
    where
        F: Fn(&Job, PipelineStage) + Send + Sync,
    {
        let _claim = self.claim(job_id)?;
        let job = self.find_job(job_id).await?;
        self.drive(job, observer).await
    }

    /// Restart a failed job from the stage that failed
    pub async fn resume(&self, job_id: &JobId) -> Result<Job> {
        let _claim = self.claim(job_id)?;
        let mut job = self.find_job(job_id).await?;

        if job.status == JobStatus::Failed {
            let stage = job
                .failure
                .as_ref()
                .map(|failure| failure.stage)
                .unwrap_or(PipelineStage::ExtractAudio);
            info!("Job {}: resuming from stage {}", job.id, stage);

            job.failure = None;
            job.advance(stage.requires());
            self.components.jobs.update(&job).await?;
        }

        self.drive(job, |_, _| {}).await
    }

    async fn drive<F>(&self, mut job: Job, observer: F) -> Result<Job>
    where
        F: Fn(&Job, PipelineStage) + Send + Sync,
    {
        match job.status {
            JobStatus::Muxed => {
                info!("Job {} is already complete", job.id);
                return Ok(job);
            }
            JobStatus::Failed => {
                let stage = job.failure.as_ref().map(|f| f.stage.as_str()).unwrap_or("unknown");
                return Err(LingomuxError::Validation(format!(
                    "job {} failed at stage {}; resume it instead",
                    job.id, stage
                )));
            }
            _ => {}
        }

        while let Some(stage) = PipelineStage::after(job.status) {
            observer(&job, stage);
            info!("Job {}: running stage {}", job.id, stage);

            if let Err(e) = self.run_stage(stage, &mut job).await {
                error!("Job {}: stage {} failed: {}", job.id, stage, e);
                if let LingomuxError::Engine { diagnostics, .. } = &e {
                    if !diagnostics.is_empty() {
                        error!("Job {}: diagnostics:\n{}", job.id, diagnostics);
                    }
                }
                return Err(self.fail(&mut job, stage, e).await);
            }

            job.advance(stage.completes());
            match self.components.jobs.update(&job).await {
                Ok(true) => {}
                Ok(false) => {
                    return Err(LingomuxError::NotFound(format!("job {}", job.id)).at_stage(stage));
                }
                Err(e) => {
                    error!("Job {}: could not save result of stage {}: {}", job.id, stage, e);
                    return Err(self.fail(&mut job, stage, e).await);
                }
            }
        }

        info!(
            "Job {} finished: {}",
            job.id,
            job.output_path.as_ref().map(|p| p.display().to_string()).unwrap_or_default()
        );
        Ok(job)
    }

    /// Record `stage` as failed on the job (best effort) and tag the error with it
    async fn fail(&self, job: &mut Job, stage: PipelineStage, e: LingomuxError) -> LingomuxError {
        job.mark_failed(stage, e.to_string());
        if let Err(save_err) = self.components.jobs.update(job).await {
            error!("Job {}: could not record failure: {}", job.id, save_err);
        }
        e.at_stage(stage)
    }

    /// Add the auxiliary language to the job's targets when missing
    pub fn ensure_auxiliary_language(&self, job: &mut Job) -> bool {
        let Some(auxiliary) = self.components.auxiliary_language.as_deref() else {
            return false;
        };
        let registry = &self.components.registry;
        if job
            .target_languages
            .iter()
            .any(|target| registry.same_language(target, auxiliary))
        {
            return false;
        }
        job.target_languages.push(auxiliary.trim().to_lowercase());
        true
    }

    fn claim(&self, job_id: &JobId) -> Result<ActiveJob<'_>> {
        let mut active = self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !active.insert(job_id.clone()) {
            return Err(LingomuxError::Validation(format!("job {} is already running", job_id)));
        }
        Ok(ActiveJob {
            id: job_id.clone(),
            active: &self.active,
        })
    }

    async fn run_stage(&self, stage: PipelineStage, job: &mut Job) -> Result<()> {
        match stage {
            PipelineStage::ExtractAudio => {
                if self.ensure_auxiliary_language(job) {
                    info!("Job {}: added auxiliary language to targets {:?}", job.id, job.target_languages);
                }
                let audio = self.components.extractor.extract(job).await?;
                job.audio = Some(audio);
            }
            PipelineStage::Transcribe => {
                let audio = job
                    .audio
                    .clone()
                    .ok_or_else(|| LingomuxError::Validation(format!("job {} has no audio track", job.id)))?;
                let transcript = self.components.recognizer.recognize(&audio).await?;
                self.save_transcript(transcript).await?;
            }
            PipelineStage::Translate => {
                let source = self.source_transcript(job).await?;
                self.components
                    .translator
                    .translate_transcription_to_multiple_languages(&source, &job.target_languages)
                    .await?;
            }
            PipelineStage::Format => {
                let transcripts = self.ordered_transcripts(job).await?;
                let saved = self.components.formatter.batch_save(&transcripts).await;
                let formatted = saved.iter().flatten().count();
                if formatted == 0 {
                    return Err(LingomuxError::Validation(format!(
                        "job {}: no subtitle file could be written",
                        job.id
                    )));
                }
                if formatted < transcripts.len() {
                    warn!("Job {}: {} of {} subtitle file(s) written", job.id, formatted, transcripts.len());
                }
            }
            PipelineStage::Mux => {
                let tracks: Vec<SubtitleTrack> = self
                    .ordered_transcripts(job)
                    .await?
                    .iter()
                    .filter_map(Transcript::subtitle_track)
                    .collect();
                let output = self
                    .components
                    .multiplexer
                    .mux(&job.id, &job.source_path, &tracks)
                    .await?;
                job.output_path = Some(output);
                job.processed = true;
            }
        }
        Ok(())
    }

    async fn source_transcript(&self, job: &Job) -> Result<Transcript> {
        let filter = TranscriptFilter::for_job_language(&job.id, &job.input_language);
        self.components
            .transcripts
            .find_where(&filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LingomuxError::NotFound(format!("{} transcript for job {}", job.input_language, job.id)))
    }

    async fn save_transcript(&self, mut transcript: Transcript) -> Result<Transcript> {
        let filter = TranscriptFilter::for_job_language(&transcript.job_id, &transcript.target_language);
        match self.components.transcripts.find_where(&filter).await?.into_iter().next() {
            Some(existing) => {
                transcript.id = existing.id;
                self.components.transcripts.update(&transcript).await?;
            }
            None => {
                self.components.transcripts.create(&transcript).await?;
            }
        }
        Ok(transcript)
    }

    /// Job transcripts in subtitle stream order: source language, then targets as requested
    async fn ordered_transcripts(&self, job: &Job) -> Result<Vec<Transcript>> {
        let mut remaining = self
            .components
            .transcripts
            .find_where(&TranscriptFilter::for_job(&job.id))
            .await?;
        let registry = &self.components.registry;

        let mut ordered = Vec::with_capacity(remaining.len());
        for language in std::iter::once(&job.input_language).chain(job.target_languages.iter()) {
            if let Some(index) = remaining
                .iter()
                .position(|t| registry.same_language(&t.target_language, language))
            {
                ordered.push(remaining.remove(index));
            }
        }
        Ok(ordered)
    }
}
