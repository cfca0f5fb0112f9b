use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{LingomuxError, Result};
use crate::models::{AudioTrack, Job};
use super::{ExtractOptions, MediaTool};

/// Pulls the audio track out of a job's source video
pub struct MediaExtractor {
    tool: Arc<dyn MediaTool>,
    audios_dir: PathBuf,
    options: ExtractOptions,
}

impl MediaExtractor {
    pub fn new(tool: Arc<dyn MediaTool>, audios_dir: PathBuf, options: ExtractOptions) -> Self {
        Self {
            tool,
            audios_dir,
            options,
        }
    }

    pub async fn extract(&self, job: &Job) -> Result<AudioTrack> {
        if job.input_language.trim().is_empty() {
            return Err(LingomuxError::Validation(format!("job {} has no input language", job.id)));
        }
        if !self.audios_dir.is_dir() {
            return Err(LingomuxError::Validation(format!(
                "audio output directory {} does not exist",
                self.audios_dir.display()
            )));
        }

        let output = self.audios_dir.join(format!(
            "audio_{}_{}.{}",
            Uuid::new_v4().simple(),
            job.id,
            self.options.format
        ));

        let path = self.tool.extract_audio(&job.source_path, &output, &self.options).await?;
        info!("Job {}: audio extracted to {}", job.id, path.display());

        Ok(AudioTrack {
            job_id: job.id.clone(),
            path,
            sample_rate: self.options.sample_rate,
            language: job.input_language.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaTool;
    use std::path::Path;

    #[tokio::test]
    async fn extract_names_audio_after_job() {
        let dir = tempfile::tempdir().unwrap();
        let job = Job::new("/videos/talk.mp4", "french", vec!["english".into()]);

        let mut tool = MockMediaTool::new();
        tool.expect_extract_audio()
            .withf(|input, _, options| input == Path::new("/videos/talk.mp4") && options.sample_rate == 16000)
            .times(1)
            .returning(|_, output, _| Ok(output.to_path_buf()));

        let extractor = MediaExtractor::new(Arc::new(tool), dir.path().to_path_buf(), ExtractOptions::default());
        let track = extractor.extract(&job).await.unwrap();

        assert_eq!(track.job_id, job.id);
        assert_eq!(track.sample_rate, 16000);
        assert_eq!(track.language, "french");
        let name = track.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("audio_"));
        assert!(name.ends_with(&format!("_{}.wav", job.id)));
    }
}
