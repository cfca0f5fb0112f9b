use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{LingomuxError, Result};
use super::{ExtractOptions, MediaCommandBuilder, MediaTool, MuxTrack};

/// ffmpeg-backed media tool
pub struct FfmpegProcessor {
    command_builder: MediaCommandBuilder,
    timeout: Duration,
}

impl FfmpegProcessor {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            command_builder: MediaCommandBuilder::new(&config.binary_path),
            timeout: config.timeout(),
        }
    }

    /// First line of `ffmpeg -version`
    pub async fn version_info(&self) -> Result<String> {
        let output = self.command_builder.version_check().execute(self.timeout).await?;
        Ok(output
            .stdout
            .lines()
            .next()
            .unwrap_or("Unknown version")
            .to_string())
    }
}

#[async_trait]
impl MediaTool for FfmpegProcessor {
    async fn extract_audio(&self, input: &Path, output: &Path, options: &ExtractOptions) -> Result<PathBuf> {
        info!("Extracting audio from {} to {}", input.display(), output.display());

        if !input.is_file() {
            return Err(LingomuxError::NotFound(format!("video file {}", input.display())));
        }

        self.command_builder
            .extract_audio(input, output, options)
            .execute(self.timeout)
            .await?;

        debug!("Audio extraction completed");
        Ok(output.to_path_buf())
    }

    async fn mux(&self, video: &Path, tracks: &[MuxTrack], output: &Path) -> Result<PathBuf> {
        info!(
            "Multiplexing {} subtitle stream(s) into {} -> {}",
            tracks.len(),
            video.display(),
            output.display()
        );

        self.command_builder
            .mux_subtitles(video, tracks, output)
            .execute(self.timeout)
            .await?;

        debug!("Subtitle multiplexing completed");
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_video_is_not_found() {
        let processor = FfmpegProcessor::new(&MediaConfig {
            binary_path: "/nonexistent/ffmpeg".into(),
            ..crate::config::Config::default().media
        });
        let err = processor
            .extract_audio(Path::new("/no/such/video.mp4"), Path::new("/tmp/out.wav"), &ExtractOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LingomuxError::NotFound(_)));
    }

    #[tokio::test]
    async fn unavailable_binary_fails_version_check() {
        let processor = FfmpegProcessor::new(&MediaConfig {
            binary_path: "/nonexistent/ffmpeg".into(),
            ..crate::config::Config::default().media
        });
        assert!(processor.version_info().await.is_err());
    }
}
