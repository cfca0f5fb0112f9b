// Media tool boundary
//
// Everything that shells out to the media tool lives here:
// - Commands: argument builders and timeout-bounded execution
// - Processor: the ffmpeg-backed MediaTool
// - Extractor / Multiplexer: the two pipeline stages built on MediaTool

pub mod commands;
pub mod extractor;
pub mod multiplexer;
pub mod processor;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use commands::*;
pub use extractor::MediaExtractor;
pub use multiplexer::SubtitleMultiplexer;
pub use processor::FfmpegProcessor;

use crate::config::MediaConfig;
use crate::error::Result;

/// Parameters of one audio extraction run
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    /// Start offset in the tool's time syntax
    pub start: String,
    pub duration: Option<String>,
    pub format: String,
    pub sample_rate: u32,
    pub bitrate: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            start: "00:00:00".to_string(),
            duration: None,
            format: "wav".to_string(),
            sample_rate: 16000,
            bitrate: "192k".to_string(),
        }
    }
}

impl From<&MediaConfig> for ExtractOptions {
    fn from(config: &MediaConfig) -> Self {
        Self {
            start: config.start.clone(),
            duration: config.duration.clone(),
            format: config.audio_format.clone(),
            sample_rate: config.sample_rate,
            bitrate: config.bitrate.clone(),
        }
    }
}

/// One subtitle stream to add to the output container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxTrack {
    pub language_code: String,
    /// Human-readable stream title
    pub title: String,
    pub path: PathBuf,
}

/// External media tool
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Write the first audio stream of `input` to `output`
    async fn extract_audio(&self, input: &Path, output: &Path, options: &ExtractOptions) -> Result<PathBuf>;

    /// Stream-copy `video` plus one subtitle stream per track, in slice order
    async fn mux(&self, video: &Path, tracks: &[MuxTrack], output: &Path) -> Result<PathBuf>;
}
