use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::error::{LingomuxError, Result};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the whole pipeline on one or more videos
    Process {
        /// Input video file (repeat for several jobs)
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        /// Spoken language of the video
        #[arg(short = 'l', long)]
        input_language: String,

        /// Target languages for translation (comma-separated)
        #[arg(short, long, default_value = "english")]
        target_langs: String,
    },

    /// Re-run a failed job from the stage that failed
    Resume {
        /// Job id
        #[arg(short, long)]
        job: String,
    },

    /// List persisted jobs
    Jobs {
        /// Only jobs in this status (e.g. FAILED, muxed)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Extract the first audio track of a video
    Extract {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output audio file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a WebVTT file from a JSON chunk list
    Format {
        /// JSON file: [{"timestamp": [start, end], "text": "..."}]
        #[arg(short, long)]
        input: PathBuf,

        /// Output VTT file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Add subtitle files to a video as stream-copied subtitle tracks
    Mux {
        /// Input video file
        #[arg(long)]
        video: PathBuf,

        /// Subtitle tracks in stream order, as language=path
        #[arg(short, long = "subtitle", required = true)]
        subtitles: Vec<String>,

        /// Output container
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the supported languages
    Languages,
}

/// Split a comma-separated language list, dropping blanks
pub fn parse_languages(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `language=path`
pub fn parse_subtitle_arg(arg: &str) -> Result<(String, PathBuf)> {
    match arg.split_once('=') {
        Some((language, path)) if !language.trim().is_empty() && !path.trim().is_empty() => {
            Ok((language.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => Err(LingomuxError::Validation(format!(
            "subtitle '{}' must look like language=path",
            arg
        ))),
    }
}
