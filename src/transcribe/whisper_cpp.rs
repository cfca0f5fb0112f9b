use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::audio;
use crate::config::TranscriberConfig;
use crate::error::{LingomuxError, Result};
use super::{RecognizedSegment, RecognizedSpeech, SpeechRecognitionEngine};

// whisper-cli -oj output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppOutput {
    #[serde(default)]
    pub result: Option<WhisperCppResult>,
    pub transcription: Vec<WhisperCppSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppResult {
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppSegment {
    pub offsets: WhisperCppOffsets,
    pub text: String,
}

/// Milliseconds from the start of the input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppOffsets {
    pub from: i64,
    pub to: i64,
}

impl From<WhisperCppOutput> for RecognizedSpeech {
    fn from(output: WhisperCppOutput) -> Self {
        let segments: Vec<RecognizedSegment> = output
            .transcription
            .into_iter()
            .map(|seg| RecognizedSegment {
                start: seg.offsets.from as f64 / 1000.0,
                end: seg.offsets.to as f64 / 1000.0,
                text: seg.text.trim().to_string(),
            })
            .filter(|seg| !seg.text.is_empty())
            .collect();

        let text = segments
            .iter()
            .map(|seg| seg.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Self { text, segments }
    }
}

/// Accelerator allocation failures reported on stderr
fn is_memory_exhaustion(stderr: &str) -> bool {
    let lowered = stderr.to_lowercase();
    ["out of memory", "failed to allocate", "cudamalloc", "cuda error 2", "ggml_backend_alloc"]
        .iter()
        .any(|needle| lowered.contains(needle))
}

/// whisper.cpp command line engine
pub struct WhisperCppEngine {
    config: TranscriberConfig,
    use_gpu: AtomicBool,
}

impl WhisperCppEngine {
    pub fn new(config: TranscriberConfig) -> Self {
        let use_gpu = AtomicBool::new(config.use_gpu);
        Self { config, use_gpu }
    }

    pub fn uses_gpu(&self) -> bool {
        self.use_gpu.load(Ordering::SeqCst)
    }

    fn command(&self, wav: &std::path::Path, output_base: &std::path::Path, language: &str) -> Command {
        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg("-oj")
            .arg("-of")
            .arg(output_base)
            .arg("-m")
            .arg(&self.config.model_path)
            .arg("-f")
            .arg(wav)
            .arg("-l")
            .arg(language)
            .arg("-t")
            .arg(self.config.threads.to_string());

        if !self.uses_gpu() {
            cmd.arg("-ng");
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl SpeechRecognitionEngine for WhisperCppEngine {
    async fn transcribe(&self, samples: &[f32], sample_rate: u32, language: &str) -> Result<RecognizedSpeech> {
        let temp_dir = tempfile::tempdir()?;
        let wav = temp_dir.path().join("input.wav");
        let output_base = temp_dir.path().join("transcript");
        let output_path = temp_dir.path().join("transcript.json");

        let owned = samples.to_vec();
        let wav_path = wav.clone();
        tokio::task::spawn_blocking(move || audio::write_wav(&wav_path, &owned, sample_rate))
            .await
            .map_err(|e| LingomuxError::engine(format!("WAV writer task failed: {}", e), String::new()))??;

        let mut cmd = self.command(&wav, &output_base, language);
        debug!("Executing whisper command: {:?}", cmd);

        let timeout = self.config.timeout();
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| {
                LingomuxError::engine(
                    format!("Failed to execute {}: {}", self.config.binary_path, e),
                    String::new(),
                )
            })?,
            Err(_) => {
                return Err(LingomuxError::engine(
                    format!("whisper timed out after {}s", timeout.as_secs()),
                    String::new(),
                ));
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            if is_memory_exhaustion(&stderr) {
                return Err(LingomuxError::ResourceExhaustion(format!(
                    "whisper ran out of memory (gpu: {})",
                    self.uses_gpu()
                )));
            }
            return Err(LingomuxError::engine(
                format!("whisper failed with {}", output.status),
                stderr,
            ));
        }

        let json_content = tokio::fs::read_to_string(&output_path).await.map_err(|e| {
            LingomuxError::engine(format!("Failed to read transcription output: {}", e), stderr.clone())
        })?;

        let whisper_output: WhisperCppOutput = serde_json::from_str(&json_content).map_err(|e| {
            LingomuxError::engine(
                format!("Failed to parse transcription JSON: {}", e),
                json_content.chars().take(500).collect::<String>(),
            )
        })?;

        if let Some(result) = &whisper_output.result {
            debug!("whisper reported language {}", result.language);
        }

        Ok(RecognizedSpeech::from(whisper_output))
    }

    fn degrade(&self) -> bool {
        let was_gpu = self.use_gpu.swap(false, Ordering::SeqCst);
        if was_gpu {
            info!("whisper falling back to CPU");
        } else {
            warn!("whisper is already running on CPU");
        }
        was_gpu
    }
}
