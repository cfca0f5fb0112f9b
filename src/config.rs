use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{Result, LingomuxError};

// Defaults for fields that older config files may not carry
fn default_token_budget() -> usize {
    512
}

fn default_cache_capacity() -> usize {
    8
}

fn default_max_concurrent_jobs() -> usize {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    pub media: MediaConfig,
    pub transcriber: TranscriberConfig,
    pub translate: TranslateConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory; relative paths below are resolved against it
    pub data_dir: PathBuf,
    pub audios_dir: PathBuf,
    pub transcriptions_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub upload_dir: PathBuf,
    /// JSON document holding jobs and transcripts
    pub store_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Upper bound for a single extraction or multiplex run
    pub timeout_secs: u64,
    pub audio_format: String,
    pub sample_rate: u32,
    pub bitrate: String,
    /// Extraction start offset (ffmpeg time syntax)
    pub start: String,
    /// Optional extraction duration (ffmpeg time syntax)
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Path to whisper.cpp binary (whisper-cli)
    pub binary_path: String,
    /// ggml model file used for recognition
    pub model_path: String,
    pub timeout_secs: u64,
    pub threads: u32,
    /// Start on the accelerator; exhaustion falls back to CPU once
    pub use_gpu: bool,
    /// Rate the recognizer expects its samples in
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Ollama endpoint URL
    pub endpoint: String,
    /// LLM model to use for translation
    pub model: String,
    pub request_timeout_secs: u64,
    /// Maximum tokens per inference call before text is segmented
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
    /// Number of language pairs kept loaded at once
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Always added to a job's targets (used for downstream summarization)
    pub auxiliary_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                data_dir: PathBuf::from(".lingomux"),
                audios_dir: PathBuf::from("audios"),
                transcriptions_dir: PathBuf::from("transcriptions"),
                processed_dir: PathBuf::from("processed"),
                upload_dir: PathBuf::from("uploads"),
                store_path: PathBuf::from("db/lingomux.json"),
            },
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                timeout_secs: 3600,
                audio_format: "wav".to_string(),
                sample_rate: 16000,
                bitrate: "192k".to_string(),
                start: "00:00:00".to_string(),
                duration: None,
            },
            transcriber: TranscriberConfig {
                binary_path: "whisper-cli".to_string(),
                model_path: ".lingomux/models/ggml-small.bin".to_string(),
                timeout_secs: 7200,
                threads: 4,
                use_gpu: true,
                sample_rate: 16000,
            },
            translate: TranslateConfig {
                endpoint: "http://localhost:11434".to_string(),
                model: "llama3.2:3b".to_string(),
                request_timeout_secs: 300,
                token_budget: default_token_budget(),
                cache_capacity: default_cache_capacity(),
                auxiliary_language: "english".to_string(),
            },
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LingomuxError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| LingomuxError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| LingomuxError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| LingomuxError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Apply `LINGOMUX_*` environment variables on top of the file values
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("LINGOMUX_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(value);
        }
        if let Some(value) = get("LINGOMUX_AUDIOS_DIR") {
            self.paths.audios_dir = PathBuf::from(value);
        }
        if let Some(value) = get("LINGOMUX_TRANSCRIPTIONS_DIR") {
            self.paths.transcriptions_dir = PathBuf::from(value);
        }
        if let Some(value) = get("LINGOMUX_PROCESSED_VID_DIR") {
            self.paths.processed_dir = PathBuf::from(value);
        }
        if let Some(value) = get("LINGOMUX_UPLOAD_DIR") {
            self.paths.upload_dir = PathBuf::from(value);
        }
        if let Some(value) = get("LINGOMUX_DB_PATH") {
            self.paths.store_path = PathBuf::from(value);
        }
        if let Some(value) = get("LINGOMUX_FFMPEG") {
            self.media.binary_path = value;
        }
        if let Some(value) = get("LINGOMUX_WHISPER") {
            self.transcriber.binary_path = value;
        }
        if let Some(value) = get("LINGOMUX_OLLAMA_ENDPOINT") {
            self.translate.endpoint = value;
        }
    }
}

impl PathsConfig {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn audios_dir(&self) -> PathBuf {
        self.resolve(&self.audios_dir)
    }

    pub fn transcriptions_dir(&self) -> PathBuf {
        self.resolve(&self.transcriptions_dir)
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.resolve(&self.processed_dir)
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.resolve(&self.upload_dir)
    }

    pub fn store_path(&self) -> PathBuf {
        self.resolve(&self.store_path)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("log")
    }
}

impl MediaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl TranscriberConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::default().save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.translate.token_budget, 512);
        assert_eq!(loaded.translate.auxiliary_language, "english");
        assert_eq!(loaded.media.sample_rate, 16000);
    }

    #[test]
    fn relative_paths_resolve_against_data_dir() {
        let mut config = Config::default();
        config.paths.data_dir = PathBuf::from("/srv/lingomux");
        config.paths.processed_dir = PathBuf::from("/mnt/videos");

        assert_eq!(config.paths.audios_dir(), PathBuf::from("/srv/lingomux/audios"));
        assert_eq!(config.paths.processed_dir(), PathBuf::from("/mnt/videos"));
    }

    #[test]
    fn env_overrides_replace_values() {
        let vars: HashMap<&str, &str> = [
            ("LINGOMUX_DATA_DIR", "/data"),
            ("LINGOMUX_FFMPEG", "/opt/ffmpeg/bin/ffmpeg"),
            ("LINGOMUX_WHISPER", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.paths.data_dir, PathBuf::from("/data"));
        assert_eq!(config.media.binary_path, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.transcriber.binary_path, "whisper-cli");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = Config::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, LingomuxError::Config(_)));
    }
}
