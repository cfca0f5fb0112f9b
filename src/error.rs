use thiserror::Error;

use crate::models::PipelineStage;

#[derive(Error, Debug)]
pub enum LingomuxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WAV decoding error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Engine failure: {message}")]
    Engine {
        message: String,
        /// Captured stderr/stdout or response body of the failing tool
        diagnostics: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Resource exhaustion: {0}")]
    ResourceExhaustion(String),

    #[error("Stage {stage} failed: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: Box<LingomuxError>,
    },
}

impl LingomuxError {
    pub fn engine<M: Into<String>, D: Into<String>>(message: M, diagnostics: D) -> Self {
        Self::Engine {
            message: message.into(),
            diagnostics: diagnostics.into(),
        }
    }

    /// Wrap an error with the stage that raised it. Already tagged errors keep their stage.
    pub fn at_stage(self, stage: PipelineStage) -> Self {
        match self {
            tagged @ Self::Stage { .. } => tagged,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_resource_exhaustion(&self) -> bool {
        match self {
            Self::ResourceExhaustion(_) => true,
            Self::Stage { source, .. } => source.is_resource_exhaustion(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LingomuxError>;
