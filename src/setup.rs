use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs as async_fs;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{LingomuxError, Result};
use crate::media::MediaCommand;

/// On-disk layout used by a running pipeline
#[derive(Debug, Clone)]
pub struct Workspace {
    pub audios_dir: PathBuf,
    pub transcriptions_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub store_path: PathBuf,
}

impl Workspace {
    /// Create every configured directory if it does not exist yet
    pub async fn prepare(config: &Config) -> Result<Self> {
        let workspace = Self {
            audios_dir: config.paths.audios_dir(),
            transcriptions_dir: config.paths.transcriptions_dir(),
            processed_dir: config.paths.processed_dir(),
            upload_dir: config.paths.upload_dir(),
            store_path: config.paths.store_path(),
        };

        let mut dirs = vec![
            workspace.audios_dir.clone(),
            workspace.transcriptions_dir.clone(),
            workspace.processed_dir.clone(),
            workspace.upload_dir.clone(),
        ];
        if let Some(parent) = workspace.store_path.parent() {
            dirs.push(parent.to_path_buf());
        }

        for dir in dirs {
            if dir.as_os_str().is_empty() {
                continue;
            }
            async_fs::create_dir_all(&dir).await.map_err(|e| {
                LingomuxError::Config(format!("Failed to create directory {}: {}", dir.display(), e))
            })?;
        }

        info!("Workspace ready under {}", config.paths.data_dir.display());
        Ok(workspace)
    }

    /// Copy an uploaded video into the upload directory under a unique name
    pub async fn store_upload(&self, video: &Path) -> Result<PathBuf> {
        if !video.is_file() {
            return Err(LingomuxError::NotFound(format!("video file {}", video.display())));
        }

        let extension = video
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let video_id = uuid::Uuid::new_v4().simple().to_string();
        let stored = self
            .upload_dir
            .join(format!("uploaded_video_{}{}", &video_id[..8], extension));

        async_fs::copy(video, &stored).await?;
        info!("Stored upload {} as {}", video.display(), stored.display());
        Ok(stored)
    }
}

/// Upper bound for a startup dependency check
pub const BINARY_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Fail early when an external binary is not runnable
pub async fn check_binary(binary: &str, check_flag: &str, timeout: Duration) -> Result<()> {
    MediaCommand::new(binary, format!("{} availability check", binary))
        .arg(check_flag)
        .execute(timeout)
        .await
        .map(|_| ())
        .inspect_err(|e| warn!("{} is not usable: {}", binary, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prepare_creates_all_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.data_dir = dir.path().to_path_buf();

        let workspace = Workspace::prepare(&config).await.unwrap();

        assert!(workspace.audios_dir.is_dir());
        assert!(workspace.transcriptions_dir.is_dir());
        assert!(workspace.processed_dir.is_dir());
        assert!(workspace.upload_dir.is_dir());
        assert!(workspace.store_path.parent().unwrap().is_dir());
    }

    #[tokio::test]
    async fn store_upload_keeps_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.data_dir = dir.path().to_path_buf();
        let workspace = Workspace::prepare(&config).await.unwrap();

        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"not really a video").unwrap();

        let stored = workspace.store_upload(&video).await.unwrap();
        assert_eq!(stored.extension().unwrap(), "mp4");
        assert!(stored.starts_with(&workspace.upload_dir));
        assert_eq!(std::fs::read(&stored).unwrap(), b"not really a video");
    }

    #[tokio::test]
    async fn store_upload_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.data_dir = dir.path().to_path_buf();
        let workspace = Workspace::prepare(&config).await.unwrap();

        let err = workspace.store_upload(&dir.path().join("missing.mp4")).await.unwrap_err();
        assert!(matches!(err, LingomuxError::NotFound(_)));
    }

    #[tokio::test]
    async fn check_binary_reports_missing_tool() {
        let err = check_binary("/nonexistent/whisper-cli", "--help", BINARY_CHECK_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, LingomuxError::Engine { .. }));
    }

    #[tokio::test]
    async fn check_binary_gives_up_after_timeout() {
        let err = check_binary("sleep", "5", Duration::from_millis(100)).await.unwrap_err();
        match err {
            LingomuxError::Engine { message, .. } => assert!(message.contains("timed out")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn check_binary_accepts_runnable_tool() {
        check_binary("true", "--version", BINARY_CHECK_TIMEOUT).await.unwrap();
    }
}
