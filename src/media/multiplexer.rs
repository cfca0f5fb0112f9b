use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

use crate::error::{LingomuxError, Result};
use crate::language::LanguageRegistry;
use crate::models::{JobId, SubtitleTrack};
use super::{MediaTool, MuxTrack};

/// Combines the source video with the formatted subtitle tracks.
///
/// The tool writes into a hidden sibling of the final path; the file is
/// renamed into place only after the tool succeeds and is removed otherwise,
/// so the final path never holds a partial container.
pub struct SubtitleMultiplexer {
    tool: Arc<dyn MediaTool>,
    registry: Arc<LanguageRegistry>,
    processed_dir: PathBuf,
}

impl SubtitleMultiplexer {
    pub fn new(tool: Arc<dyn MediaTool>, registry: Arc<LanguageRegistry>, processed_dir: PathBuf) -> Self {
        Self {
            tool,
            registry,
            processed_dir,
        }
    }

    pub fn output_path_for(&self, job_id: &JobId) -> PathBuf {
        self.processed_dir.join(format!("video_subtitled_{}.mkv", job_id))
    }

    /// Tag each subtitle file with its language code and display name, keeping order
    pub fn mux_tracks(&self, subtitles: &[SubtitleTrack]) -> Result<Vec<MuxTrack>> {
        subtitles
            .iter()
            .map(|track| {
                Ok(MuxTrack {
                    language_code: self.registry.code(&track.language)?.to_string(),
                    title: self.registry.display_name(&track.language),
                    path: track.path.clone(),
                })
            })
            .collect()
    }

    /// Mux into the job's output path under the processed directory
    pub async fn mux(&self, job_id: &JobId, video: &Path, subtitles: &[SubtitleTrack]) -> Result<PathBuf> {
        if subtitles.is_empty() {
            return Err(LingomuxError::Validation(format!("job {} has no subtitle tracks to mux", job_id)));
        }
        let output = self.mux_to(video, subtitles, &self.output_path_for(job_id)).await?;
        info!("Job {}: output written to {}", job_id, output.display());
        Ok(output)
    }

    /// Mux into `output`; the final path only ever holds a complete container
    pub async fn mux_to(&self, video: &Path, subtitles: &[SubtitleTrack], output: &Path) -> Result<PathBuf> {
        if subtitles.is_empty() {
            return Err(LingomuxError::Validation("no subtitle tracks to mux".into()));
        }
        if !video.is_file() {
            return Err(LingomuxError::NotFound(format!("video file {}", video.display())));
        }
        for track in subtitles {
            if !track.path.is_file() {
                return Err(LingomuxError::NotFound(format!(
                    "{} subtitle file {}",
                    track.language,
                    track.path.display()
                )));
            }
        }
        match output.parent() {
            Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
                return Err(LingomuxError::Validation(format!(
                    "output directory {} does not exist",
                    dir.display()
                )));
            }
            _ => {}
        }

        let tracks = self.mux_tracks(subtitles)?;
        let partial = partial_path(output);

        match self.tool.mux(video, &tracks, &partial).await {
            Ok(_) => {
                fs::rename(&partial, output).await?;
                info!(
                    "Muxed {} subtitle stream(s) into {}",
                    tracks.len(),
                    output.display()
                );
                Ok(output.to_path_buf())
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&partial).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!("Could not remove partial output {}: {}", partial.display(), cleanup);
                    }
                }
                Err(e)
            }
        }
    }
}

/// `dir/name.ext` -> `dir/.name.partial.ext`; the extension still selects the container
fn partial_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!(".{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!(".{}.partial", stem),
    };
    output.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaTool;
    use assert_fs::prelude::*;

    fn subtitles(dir: &assert_fs::TempDir) -> Vec<SubtitleTrack> {
        ["french", "arabic", "english"]
            .iter()
            .map(|lang| {
                let file = dir.child(format!("job_{}.vtt", lang));
                file.write_str("WEBVTT\n\n").unwrap();
                SubtitleTrack {
                    language: lang.to_string(),
                    path: file.path().to_path_buf(),
                }
            })
            .collect()
    }

    #[test]
    fn partial_path_keeps_extension() {
        let partial = partial_path(Path::new("/out/video_subtitled_job_1.mkv"));
        assert_eq!(partial, PathBuf::from("/out/.video_subtitled_job_1.partial.mkv"));
    }

    #[tokio::test]
    async fn success_renames_into_place_with_ordered_tags() {
        let dir = assert_fs::TempDir::new().unwrap();
        let video = dir.child("in.mp4");
        video.write_binary(b"video").unwrap();
        let subs = subtitles(&dir);

        let mut tool = MockMediaTool::new();
        tool.expect_mux()
            .withf(|_, tracks, output| {
                let codes: Vec<&str> = tracks.iter().map(|t| t.language_code.as_str()).collect();
                let titles: Vec<&str> = tracks.iter().map(|t| t.title.as_str()).collect();
                codes == ["fr", "ar", "en"]
                    && titles == ["French", "Arabic", "English"]
                    && output.to_string_lossy().contains(".partial.")
            })
            .times(1)
            .returning(|_, _, output| {
                std::fs::write(output, b"mkv").unwrap();
                Ok(output.to_path_buf())
            });

        let job_id = JobId::from("job_1");
        let muxer = SubtitleMultiplexer::new(Arc::new(tool), Arc::new(LanguageRegistry::new()), dir.path().to_path_buf());
        let output = muxer.mux(&job_id, video.path(), &subs).await.unwrap();

        assert_eq!(output, dir.path().join("video_subtitled_job_1.mkv"));
        assert_eq!(std::fs::read(&output).unwrap(), b"mkv");
        assert!(!partial_path(&output).exists());
    }

    #[tokio::test]
    async fn failure_removes_partial_output() {
        let dir = assert_fs::TempDir::new().unwrap();
        let video = dir.child("in.mp4");
        video.write_binary(b"video").unwrap();
        let subs = subtitles(&dir);

        let mut tool = MockMediaTool::new();
        tool.expect_mux().times(1).returning(|_, _, output| {
            std::fs::write(output, b"half").unwrap();
            Err(LingomuxError::engine("Subtitle multiplexing failed", "Invalid data found"))
        });

        let job_id = JobId::from("job_2");
        let muxer = SubtitleMultiplexer::new(Arc::new(tool), Arc::new(LanguageRegistry::new()), dir.path().to_path_buf());
        let err = muxer.mux(&job_id, video.path(), &subs).await.unwrap_err();

        match err {
            LingomuxError::Engine { diagnostics, .. } => assert_eq!(diagnostics, "Invalid data found"),
            other => panic!("unexpected error: {other}"),
        }
        let output = muxer.output_path_for(&job_id);
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }

    #[tokio::test]
    async fn unknown_language_fails_before_running_tool() {
        let dir = assert_fs::TempDir::new().unwrap();
        let video = dir.child("in.mp4");
        video.write_binary(b"video").unwrap();
        let sub = dir.child("job_klingon.vtt");
        sub.write_str("WEBVTT\n\n").unwrap();

        let tool = MockMediaTool::new();
        let muxer = SubtitleMultiplexer::new(Arc::new(tool), Arc::new(LanguageRegistry::new()), dir.path().to_path_buf());
        let tracks = vec![SubtitleTrack {
            language: "klingon".into(),
            path: sub.path().to_path_buf(),
        }];

        let err = muxer.mux(&JobId::from("job_3"), video.path(), &tracks).await.unwrap_err();
        assert!(matches!(err, LingomuxError::UnsupportedLanguage(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_tool_run_leaves_nothing_at_explicit_output() {
        use crate::config::{Config, MediaConfig};
        use crate::media::FfmpegProcessor;
        use std::os::unix::fs::PermissionsExt;

        let dir = assert_fs::TempDir::new().unwrap();
        let video = dir.child("in.mp4");
        video.write_binary(b"video").unwrap();
        let subs = subtitles(&dir);

        // writes its output argument, then fails like a broken encode
        let script = dir.child("ffmpeg");
        script
            .write_str("#!/bin/sh\nfor last; do :; done\nprintf half > \"$last\"\necho 'Invalid data found' >&2\nexit 1\n")
            .unwrap();
        std::fs::set_permissions(script.path(), std::fs::Permissions::from_mode(0o755)).unwrap();

        let processor = FfmpegProcessor::new(&MediaConfig {
            binary_path: script.path().to_string_lossy().to_string(),
            ..Config::default().media
        });
        let muxer = SubtitleMultiplexer::new(Arc::new(processor), Arc::new(LanguageRegistry::new()), dir.path().to_path_buf());

        let output = dir.child("out").child("talk.mkv");
        dir.child("out").create_dir_all().unwrap();
        let err = muxer.mux_to(video.path(), &subs, output.path()).await.unwrap_err();

        match err {
            LingomuxError::Engine { diagnostics, .. } => assert!(diagnostics.contains("Invalid data found")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!output.path().exists());
        assert!(!partial_path(output.path()).exists());
    }

    #[tokio::test]
    async fn explicit_output_directory_must_exist() {
        let dir = assert_fs::TempDir::new().unwrap();
        let video = dir.child("in.mp4");
        video.write_binary(b"video").unwrap();
        let subs = subtitles(&dir);

        let muxer = SubtitleMultiplexer::new(
            Arc::new(MockMediaTool::new()),
            Arc::new(LanguageRegistry::new()),
            dir.path().to_path_buf(),
        );
        let err = muxer
            .mux_to(video.path(), &subs, &dir.path().join("missing").join("out.mkv"))
            .await
            .unwrap_err();
        assert!(matches!(err, LingomuxError::Validation(_)));
    }
}
