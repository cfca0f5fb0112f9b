use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::{LingomuxError, Result};
use super::{ExtractOptions, MuxTrack};

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

/// Captured output of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Select an input stream
    pub fn map<S: Into<String>>(self, spec: S) -> Self {
        self.arg("-map").arg(spec)
    }

    /// Copy every mapped stream without re-encoding
    pub fn copy_all(self) -> Self {
        self.arg("-c").arg("copy")
    }

    /// Set a metadata tag on one output stream
    pub fn stream_metadata<S: Into<String>, V: AsRef<str>>(self, stream: S, key: &str, value: V) -> Self {
        self.arg(format!("-metadata:s:{}", stream.into()))
            .arg(format!("{}={}", key, value.as_ref()))
    }

    /// Set audio sample rate
    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    /// Set audio bitrate
    pub fn audio_bitrate<S: Into<String>>(self, bitrate: S) -> Self {
        self.arg("-b:a").arg(bitrate)
    }

    /// Force the output container format
    pub fn format<S: Into<String>>(self, format: S) -> Self {
        self.arg("-f").arg(format)
    }

    /// Execute the command, killing it once `timeout` elapses
    pub async fn execute(&self, timeout: Duration) -> Result<CommandOutput> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| {
                LingomuxError::engine(
                    format!("Failed to execute {}: {}", self.binary_path, e),
                    String::new(),
                )
            })?,
            Err(_) => {
                return Err(LingomuxError::engine(
                    format!("{} timed out after {}s", self.description, timeout.as_secs()),
                    String::new(),
                ));
            }
        };

        let captured = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !output.status.success() {
            return Err(LingomuxError::engine(
                format!("{} failed with {}", self.description, output.status),
                captured.stderr,
            ));
        }

        Ok(captured)
    }
}

/// Builder for the pipeline's ffmpeg invocations
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Build audio extraction command: first audio stream only
    pub fn extract_audio<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        video_path: P,
        audio_path: Q,
        options: &ExtractOptions,
    ) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.binary_path, "Audio extraction")
            .overwrite()
            .arg("-ss")
            .arg(options.start.clone())
            .input(video_path)
            .map("0:a:0")
            .format(options.format.clone())
            .audio_sample_rate(options.sample_rate)
            .audio_bitrate(options.bitrate.clone());

        if let Some(duration) = &options.duration {
            cmd = cmd.arg("-t").arg(duration.clone());
        }

        cmd.output(audio_path)
    }

    /// Build subtitle multiplexing command.
    ///
    /// Input 0 is the video; subtitle file `n` is input `n + 1` and becomes
    /// subtitle stream `n`, in slice order. Everything is stream-copied.
    pub fn mux_subtitles<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        video_path: P,
        tracks: &[MuxTrack],
        output_path: Q,
    ) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.binary_path, "Subtitle multiplexing")
            .overwrite()
            .input(video_path);

        for track in tracks {
            cmd = cmd.input(&track.path);
        }

        cmd = cmd.map("0:v").map("0:a");
        for index in 0..tracks.len() {
            cmd = cmd.map(format!("{}:0", index + 1));
        }

        cmd = cmd.copy_all();
        for (index, track) in tracks.iter().enumerate() {
            cmd = cmd
                .stream_metadata(format!("s:{}", index), "language", &track.language_code)
                .stream_metadata(format!("s:{}", index), "title", &track.title);
        }

        cmd.output(output_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tracks() -> Vec<MuxTrack> {
        vec![
            MuxTrack {
                language_code: "fr".into(),
                title: "French".into(),
                path: PathBuf::from("/subs/job_french.vtt"),
            },
            MuxTrack {
                language_code: "ar".into(),
                title: "Arabic".into(),
                path: PathBuf::from("/subs/job_arabic.vtt"),
            },
            MuxTrack {
                language_code: "en".into(),
                title: "English".into(),
                path: PathBuf::from("/subs/job_english.vtt"),
            },
        ]
    }

    fn pairs_after<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
        args.windows(2)
            .filter(|w| w[0] == flag)
            .map(|w| w[1].as_str())
            .collect()
    }

    #[test]
    fn mux_maps_one_subtitle_stream_per_track_in_order() {
        let builder = MediaCommandBuilder::new("ffmpeg");
        let cmd = builder.mux_subtitles("/videos/in.mp4", &tracks(), "/out/video.mkv");

        assert_eq!(
            pairs_after(&cmd.args, "-i"),
            vec!["/videos/in.mp4", "/subs/job_french.vtt", "/subs/job_arabic.vtt", "/subs/job_english.vtt"]
        );
        assert_eq!(pairs_after(&cmd.args, "-map"), vec!["0:v", "0:a", "1:0", "2:0", "3:0"]);
        assert_eq!(pairs_after(&cmd.args, "-c"), vec!["copy"]);

        assert_eq!(pairs_after(&cmd.args, "-metadata:s:s:0"), vec!["language=fr", "title=French"]);
        assert_eq!(pairs_after(&cmd.args, "-metadata:s:s:1"), vec!["language=ar", "title=Arabic"]);
        assert_eq!(pairs_after(&cmd.args, "-metadata:s:s:2"), vec!["language=en", "title=English"]);
        assert_eq!(cmd.args.last().map(String::as_str), Some("/out/video.mkv"));
    }

    #[test]
    fn extract_audio_honours_options() {
        let builder = MediaCommandBuilder::new("ffmpeg");
        let options = ExtractOptions {
            duration: Some("00:01:00".into()),
            ..ExtractOptions::default()
        };
        let cmd = builder.extract_audio("/videos/in.mp4", "/audio/out.wav", &options);

        assert_eq!(pairs_after(&cmd.args, "-ss"), vec!["00:00:00"]);
        assert_eq!(pairs_after(&cmd.args, "-map"), vec!["0:a:0"]);
        assert_eq!(pairs_after(&cmd.args, "-f"), vec!["wav"]);
        assert_eq!(pairs_after(&cmd.args, "-ar"), vec!["16000"]);
        assert_eq!(pairs_after(&cmd.args, "-b:a"), vec!["192k"]);
        assert_eq!(pairs_after(&cmd.args, "-t"), vec!["00:01:00"]);
        assert_eq!(cmd.args.last().map(String::as_str), Some("/audio/out.wav"));
    }

    #[tokio::test]
    async fn missing_binary_is_an_engine_failure() {
        let cmd = MediaCommand::new("/nonexistent/ffmpeg-binary", "Version check").arg("-version");
        let err = cmd.execute(Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, LingomuxError::Engine { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_is_an_engine_failure() {
        let cmd = MediaCommand::new("sleep", "Slow tool").arg("5");
        let err = cmd.execute(Duration::from_millis(100)).await.unwrap_err();
        match err {
            LingomuxError::Engine { message, .. } => assert!(message.contains("timed out")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_captures_stderr() {
        let cmd = MediaCommand::new("sh", "Failing tool")
            .arg("-c")
            .arg("echo broken pipe >&2; exit 3");
        match cmd.execute(Duration::from_secs(5)).await.unwrap_err() {
            LingomuxError::Engine { diagnostics, .. } => assert!(diagnostics.contains("broken pipe")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
