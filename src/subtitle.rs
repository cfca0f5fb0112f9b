use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{error, info, warn};

use crate::error::{LingomuxError, Result};
use crate::models::{Chunk, JobId, Segment, Timestamp, Transcript};
use crate::store::TranscriptStore;

/// Minimum duration given to a segment whose end is not after its start
pub const MIN_SEGMENT_SECS: f64 = 0.1;

/// Segments that passed validation plus the number of chunks dropped
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidatedChunks {
    pub segments: Vec<Segment>,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveReport {
    pub path: PathBuf,
    pub written: usize,
    pub skipped: usize,
}

/// Format time in seconds to VTT time format (HH:MM:SS.mmm)
pub fn format_vtt_timestamp(seconds: f64) -> String {
    let total_milliseconds = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}

/// Keep well-formed chunks in order. `end <= start` is stretched to `start + 0.1`.
pub fn validate_chunks(chunks: &[Chunk]) -> ValidatedChunks {
    let mut validated = ValidatedChunks::default();

    for (index, chunk) in chunks.iter().enumerate() {
        let (Some(Timestamp(Some(start), Some(end))), Some(text)) = (chunk.timestamp, chunk.text.as_deref()) else {
            warn!("Skipping chunk {}: missing timestamp or text", index);
            validated.skipped += 1;
            continue;
        };
        if !start.is_finite() || !end.is_finite() {
            warn!("Skipping chunk {}: non-numeric timestamp", index);
            validated.skipped += 1;
            continue;
        }

        let end = if end <= start {
            warn!("Chunk {}: end {} not after start {}, using {}", index, end, start, start + MIN_SEGMENT_SECS);
            start + MIN_SEGMENT_SECS
        } else {
            end
        };

        validated.segments.push(Segment {
            start,
            end,
            text: text.trim().to_string(),
        });
    }

    validated
}

pub fn render_vtt(segments: &[Segment]) -> String {
    let mut vtt_content = String::from("WEBVTT\n\n");
    for segment in segments {
        vtt_content.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_vtt_timestamp(segment.start),
            format_vtt_timestamp(segment.end),
            segment.text
        ));
    }
    vtt_content
}

/// Parse a JSON chunk list leniently: entries with a malformed timestamp
/// (not a pair, non-numeric ends) are kept with no timestamp so that
/// validation counts them as skipped.
pub fn chunks_from_json(content: &str) -> Result<Vec<Chunk>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(content)?;
    Ok(values.iter().map(chunk_from_value).collect())
}

fn chunk_from_value(value: &serde_json::Value) -> Chunk {
    let timestamp = match value.get("timestamp").and_then(|ts| ts.as_array()) {
        Some(pair) if pair.len() == 2 => Some(Timestamp(pair[0].as_f64(), pair[1].as_f64())),
        _ => None,
    };
    let text = value.get("text").and_then(|t| t.as_str()).map(str::to_string);
    Chunk { timestamp, text }
}

/// Writes WebVTT files for transcripts
pub struct SubtitleFormatter {
    output_dir: PathBuf,
    transcripts: Arc<dyn TranscriptStore>,
}

impl SubtitleFormatter {
    pub fn new(output_dir: PathBuf, transcripts: Arc<dyn TranscriptStore>) -> Self {
        Self {
            output_dir,
            transcripts,
        }
    }

    pub fn output_path_for(&self, job_id: &JobId, language: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.vtt", job_id, language.trim().to_lowercase()))
    }

    pub async fn save_chunks(&self, chunks: &[Chunk], output_path: &Path) -> Result<SaveReport> {
        if chunks.is_empty() {
            return Err(LingomuxError::Validation("chunk list is empty".into()));
        }
        match output_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
                return Err(LingomuxError::Validation(format!(
                    "output directory {} does not exist",
                    dir.display()
                )));
            }
            _ => {}
        }

        let validated = validate_chunks(chunks);
        if validated.skipped > 0 {
            warn!(
                "{}: skipped {} of {} chunk(s)",
                output_path.display(),
                validated.skipped,
                chunks.len()
            );
        }

        fs::write(output_path, render_vtt(&validated.segments)).await?;
        info!(
            "VTT file generated: {} ({} block(s))",
            output_path.display(),
            validated.segments.len()
        );

        Ok(SaveReport {
            path: output_path.to_path_buf(),
            written: validated.segments.len(),
            skipped: validated.skipped,
        })
    }

    /// Write the transcript's subtitle file and persist its output path
    pub async fn save_transcript(&self, transcript: &Transcript) -> Result<Transcript> {
        let path = self.output_path_for(&transcript.job_id, &transcript.target_language);
        self.save_chunks(transcript.subtitle_chunks(), &path).await?;

        let mut saved = transcript.clone();
        saved.output_path = Some(path);
        if !self.transcripts.update(&saved).await? {
            self.transcripts.create(&saved).await?;
        }
        Ok(saved)
    }

    /// One result per input, `None` where formatting failed
    pub async fn batch_save(&self, transcripts: &[Transcript]) -> Vec<Option<Transcript>> {
        let mut results = Vec::with_capacity(transcripts.len());
        for transcript in transcripts {
            match self.save_transcript(transcript).await {
                Ok(saved) => results.push(Some(saved)),
                Err(e) => {
                    error!(
                        "Job {}: formatting {} subtitles failed: {}",
                        transcript.job_id, transcript.target_language, e
                    );
                    results.push(None);
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, TranscriptFilter};
    use assert_fs::prelude::*;

    fn formatter(dir: &Path) -> (SubtitleFormatter, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (SubtitleFormatter::new(dir.to_path_buf(), store.clone()), store)
    }

    #[test]
    fn test_format_vtt_timestamp() {
        assert_eq!(format_vtt_timestamp(0.0), "00:00:00.000");
        assert_eq!(format_vtt_timestamp(65.123), "00:01:05.123");
        assert_eq!(format_vtt_timestamp(3661.5), "01:01:01.500");
        assert_eq!(format_vtt_timestamp(-2.0), "00:00:00.000");
    }

    #[test]
    fn end_before_start_is_stretched() {
        let validated = validate_chunks(&[Chunk::new(5.0, 4.0, "late"), Chunk::new(6.0, 6.0, "same")]);
        assert_eq!(validated.skipped, 0);
        for segment in &validated.segments {
            assert!(segment.duration() > 0.0);
            assert!((segment.duration() - MIN_SEGMENT_SECS).abs() < 1e-9);
        }
    }

    #[test]
    fn lenient_json_marks_bad_timestamps() {
        let chunks = chunks_from_json(
            r#"[
                {"timestamp": [0.0, 1.0], "text": "ok"},
                {"timestamp": ["a", 1.0], "text": "bad start"},
                {"timestamp": [1.0], "text": "short"},
                {"timestamp": [1.0, null], "text": "open"},
                {"text": "no time"}
            ]"#,
        )
        .unwrap();

        let validated = validate_chunks(&chunks);
        assert_eq!(validated.segments.len(), 1);
        assert_eq!(validated.skipped, 4);
    }

    #[tokio::test]
    async fn one_block_per_valid_chunk() {
        let dir = assert_fs::TempDir::new().unwrap();
        let (formatter, _) = formatter(dir.path());
        let chunks = vec![
            Chunk::new(0.0, 1.25, "  Bonjour  "),
            Chunk {
                timestamp: None,
                text: Some("lost".into()),
            },
            Chunk::new(1.25, 3.0, "le monde"),
        ];

        let out = dir.child("out.vtt");
        let report = formatter.save_chunks(&chunks, out.path()).await.unwrap();

        assert_eq!(report.written, 2);
        assert_eq!(report.skipped, 1);
        out.assert(
            "WEBVTT\n\n00:00:00.000 --> 00:00:01.250\nBonjour\n\n00:00:01.250 --> 00:00:03.000\nle monde\n\n",
        );
    }

    #[tokio::test]
    async fn empty_list_and_missing_dir_are_validation_errors() {
        let dir = assert_fs::TempDir::new().unwrap();
        let (formatter, _) = formatter(dir.path());

        let err = formatter.save_chunks(&[], &dir.path().join("a.vtt")).await.unwrap_err();
        assert!(matches!(err, LingomuxError::Validation(_)));

        let err = formatter
            .save_chunks(&[Chunk::new(0.0, 1.0, "x")], &dir.path().join("missing").join("a.vtt"))
            .await
            .unwrap_err();
        assert!(matches!(err, LingomuxError::Validation(_)));
    }

    #[tokio::test]
    async fn batch_save_reports_failures_individually() {
        let dir = assert_fs::TempDir::new().unwrap();
        let (formatter, store) = formatter(dir.path());
        let job_id = JobId::from("job_7");

        let source = Transcript::source(&job_id, "french", "Bonjour", vec![Chunk::new(0.0, 1.0, "Bonjour")]);
        let empty = Transcript::translated_from(&source, "arabic", "x".into(), vec![]);
        let english = Transcript::translated_from(&source, "english", "Hello".into(), vec![Chunk::new(0.0, 1.0, "Hello")]);
        store.create_many(&[source.clone(), empty.clone(), english.clone()]).await.unwrap();

        let results = formatter.batch_save(&[source, empty, english]).await;

        assert!(results[0].is_some());
        assert!(results[1].is_none());
        let saved = results[2].as_ref().unwrap();
        assert_eq!(saved.output_path, Some(dir.path().join("job_7_english.vtt")));
        dir.child("job_7_english.vtt")
            .assert("WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nHello\n\n");

        let stored = TranscriptStore::find_where(store.as_ref(), &TranscriptFilter::for_job_language(&job_id, "english"))
            .await
            .unwrap();
        assert_eq!(stored[0].output_path, saved.output_path);
    }
}
