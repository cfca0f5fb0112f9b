//! Lingomux - multilingual subtitle pipeline
//!
//! Takes a video, extracts its audio, recognizes speech, translates the
//! transcript into several languages, writes WebVTT files and multiplexes
//! them back into the video as stream-copied subtitle tracks, using
//! ffmpeg, whisper.cpp and ollama.

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod language;
pub mod media;
pub mod models;
pub mod pipeline;
pub mod setup;
pub mod store;
pub mod subtitle;
pub mod transcribe;
pub mod translate;
