//! FFmpeg CLI wrapper for the KlipMaker render pipeline.
//!
//! This crate provides:
//! - An argument-list command builder and runner with hard timeouts
//! - Video probing (duration, dimensions)
//! - Mono 16 kHz audio extraction and MP3 chunking for STT upload
//! - Filter-chain construction (letterbox, subtitles, CTA overlay, watermark)
//! - ASS subtitle composition
//! - Clip rendering, end-card rendering and stream-copy concatenation
//! - Thumbnail generation

pub mod audio;
pub mod command;
pub mod error;
pub mod filters;
pub mod probe;
pub mod render;
pub mod subtitle;
pub mod thumbnail;

pub use audio::{extract_audio, split_audio, AudioChunk, CHUNK_DURATION_SECS};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use filters::{build_filter_chain, scale_letterbox, FilterChainSpec};
pub use probe::{get_duration, probe_video, VideoInfo};
pub use render::{concat_stream_copy, render_clip, render_end_card, RenderSpec};
pub use subtitle::{compose_ass, format_ass_time, wrap_text};
pub use thumbnail::generate_thumbnail;
