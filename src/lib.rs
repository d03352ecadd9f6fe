//! Timelapse transcoding for finished screen recordings.
//!
//! A [`Transcoder`] maps blur regions drawn on a thumbnail into video pixels, picks a
//! temporal resampling strategy from the speed factor, composes one FFmpeg filter graph
//! and supervises the encoder process, reporting progress as [`JobEvent`]s.

pub mod blur;
pub mod command;
pub mod config;
pub mod domain;
pub mod error;
pub mod ffmpeg;
pub mod filter_graph;
pub mod geometry;
pub mod job;
pub mod logging;
pub mod progress;
pub mod speed;
pub mod supervisor;
pub mod transcoder;

pub use config::{LoggingConfig, TranscoderConfig};
pub use domain::{BlurRegion, Dimensions, OutputQuality, TranscodeOptions, TranscodeResult};
pub use error::{ErrorKind, Result, TimelapseError, TranscodeFailure};
pub use ffmpeg::FFmpeg;
pub use job::{CancelToken, JobEvent, JobId, Stage};
pub use transcoder::{plan_transcode, JobHandle, TranscodePlan, Transcoder};
