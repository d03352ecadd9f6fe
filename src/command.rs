//! Encoder argument list composition.

use std::path::Path;

use crate::domain::OutputQuality;
use crate::filter_graph::FilterGraph;
use crate::speed::format_decimal;

pub const VIDEO_CODEC: &str = "libx264";
pub const PIXEL_FORMAT: &str = "yuv420p";
pub const ENCODER_PRESET: &str = "medium";
pub const H264_PROFILE: &str = "high";
pub const H264_LEVEL: &str = "4.1";
/// Keyframe every this many seconds of output
pub const KEYFRAME_INTERVAL_SECS: u32 = 2;

/// Everything needed to produce one encoder invocation
#[derive(Debug, Clone)]
pub struct EncodeSpec<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub threads: usize,
    pub graph: &'a FilterGraph,
    pub output_fps: u32,
    pub quality: OutputQuality,
    pub speed_factor: f64,
}

/// Worker threads for the encoder: at least `min_threads`, more on bigger machines
pub fn thread_count(min_threads: usize) -> usize {
    let detected = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    detected.max(min_threads)
}

/// Build the full argument list. Identical specs yield identical lists.
pub fn build_args(spec: &EncodeSpec<'_>) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-i".to_string(),
        spec.input.to_string_lossy().to_string(),
        "-hide_banner".to_string(),
        "-progress".to_string(),
        "pipe:1".to_string(),
        "-nostats".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-threads".to_string(),
        spec.threads.to_string(),
        "-filter_complex".to_string(),
        spec.graph.expression.clone(),
    ];

    if let Some(target) = spec.graph.map_target() {
        args.extend(["-map".to_string(), target]);
    }

    args.extend([
        "-r".to_string(),
        spec.output_fps.to_string(),
        "-c:v".to_string(),
        VIDEO_CODEC.to_string(),
        "-pix_fmt".to_string(),
        PIXEL_FORMAT.to_string(),
        "-crf".to_string(),
        spec.quality.crf().to_string(),
        "-preset".to_string(),
        ENCODER_PRESET.to_string(),
        "-profile:v".to_string(),
        H264_PROFILE.to_string(),
        "-level".to_string(),
        H264_LEVEL.to_string(),
        "-g".to_string(),
        (spec.output_fps * KEYFRAME_INTERVAL_SECS).to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-an".to_string(),
        "-metadata".to_string(),
        format!("comment=Timelapse {}x", format_decimal(spec.speed_factor)),
        "-y".to_string(),
        spec.output.to_string_lossy().to_string(),
    ]);

    args
}
