use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::config::ENV_FFMPEG_PATH;
use crate::domain::{Dimensions, VideoInfo};
use crate::error::{Result, TimelapseError};

static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Duration: (?P<duration>\d{2}:\d{2}:\d{2}\.\d{2})").unwrap());
static DIMENSIONS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Video:.*? (\d{2,5})x(\d{2,5})").unwrap());
static FPS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*fps").unwrap());

/// Located FFmpeg binary
#[derive(Debug, Clone)]
pub struct FFmpeg {
    ffmpeg_path: PathBuf,
}

impl FFmpeg {
    /// Locate FFmpeg, preferring an explicitly configured binary
    pub fn new(explicit: Option<&Path>) -> Result<Self> {
        let ffmpeg_path = Self::find_ffmpeg(explicit)?;
        Ok(Self { ffmpeg_path })
    }

    /// Use a binary as-is, without discovery
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.ffmpeg_path
    }

    /// Search priority (highest to lowest):
    /// 1. Explicit path from configuration or `TIMELAPSO_FFMPEG_PATH`
    /// 2. Bundled FFmpeg next to the executable
    /// 3. System PATH
    fn find_ffmpeg(explicit: Option<&Path>) -> Result<PathBuf> {
        let from_env = std::env::var_os(ENV_FFMPEG_PATH).map(PathBuf::from);
        if let Some(path) = explicit.map(Path::to_path_buf).or(from_env) {
            if path.is_file() {
                tracing::info!(path = %path.display(), "Using explicitly configured FFmpeg");
                return Ok(path);
            }
            tracing::warn!(path = %path.display(), "Configured FFmpeg path is invalid");
            return Err(TimelapseError::EncoderNotFound);
        }

        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()));

        if let Some(dir) = exe_dir {
            let bundled = if cfg!(windows) {
                dir.join("ffmpeg.exe")
            } else {
                dir.join("ffmpeg")
            };

            if bundled.is_file() {
                tracing::info!(path = %bundled.display(), "Using bundled FFmpeg");
                return Ok(bundled);
            }
        }

        if let Ok(path) = which::which("ffmpeg") {
            tracing::debug!(path = %path.display(), "Using FFmpeg from system PATH");
            return Ok(path);
        }

        Err(TimelapseError::EncoderNotFound)
    }

    /// Read duration, dimensions and frame rate from the FFmpeg banner.
    pub async fn probe(&self, video_path: &Path) -> Result<VideoInfo> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-i")
            .arg(video_path)
            .arg("-hide_banner")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| TimelapseError::EncoderSpawnFailure(e.to_string()))?;

        // Without an output file FFmpeg always exits non-zero, so only the banner matters
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No such file") || stderr.contains("does not exist") {
            return Err(TimelapseError::SourceNotFound(video_path.to_path_buf()));
        }

        Ok(Self::parse_video_info(&stderr))
    }

    pub fn parse_video_info(banner: &str) -> VideoInfo {
        let duration = Self::parse_duration(banner);
        let duration_seconds = duration.as_deref().and_then(Self::duration_to_seconds);

        VideoInfo {
            duration,
            duration_seconds,
            dimensions: Self::parse_dimensions(banner),
            fps: Self::parse_fps(banner),
        }
    }

    fn parse_duration(output: &str) -> Option<String> {
        DURATION_RE
            .captures(output)
            .map(|cap| cap["duration"].to_string())
    }

    fn parse_dimensions(output: &str) -> Option<Dimensions> {
        DIMENSIONS_RE.captures(output).and_then(|cap| {
            let width = cap.get(1)?.as_str().parse().ok()?;
            let height = cap.get(2)?.as_str().parse().ok()?;
            Some(Dimensions::new(width, height))
        })
    }

    fn parse_fps(output: &str) -> Option<f32> {
        FPS_RE
            .captures(output)
            .and_then(|cap| cap.get(1)?.as_str().parse().ok())
    }

    fn duration_to_seconds(duration: &str) -> Option<f64> {
        let parts: Vec<&str> = duration.split(':').collect();
        if parts.len() != 3 {
            return None;
        }

        let hours: f64 = parts[0].parse().ok()?;
        let minutes: f64 = parts[1].parse().ok()?;
        let seconds: f64 = parts[2].parse().ok()?;

        Some(hours * 3600.0 + minutes * 60.0 + seconds)
    }

    /// Replace full file paths with file names before logging a command line.
    /// Filter graphs are left intact even though they contain dots.
    pub fn sanitize_args_for_logging(args: &[String]) -> Vec<String> {
        let home_dir = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_default();

        args.iter()
            .map(|arg| {
                let looks_like_path = (arg.contains('/') || arg.contains('\\'))
                    && !arg.starts_with('-')
                    && !arg.contains('=');
                if !looks_like_path {
                    return arg.clone();
                }

                match Path::new(arg).file_name() {
                    Some(name) if !home_dir.is_empty() && arg.contains(&home_dir) => {
                        format!("~/{}", name.to_string_lossy())
                    }
                    Some(name) => name.to_string_lossy().to_string(),
                    None => arg.clone(),
                }
            })
            .collect()
    }
}
