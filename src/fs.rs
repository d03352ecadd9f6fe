use std::fs;
use std::path::{Path, PathBuf};

use timelapso::{Result, TimelapseError};

/// Extensions the recorder and common screen capture tools produce
const VIDEO_EXTENSIONS: [&str; 8] = ["mp4", "mov", "webm", "avi", "mkv", "m4v", "wmv", "flv"];

/// Check if file is a valid video file
pub fn is_video_file(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            return true;
        }
    }

    // Also check by MIME type
    if let Ok(Some(kind)) = infer::get_from_path(path) {
        return kind.mime_type().starts_with("video/");
    }

    false
}

pub fn file_size(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path)?.len())
}

/// Format bytes to human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration in seconds to human-readable time
pub fn format_duration(seconds: f64) -> String {
    if seconds < 0.0 {
        return "0s".to_string();
    }

    let total_seconds = seconds.round() as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// `<stem>_timelapse.mp4` beside the input
pub fn generate_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    input.with_file_name(format!("{}_timelapse.mp4", stem))
}

/// Refuse outputs that would clobber the input, an existing file (without `overwrite`),
/// or land in a directory that does not exist.
pub fn validate_output_path(input: &Path, output: &Path, overwrite: bool) -> Result<()> {
    if output == input
        || matches!(
            (fs::canonicalize(input), fs::canonicalize(output)),
            (Ok(a), Ok(b)) if a == b
        )
    {
        return Err(TimelapseError::InvalidOutput(
            "output would overwrite the source recording".to_string(),
        ));
    }

    if output.is_dir() {
        return Err(TimelapseError::InvalidOutput(format!(
            "{} is a directory",
            output.display()
        )));
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(TimelapseError::InvalidOutput(format!(
                "directory does not exist: {}",
                parent.display()
            )));
        }
    }

    if !overwrite && output.exists() {
        return Err(TimelapseError::InvalidOutput(format!(
            "file already exists: {}",
            output.display()
        )));
    }

    Ok(())
}
