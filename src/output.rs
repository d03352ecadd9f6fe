use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::fs::{format_duration, format_size};
use timelapso::blur::DropReason;
use timelapso::domain::{TranscodeOptions, TranscodeResult, VideoInfo};
use timelapso::job::{JobId, Stage};
use timelapso::{TimelapseError, TranscodeFailure, TranscodePlan};

/// Print application header
pub fn print_header() {
    println!();
    println!(
        "{}",
        format!("  Timelapso v{}", env!("CARGO_PKG_VERSION")).bright_cyan().bold()
    );
    println!("{}", "━".repeat(50).dimmed());
    println!();
}

/// Print video information
pub fn print_video_info(path: &Path, info: &VideoInfo, size: u64) {
    println!("{}", "Video Information".bright_white().bold());
    println!("{}", "─".repeat(30).dimmed());

    println!("  {} {}", "File:".dimmed(), path.display().to_string().bright_white());
    println!("  {} {}", "Size:".dimmed(), format_size(size).bright_yellow());

    if let Some(duration) = &info.duration {
        let pretty = info
            .duration_seconds
            .map(|s| format!(" ({})", format_duration(s)))
            .unwrap_or_default();
        println!("  {} {}{}", "Duration:".dimmed(), duration.bright_white(), pretty.dimmed());
    }

    if let Some(dims) = info.dimensions {
        println!("  {} {}", "Resolution:".dimmed(), dims.to_string().bright_white());
    }

    if let Some(fps) = info.fps {
        println!(
            "  {} {} fps",
            "Frame rate:".dimmed(),
            format!("{:.2}", fps).bright_white()
        );
    }

    println!();
}

/// Print the resolved transcode plan
pub fn print_plan(input: &Path, output: &Path, options: &TranscodeOptions, plan: &TranscodePlan) {
    println!("{}", "Timelapse Settings".bright_white().bold());
    println!("{}", "─".repeat(30).dimmed());

    println!("  {} {}", "Input:".dimmed(), input.display().to_string().bright_white());
    println!("  {} {}", "Output:".dimmed(), output.display().to_string().bright_white());
    println!(
        "  {} {}x {}",
        "Speed:".dimmed(),
        options.speed_factor.to_string().bright_yellow(),
        format!("({:?}, {} fps)", plan.speed.tier, plan.speed.output_fps).dimmed()
    );
    println!(
        "  {} {}",
        "Quality:".dimmed(),
        options.output_quality.to_string().bright_green()
    );
    println!("  {} {}", "Source:".dimmed(), plan.video.to_string().bright_white());

    if plan.transform.correction_applied {
        println!(
            "  {} {} {}",
            "Thumbnail:".dimmed(),
            plan.thumbnail.to_string().bright_white(),
            "(aspect differs, letterboxed)".bright_yellow()
        );
    }

    if !plan.blur.honored.is_empty() {
        println!("  {} {}", "Blur:".dimmed(), plan.blur.honored.len().to_string().bright_white());
        for rect in &plan.blur.honored {
            println!(
                "    {} {}x{} at {},{}",
                format!("[{}]", rect.index).dimmed(),
                rect.width,
                rect.height,
                rect.x,
                rect.y
            );
        }
    }

    for dropped in &plan.blur.dropped {
        let reason = match dropped.reason {
            DropReason::OutOfBounds => "outside the video frame",
            DropReason::OverCap => "over the region limit",
        };
        print_warning(&format!("Blur region {} skipped: {}", dropped.index, reason));
    }

    println!();
}

/// Print the encoder command for --dry-run
pub fn print_command(program: &Path, args: &[String]) {
    println!("{}", "FFmpeg Command".bright_white().bold());
    println!("{}", "─".repeat(30).dimmed());
    let quoted: Vec<String> = args
        .iter()
        .map(|a| {
            if a.contains(' ') || a.contains('\'') || a.contains(';') {
                format!("\"{}\"", a)
            } else {
                a.clone()
            }
        })
        .collect();
    println!("  {} {}", program.display().to_string().bright_cyan(), quoted.join(" "));
    println!();
}

/// Create and return a progress bar
pub fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("starting");
    pb
}

pub fn update_progress(pb: &ProgressBar, percent: u8, stage: Stage) {
    pb.set_position(percent as u64);
    pb.set_message(stage.to_string());
}

pub fn finish_progress(pb: &ProgressBar) {
    pb.finish_with_message("Done!");
}

/// Print transcode result
pub fn print_result(
    result: &TranscodeResult,
    original_size: u64,
    output_size: u64,
    elapsed: Duration,
) {
    println!();
    println!("{}", "━".repeat(50).dimmed());
    println!(
        "{} {}",
        "✓".bright_green().bold(),
        "Timelapse complete!".bright_green().bold()
    );
    println!();
    println!("  {} {}", "Original:".dimmed(), format_size(original_size).bright_white());
    println!("  {} {}", "Timelapse:".dimmed(), format_size(output_size).bright_green());
    println!("  {} {:.2}s", "Time:".dimmed(), elapsed.as_secs_f64());
    println!();
    println!(
        "  {} {}",
        "Output:".dimmed(),
        result.output_path.display().to_string().bright_cyan()
    );
    println!();
}

/// Print error message with actionable hints based on error type
pub fn print_error_with_hint(error: &TimelapseError) {
    eprintln!();
    eprintln!("{} {}", "✗".bright_red().bold(), error.to_string().bright_red());
    eprintln!();

    let hint = match error {
        TimelapseError::EncoderNotFound | TimelapseError::EncoderSpawnFailure(_) => {
            "💡 How to install FFmpeg:\n\
             \n\
             macOS:\n\
               • brew install ffmpeg\n\
             \n\
             Linux:\n\
               • sudo apt install ffmpeg  (Debian/Ubuntu)\n\
               • sudo dnf install ffmpeg  (Fedora)\n\
             \n\
             Or point TIMELAPSO_FFMPEG_PATH at an existing binary."
                .to_string()
        }
        TimelapseError::SourceNotFound(path) => format!(
            "💡 Suggestions:\n\
             \n\
               • Check if the file path is correct: {}\n\
               • Make sure the recording has finished writing",
            path.display()
        ),
        TimelapseError::InvalidGeometry(_) => "💡 Video and thumbnail sizes must be non-zero.\n\
             Check --video-size, --thumbnail-size or the sidecar file."
            .to_string(),
        TimelapseError::InvalidInput(_) => "💡 Supported recordings: mp4, mov, webm, avi, mkv, m4v, wmv, flv.\n\
             Speed must be a positive number."
            .to_string(),
        TimelapseError::InvalidOutput(_) => "💡 Choose another output path or pass -y to overwrite."
            .to_string(),
        TimelapseError::EncoderExitFailure { stderr_tail, .. } => format!(
            "💡 FFmpeg reported:\n\
             \n\
             {}\n\
             \n\
               • Check that your FFmpeg build includes libx264\n\
               • Check available disk space",
            stderr_tail
        ),
        TimelapseError::JobAlreadyRunning { .. } => {
            "💡 Wait for the running transcode to finish, or cancel it.".to_string()
        }
        TimelapseError::Cancelled => {
            "💡 Transcode was cancelled. The source recording was kept.".to_string()
        }
        TimelapseError::NoValidBlurRegions(_)
        | TimelapseError::Io(_)
        | TimelapseError::Json(_) => {
            "💡 Check file permissions and available disk space.".to_string()
        }
    };

    eprintln!("{}", hint.bright_blue());
    eprintln!();
}

/// Print warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".bright_yellow().bold(), message.bright_yellow());
}

/// Print cancelled message
pub fn print_cancelled() {
    println!();
    println!(
        "{} {}",
        "⚠".bright_yellow().bold(),
        "Transcode cancelled by user.".bright_yellow()
    );
    println!();
}

// ============================================================================
// JSON Output
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfoJson<'a> {
    pub path: &'a Path,
    pub size: u64,
    pub size_formatted: String,
    #[serde(flatten)]
    pub info: &'a VideoInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeResultJson<'a> {
    pub success: bool,
    pub job_id: &'a JobId,
    pub elapsed_seconds: f64,
    #[serde(flatten)]
    pub result: &'a TranscodeResult,
    pub output_size: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureJson<'a> {
    pub success: bool,
    #[serde(flatten)]
    pub failure: &'a TranscodeFailure,
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing to JSON: {}", e),
    }
}

pub fn print_video_info_json(path: &Path, info: &VideoInfo, size: u64) {
    print_json(&VideoInfoJson {
        path,
        size,
        size_formatted: format_size(size),
        info,
    });
}

pub fn print_plan_json(plan: &TranscodePlan) {
    print_json(plan);
}

pub fn print_result_json(
    job_id: &JobId,
    result: &TranscodeResult,
    output_size: u64,
    elapsed: Duration,
) {
    print_json(&TranscodeResultJson {
        success: true,
        job_id,
        elapsed_seconds: elapsed.as_secs_f64(),
        result,
        output_size,
    });
}

pub fn print_error_json(error: &TimelapseError) {
    print_json(&FailureJson {
        success: false,
        failure: &error.to_failure(),
    });
}
