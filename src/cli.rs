use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

use timelapso::domain::{BlurRegion, CaptureSidecar, Dimensions, OutputQuality, TranscodeOptions};
use timelapso::Result;

#[derive(Parser, Debug)]
#[command(
    name = "timelapso",
    author = "Timelapso Team",
    version,
    about = "Turn screen recordings into timelapses with blurred regions, powered by FFmpeg",
    long_about = "Timelapso - Speed up a screen recording and blur sensitive regions.\n\n\
                  Examples:\n  \
                  timelapso capture.webm\n  \
                  timelapso capture.webm -s 8 -q high\n  \
                  timelapso capture.webm out.mp4 --blur 50,50,100,80 --thumbnail-size 320x240\n  \
                  timelapso capture.webm --metadata capture.json --dry-run"
)]
pub struct Cli {
    /// Finished screen recording
    pub input: PathBuf,

    /// Output file path (default: <input>_timelapse.mp4)
    pub output: Option<PathBuf>,

    /// Speed-up factor, e.g. 2 plays twice as fast
    #[arg(short, long, default_value = "1.0", value_parser = parse_speed)]
    pub speed: f64,

    /// Output quality
    #[arg(short, long, value_enum, default_value = "medium")]
    pub quality: QualityArg,

    /// Blur region in thumbnail pixels (format: X,Y,W,H). Repeat for more regions
    #[arg(short, long = "blur", value_name = "X,Y,W,H")]
    pub blur: Vec<BlurRegion>,

    /// Source video dimensions (format: WxH), skips probing
    #[arg(long, value_name = "WxH")]
    pub video_size: Option<Dimensions>,

    /// Dimensions of the thumbnail the blur regions were drawn on (format: WxH)
    #[arg(long, value_name = "WxH")]
    pub thumbnail_size: Option<Dimensions>,

    /// Capture sidecar JSON with videoWidth/videoHeight/thumbnailWidth/thumbnailHeight
    #[arg(long, value_name = "FILE")]
    pub metadata: Option<PathBuf>,

    /// Remove the source recording after a successful transcode
    #[arg(long)]
    pub delete_original: bool,

    /// Overwrite output file without asking
    #[arg(short = 'y', long)]
    pub overwrite: bool,

    /// Print the blur plan and FFmpeg command without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Show video info without transcoding
    #[arg(long)]
    pub info: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Show debug logs
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum QualityArg {
    /// Smallest file
    Low,
    /// Balanced
    Medium,
    /// Best quality, larger file
    High,
}

impl From<QualityArg> for OutputQuality {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::Low => OutputQuality::Low,
            QualityArg::Medium => OutputQuality::Medium,
            QualityArg::High => OutputQuality::High,
        }
    }
}

fn parse_speed(s: &str) -> std::result::Result<f64, String> {
    let speed: f64 = s.parse().map_err(|_| format!("Invalid speed: {}", s))?;
    if !speed.is_finite() || speed <= 0.0 {
        return Err("Speed must be a positive number".to_string());
    }
    Ok(speed)
}

impl Cli {
    /// Build transcode options, reading the sidecar when one was given.
    pub fn to_options(&self) -> Result<TranscodeOptions> {
        let sidecar = match &self.metadata {
            Some(path) => read_sidecar(path)?,
            None => CaptureSidecar::default(),
        };
        Ok(self.options_with_sidecar(&sidecar))
    }

    /// Explicit flags win over sidecar values
    pub fn options_with_sidecar(&self, sidecar: &CaptureSidecar) -> TranscodeOptions {
        let (video_width, video_height) = match self.video_size {
            Some(d) => (Some(d.width), Some(d.height)),
            None => (sidecar.video_width, sidecar.video_height),
        };
        let (thumbnail_width, thumbnail_height) = match self.thumbnail_size {
            Some(d) => (Some(d.width), Some(d.height)),
            None => (sidecar.thumbnail_width, sidecar.thumbnail_height),
        };

        TranscodeOptions {
            speed_factor: self.speed,
            output_quality: self.quality.into(),
            blur_regions: self.blur.clone(),
            video_width,
            video_height,
            thumbnail_width,
            thumbnail_height,
            preserve_original: !self.delete_original,
        }
    }

    /// `-v` wins, then the configured level. Without either, library logs stay
    /// quiet under the progress bar.
    pub fn log_level<'a>(&self, configured: Option<&'a str>) -> &'a str {
        if self.verbose {
            "debug"
        } else {
            configured.unwrap_or("warn")
        }
    }
}

fn read_sidecar(path: &Path) -> Result<CaptureSidecar> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "timelapso",
            "capture.webm",
            "out.mp4",
            "-s",
            "3",
            "-q",
            "high",
            "--blur",
            "50,50,100,80",
            "--blur",
            "0,0,20,20",
            "--thumbnail-size",
            "320x240",
            "--delete-original",
        ])
        .unwrap();

        assert_eq!(cli.output, Some(PathBuf::from("out.mp4")));
        let options = cli.options_with_sidecar(&CaptureSidecar::default());
        assert_eq!(options.speed_factor, 3.0);
        assert_eq!(options.output_quality, OutputQuality::High);
        assert_eq!(options.blur_regions.len(), 2);
        assert_eq!(options.thumbnail_dimensions(), Some(Dimensions::new(320, 240)));
        assert_eq!(options.video_dimensions(), None);
        assert!(!options.preserve_original);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["timelapso", "capture.webm"]).unwrap();
        let options = cli.options_with_sidecar(&CaptureSidecar::default());
        assert_eq!(options, TranscodeOptions::default());
    }

    #[test]
    fn test_rejects_bad_speed_and_region() {
        assert!(Cli::try_parse_from(["timelapso", "a.webm", "-s", "0"]).is_err());
        assert!(Cli::try_parse_from(["timelapso", "a.webm", "-s", "fast"]).is_err());
        assert!(Cli::try_parse_from(["timelapso", "a.webm", "--blur", "1,2,3"]).is_err());
    }

    #[test]
    fn test_flags_override_sidecar() {
        let sidecar = CaptureSidecar {
            video_width: Some(2560),
            video_height: Some(1440),
            thumbnail_width: Some(320),
            thumbnail_height: Some(180),
        };
        let cli =
            Cli::try_parse_from(["timelapso", "a.webm", "--video-size", "1920x1080"]).unwrap();
        let options = cli.options_with_sidecar(&sidecar);

        assert_eq!(options.video_dimensions(), Some(Dimensions::new(1920, 1080)));
        assert_eq!(options.thumbnail_dimensions(), Some(Dimensions::new(320, 180)));
    }

    #[test]
    fn test_log_level_selection() {
        let quiet = Cli::try_parse_from(["timelapso", "a.webm"]).unwrap();
        assert_eq!(quiet.log_level(None), "warn");
        assert_eq!(quiet.log_level(Some("timelapso=debug")), "timelapso=debug");

        let verbose = Cli::try_parse_from(["timelapso", "a.webm", "-v"]).unwrap();
        assert_eq!(verbose.log_level(None), "debug");
        assert_eq!(verbose.log_level(Some("error")), "debug");
    }

    #[test]
    fn test_sidecar_file_is_read() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"videoWidth": 1280, "videoHeight": 720}}"#).unwrap();

        let path = file.path().to_string_lossy().to_string();
        let cli = Cli::try_parse_from(["timelapso", "a.webm", "--metadata", &path]).unwrap();
        let options = cli.to_options().unwrap();
        assert_eq!(options.video_dimensions(), Some(Dimensions::new(1280, 720)));
        assert_eq!(options.thumbnail_dimensions(), None);
    }
}
