use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const FALLBACK: Dimensions = Dimensions {
        width: 1920,
        height: 1080,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for Dimensions {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("Expected WxH, got: {}", s))?;
        Ok(Dimensions {
            width: w.trim().parse().map_err(|_| format!("Invalid width: {}", w))?,
            height: h.trim().parse().map_err(|_| format!("Invalid height: {}", h))?,
        })
    }
}

/// Rectangle drawn by the user over the thumbnail, in thumbnail pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlurRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl std::str::FromStr for BlurRegion {
    type Err = String;

    /// Format: X,Y,W,H
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err("Blur region format: X,Y,W,H".to_string());
        }

        let mut values = [0.0f64; 4];
        for (value, part) in values.iter_mut().zip(&parts) {
            *value = part
                .parse()
                .map_err(|_| format!("Invalid blur region value: {}", part))?;
        }

        if values[2] < 0.0 || values[3] < 0.0 {
            return Err("Blur region width and height must not be negative".to_string());
        }

        Ok(BlurRegion {
            x: values[0],
            y: values[1],
            width: values[2],
            height: values[3],
        })
    }
}

/// Rectangle in video pixel space, ready for the filter graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRect {
    /// Position of the region in the caller's input list
    pub index: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Output quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum OutputQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl OutputQuality {
    /// x264 constant rate factor; lower is better
    pub fn crf(&self) -> &'static str {
        match self {
            OutputQuality::Low => "30",
            OutputQuality::Medium => "26",
            OutputQuality::High => "22",
        }
    }

    /// Unrecognized values fall back to `Medium`
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => OutputQuality::Low,
            "high" => OutputQuality::High,
            _ => OutputQuality::Medium,
        }
    }
}

impl From<String> for OutputQuality {
    fn from(s: String) -> Self {
        Self::parse_lenient(&s)
    }
}

impl std::str::FromStr for OutputQuality {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

impl std::fmt::Display for OutputQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputQuality::Low => write!(f, "low"),
            OutputQuality::Medium => write!(f, "medium"),
            OutputQuality::High => write!(f, "high"),
        }
    }
}

/// Transcode parameters supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscodeOptions {
    pub speed_factor: f64,
    pub output_quality: OutputQuality,
    pub blur_regions: Vec<BlurRegion>,
    /// Authoritative source dimensions when present
    pub video_width: Option<u32>,
    pub video_height: Option<u32>,
    pub thumbnail_width: Option<u32>,
    pub thumbnail_height: Option<u32>,
    /// When false the source is deleted after a successful transcode
    pub preserve_original: bool,
}

impl TranscodeOptions {
    pub fn video_dimensions(&self) -> Option<Dimensions> {
        match (self.video_width, self.video_height) {
            (Some(w), Some(h)) => Some(Dimensions::new(w, h)),
            _ => None,
        }
    }

    pub fn thumbnail_dimensions(&self) -> Option<Dimensions> {
        match (self.thumbnail_width, self.thumbnail_height) {
            (Some(w), Some(h)) => Some(Dimensions::new(w, h)),
            _ => None,
        }
    }
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            speed_factor: 1.0,
            output_quality: OutputQuality::default(),
            blur_regions: Vec::new(),
            video_width: None,
            video_height: None,
            thumbnail_width: None,
            thumbnail_height: None,
            preserve_original: true,
        }
    }
}

/// Capture metadata written next to a recording
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSidecar {
    pub video_width: Option<u32>,
    pub video_height: Option<u32>,
    pub thumbnail_width: Option<u32>,
    pub thumbnail_height: Option<u32>,
}

/// Result of a successful transcode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeResult {
    pub output_path: PathBuf,
}

/// Video information extracted from FFmpeg
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub duration: Option<String>,
    pub duration_seconds: Option<f64>,
    pub dimensions: Option<Dimensions>,
    pub fps: Option<f32>,
}
