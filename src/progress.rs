use once_cell::sync::Lazy;
use regex::Regex;
use std::time::{Duration, Instant};

/// Estimates never reach 100 before the encoder exits
pub const ESTIMATE_CAP: u8 = 95;

static FRAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"frame=\s*(\d+)").unwrap());

/// Extract the frame counter from a diagnostic line, if any
pub fn parse_frame(line: &str) -> Option<u64> {
    FRAME_RE.captures(line).and_then(|cap| cap[1].parse().ok())
}

/// Turns frame counters into throttled, non-decreasing percentages
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    assumed_total_frames: u64,
    interval: Duration,
    last_percent: u8,
    last_emit: Instant,
}

impl ProgressTracker {
    /// `started` counts as the previous emission
    pub fn new(assumed_total_frames: u64, interval: Duration, started: Instant) -> Self {
        Self {
            assumed_total_frames: assumed_total_frames.max(1),
            interval,
            last_percent: 0,
            last_emit: started,
        }
    }

    pub fn estimate(&self, frame: u64) -> u8 {
        let percent = frame.saturating_mul(100) / self.assumed_total_frames;
        percent.min(ESTIMATE_CAP as u64) as u8
    }

    /// Returns the percentage to emit, if it grew and the interval has passed.
    pub fn observe(&mut self, frame: u64, now: Instant) -> Option<u8> {
        let percent = self.estimate(frame);
        if percent <= self.last_percent {
            return None;
        }
        if now.saturating_duration_since(self.last_emit) < self.interval {
            return None;
        }

        self.last_percent = percent;
        self.last_emit = now;
        Some(percent)
    }

    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }

    pub fn complete(&mut self) -> u8 {
        self.last_percent = 100;
        100
    }
}
