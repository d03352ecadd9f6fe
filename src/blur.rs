//! Blur region transformation from thumbnail space into video space.

use serde::{Deserialize, Serialize};

use crate::domain::{BlurRegion, VideoRect};
use crate::geometry::ScalingTransform;

/// Smallest side a region may have in thumbnail space
pub const MIN_THUMBNAIL_SIDE: f64 = 10.0;
/// Smallest side a region may have in video space, so the blur kernel has room
pub const MIN_VIDEO_SIDE: u32 = 20;
/// Regions honored per job
pub const MAX_BLUR_REGIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    /// Transformed rectangle does not fit inside the video frame
    OutOfBounds,
    /// Valid, but past the region cap
    OverCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRegion {
    pub index: usize,
    pub reason: DropReason,
    /// The rejected rectangle in video space
    pub rect: VideoRect,
}

/// Outcome of transforming a job's blur regions
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlurPlan {
    /// Regions the filter graph will blur, in input order
    pub honored: Vec<VideoRect>,
    pub dropped: Vec<DroppedRegion>,
}

impl BlurPlan {
    pub fn is_empty(&self) -> bool {
        self.honored.is_empty()
    }
}

/// Map a single region into video space. Returns the rectangle whether or not it fits.
pub fn transform_region(
    index: usize,
    region: &BlurRegion,
    transform: &ScalingTransform,
) -> VideoRect {
    let x = region.x.max(0.0);
    let y = region.y.max(0.0);
    let width = region.width.max(MIN_THUMBNAIL_SIDE);
    let height = region.height.max(MIN_THUMBNAIL_SIDE);

    VideoRect {
        index,
        x: to_pixels(x * transform.scale_x),
        y: to_pixels(y * transform.scale_y),
        width: to_pixels(width * transform.scale_x).max(MIN_VIDEO_SIDE),
        height: to_pixels(height * transform.scale_y).max(MIN_VIDEO_SIDE),
    }
}

fn to_pixels(value: f64) -> u32 {
    // `as` saturates above u32::MAX
    value.round().max(0.0) as u32
}

pub fn fits_within(rect: &VideoRect, transform: &ScalingTransform) -> bool {
    let video = transform.video;
    (rect.x as u64 + rect.width as u64) <= video.width as u64
        && (rect.y as u64 + rect.height as u64) <= video.height as u64
}

/// Transform every region, keep the first `max_regions` that fit and record the rest.
pub fn plan_regions(
    regions: &[BlurRegion],
    transform: &ScalingTransform,
    max_regions: usize,
) -> BlurPlan {
    let mut plan = BlurPlan::default();

    for (index, region) in regions.iter().enumerate() {
        let rect = transform_region(index, region, transform);

        let reason = if !fits_within(&rect, transform) {
            Some(DropReason::OutOfBounds)
        } else if plan.honored.len() >= max_regions {
            Some(DropReason::OverCap)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                tracing::warn!(
                    region = index,
                    ?reason,
                    x = rect.x,
                    y = rect.y,
                    width = rect.width,
                    height = rect.height,
                    "Dropping blur region"
                );
                plan.dropped.push(DroppedRegion { index, reason, rect });
            }
            None => plan.honored.push(rect),
        }
    }

    plan
}
