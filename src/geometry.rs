//! Mapping between thumbnail space and video pixel space.

use serde::Serialize;

use crate::domain::Dimensions;
use crate::error::{Result, TimelapseError};

/// Aspect ratios closer than this are treated as identical
pub const ASPECT_TOLERANCE: f64 = 0.01;

/// Per-job mapping from thumbnail coordinates to video coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScalingTransform {
    pub scale_x: f64,
    pub scale_y: f64,
    /// True when the aspect ratios differ and a single uniform ratio was used
    pub correction_applied: bool,
    /// Centering offset of the letterboxed thumbnail inside the video frame
    pub offset_x: f64,
    pub offset_y: f64,
    pub video: Dimensions,
}

impl ScalingTransform {
    /// Compute the transform for a recording and the thumbnail its regions were drawn on.
    pub fn resolve(video: Dimensions, thumbnail: Dimensions) -> Result<Self> {
        for (label, dims) in [("video", video), ("thumbnail", thumbnail)] {
            if dims.width == 0 || dims.height == 0 {
                return Err(TimelapseError::InvalidGeometry(format!(
                    "{} dimensions must be positive, got {}",
                    label, dims
                )));
            }
        }

        let ratio_x = video.width as f64 / thumbnail.width as f64;
        let ratio_y = video.height as f64 / thumbnail.height as f64;

        if (video.aspect() - thumbnail.aspect()).abs() <= ASPECT_TOLERANCE {
            return Ok(Self {
                scale_x: ratio_x,
                scale_y: ratio_y,
                correction_applied: false,
                offset_x: 0.0,
                offset_y: 0.0,
                video,
            });
        }

        let ratio = ratio_x.min(ratio_y);
        Ok(Self {
            scale_x: ratio,
            scale_y: ratio,
            correction_applied: true,
            offset_x: (video.width as f64 - thumbnail.width as f64 * ratio) / 2.0,
            offset_y: (video.height as f64 - thumbnail.height as f64 * ratio) / 2.0,
            video,
        })
    }

    pub fn identity(video: Dimensions) -> Result<Self> {
        Self::resolve(video, video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_matching_aspect_scales_per_axis() {
        let t = ScalingTransform::resolve(Dimensions::new(1920, 1080), Dimensions::new(640, 360))
            .unwrap();
        assert!(!t.correction_applied);
        assert_eq!(t.scale_x, 3.0);
        assert_eq!(t.scale_y, 3.0);
        assert_eq!((t.offset_x, t.offset_y), (0.0, 0.0));
    }

    #[test]
    fn test_near_matching_aspect_keeps_independent_axes() {
        // 1366x768 is 1.7786, 1920x1080 is 1.7778
        let t = ScalingTransform::resolve(Dimensions::new(1920, 1080), Dimensions::new(1366, 768))
            .unwrap();
        assert!(!t.correction_applied);
        assert_ne!(t.scale_x, t.scale_y);
    }

    #[test]
    fn test_square_thumbnail_is_corrected() {
        let t = ScalingTransform::resolve(Dimensions::new(1920, 1080), Dimensions::new(150, 150))
            .unwrap();
        assert!(t.correction_applied);
        assert!((t.scale_x - 7.2).abs() < 1e-9);
        assert_eq!(t.scale_x, t.scale_y);
        assert!((t.offset_x - 420.0).abs() < 1e-9);
        assert!(t.offset_y.abs() < 1e-9);
    }

    #[test]
    fn test_four_by_three_thumbnail_is_corrected() {
        let t = ScalingTransform::resolve(Dimensions::new(1920, 1080), Dimensions::new(320, 240))
            .unwrap();
        assert!(t.correction_applied);
        assert_eq!(t.scale_x, 4.5);
        assert_eq!(t.offset_x, 240.0);
        assert_eq!(t.offset_y, 0.0);
    }

    #[test]
    fn test_zero_dimension_is_invalid_geometry() {
        let err = ScalingTransform::resolve(Dimensions::new(0, 1080), Dimensions::new(320, 240))
            .unwrap_err();
        assert!(matches!(err, TimelapseError::InvalidGeometry(_)));

        let err = ScalingTransform::resolve(Dimensions::new(1920, 1080), Dimensions::new(320, 0))
            .unwrap_err();
        assert!(matches!(err, TimelapseError::InvalidGeometry(_)));
    }

    proptest! {
        #[test]
        fn prop_corrected_transform_is_uniform(
            vw in 1u32..8000, vh in 1u32..8000, tw in 1u32..4000, th in 1u32..4000
        ) {
            let t = ScalingTransform::resolve(Dimensions::new(vw, vh), Dimensions::new(tw, th))
                .unwrap();
            if t.correction_applied {
                prop_assert_eq!(t.scale_x, t.scale_y);
                prop_assert!(t.offset_x >= -1e-6 && t.offset_y >= -1e-6);
            } else {
                prop_assert_eq!(t.offset_x, 0.0);
                prop_assert_eq!(t.offset_y, 0.0);
            }
        }
    }
}
