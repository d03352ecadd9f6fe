//! Temporal resampling policy.
//!
//! Modest speed-ups keep every frame and compress timestamps. Higher factors have
//! to decide which frames survive: uniformly at first, then by scene change.

use serde::Serialize;

/// Upper bound of the timestamp-scaling tier (inclusive)
pub const PTS_SCALING_MAX_SPEED: f64 = 5.0;
/// Upper bound of the uniform frame selection tier (inclusive)
pub const UNIFORM_SELECT_MAX_SPEED: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpeedTier {
    PtsScaling,
    UniformSelect,
    SceneSelect,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedPolicy {
    pub tier: SpeedTier,
    /// Filter chain placed first in the graph
    pub filter: String,
    pub output_fps: u32,
}

impl SpeedPolicy {
    /// Pick the resampling strategy for `speed_factor`. Callers validate positivity.
    pub fn for_speed(speed_factor: f64) -> Self {
        if speed_factor <= PTS_SCALING_MAX_SPEED {
            let fps = 60;
            SpeedPolicy {
                tier: SpeedTier::PtsScaling,
                filter: format!("setpts={}*PTS,fps={}", format_decimal(1.0 / speed_factor), fps),
                output_fps: fps,
            }
        } else if speed_factor <= UNIFORM_SELECT_MAX_SPEED {
            let fps = 30;
            let step = (speed_factor / 2.0).floor() as u32;
            SpeedPolicy {
                tier: SpeedTier::UniformSelect,
                filter: format!("select='not(mod(n,{}))',setpts=N/({}*TB)", step, fps),
                output_fps: fps,
            }
        } else {
            let fps = 24;
            let threshold = (0.5 / speed_factor).min(0.2);
            SpeedPolicy {
                tier: SpeedTier::SceneSelect,
                filter: format!(
                    "select='eq(pict_type,PICT_TYPE_I)+gt(scene,{})',setpts=N/({}*TB)",
                    format_decimal(threshold),
                    fps
                ),
                output_fps: fps,
            }
        }
    }
}

/// Fixed-precision decimal without trailing zeros, so filter strings are stable
pub fn format_decimal(value: f64) -> String {
    let s = format!("{:.6}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(SpeedPolicy::for_speed(5.0).output_fps, 60);
        assert_eq!(SpeedPolicy::for_speed(5.0001).output_fps, 30);
        assert_eq!(SpeedPolicy::for_speed(10.0).output_fps, 30);
        assert_eq!(SpeedPolicy::for_speed(10.0001).output_fps, 24);
        assert_eq!(SpeedPolicy::for_speed(0.5).output_fps, 60);
    }

    #[test]
    fn test_pts_scaling_filter() {
        let policy = SpeedPolicy::for_speed(4.0);
        assert_eq!(policy.tier, SpeedTier::PtsScaling);
        assert_eq!(policy.filter, "setpts=0.25*PTS,fps=60");

        assert_eq!(SpeedPolicy::for_speed(3.0).filter, "setpts=0.333333*PTS,fps=60");
    }

    #[test]
    fn test_uniform_select_step() {
        assert_eq!(
            SpeedPolicy::for_speed(7.0).filter,
            "select='not(mod(n,3))',setpts=N/(30*TB)"
        );
        assert_eq!(
            SpeedPolicy::for_speed(10.0).filter,
            "select='not(mod(n,5))',setpts=N/(30*TB)"
        );
    }

    #[test]
    fn test_scene_threshold() {
        // 0.5 / 20 = 0.025
        assert_eq!(
            SpeedPolicy::for_speed(20.0).filter,
            "select='eq(pict_type,PICT_TYPE_I)+gt(scene,0.025)',setpts=N/(24*TB)"
        );
        assert_eq!(SpeedPolicy::for_speed(11.0).tier, SpeedTier::SceneSelect);
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(0.5), "0.5");
        assert_eq!(format_decimal(2.0), "2");
        assert_eq!(format_decimal(0.0), "0");
        assert_eq!(format_decimal(1.0 / 3.0), "0.333333");
    }

    proptest! {
        #[test]
        fn prop_fps_follows_tier(speed in 0.01f64..100.0) {
            let expected = if speed <= 5.0 { 60 } else if speed <= 10.0 { 30 } else { 24 };
            prop_assert_eq!(SpeedPolicy::for_speed(speed).output_fps, expected);
        }

        #[test]
        fn prop_policy_is_deterministic(speed in 0.01f64..100.0) {
            prop_assert_eq!(SpeedPolicy::for_speed(speed), SpeedPolicy::for_speed(speed));
        }
    }
}
