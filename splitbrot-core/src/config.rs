//! Engine configuration and viewer defaults.

use crate::view::{ViewError, ViewParams};
use serde::{Deserialize, Serialize};

/// Default view and iteration limits for the Mandelbrot viewer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineDefaults {
    /// Default center coordinates as strings (preserves precision)
    pub default_center: (&'static str, &'static str),
    /// Side of the square fitted into the shorter image dimension
    pub default_size: &'static str,
    pub default_max_iter: u32,
    /// Hard ceiling for the iteration cap.
    pub max_iter_limit: u32,
    /// Caps above this are rounded down to a multiple of it.
    pub max_iter_granule: u32,
}

impl EngineDefaults {
    /// The startup view for an image of the given size.
    pub fn default_view(&self, width: u32, height: u32) -> Result<ViewParams, ViewError> {
        ViewParams::fit(
            self.default_center.0,
            self.default_center.1,
            self.default_size,
            width,
            height,
            128,
        )
    }

    /// Brings a requested cap into the supported range.
    pub fn clamp_max_iter(&self, requested: u32) -> u32 {
        let mut cap = requested.clamp(2, self.max_iter_limit);
        if cap > self.max_iter_granule {
            cap -= cap % self.max_iter_granule;
        }
        cap
    }
}

pub static ENGINE_DEFAULTS: EngineDefaults = EngineDefaults {
    default_center: ("-0.75", "0.0"),
    default_size: "2.5",
    default_max_iter: 512,
    max_iter_limit: 0x10_0000,
    max_iter_granule: 0x1_0000,
};

/// Tuning knobs for the scheduler and the decomposition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads; 0 picks one per logical CPU.
    pub worker_threads: usize,
    /// Rectangles with an all-cap border smaller than this in both
    /// dimensions are computed pixel by pixel.
    pub full_compute_below: u32,
    /// Rectangles narrower or shorter than this are never bisected.
    pub min_bisect_size: u32,
    /// More pending updates than this are reported as one full frame.
    pub full_frame_update_count: usize,
    /// Below this cap every update is reported as a full frame.
    pub full_frame_below_iter: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            full_compute_below: 20,
            min_bisect_size: 5,
            full_frame_update_count: 300,
            full_frame_below_iter: 4096,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Precision;

    #[test]
    fn default_view_is_the_whole_set() {
        let view = ENGINE_DEFAULTS.default_view(640, 480).unwrap();
        assert_eq!(view.center.0.to_f64(), -0.75);
        assert!((view.unity.0.to_f64() - 2.5 / 480.0).abs() < 1e-15);
        assert_eq!(view.precision, Precision::Double);
    }

    #[test]
    fn small_caps_pass_through() {
        assert_eq!(ENGINE_DEFAULTS.clamp_max_iter(512), 512);
        assert_eq!(ENGINE_DEFAULTS.clamp_max_iter(0), 2);
    }

    #[test]
    fn large_caps_round_down_to_the_granule() {
        assert_eq!(ENGINE_DEFAULTS.clamp_max_iter(0x2_8000), 0x2_0000);
        assert_eq!(ENGINE_DEFAULTS.clamp_max_iter(u32::MAX), 0x10_0000);
    }

    #[test]
    fn engine_config_fills_missing_fields_from_default() {
        let config: EngineConfig = serde_json::from_str(r#"{"worker_threads": 3}"#).unwrap();
        assert_eq!(config.worker_threads, 3);
        assert_eq!(config.full_compute_below, 20);
    }
}
