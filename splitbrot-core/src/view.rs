use crate::precision::Precision;
use crate::BigFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ViewError {
    #[error("unity pixel vector must be non-zero")]
    ZeroUnity,
    #[error("view center ({0}, {1}) lies outside [-2, 2)")]
    CenterOutOfRange(f64, f64),
    #[error("image dimensions must be non-zero, got {0}x{1}")]
    EmptyImage(u32, u32),
    #[error("failed to parse coordinate: {0}")]
    Parse(String),
}

/// What the view layer hands the engine.
///
/// `unity` is the complex step from one pixel to its right-hand
/// neighbour; a non-zero imaginary part rotates the image. Pixel `(x, y)`
/// of a `w × h` image sits at `center + (x - w/2)·unity + (y - h/2)·i·unity`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewParams {
    pub center: (BigFloat, BigFloat),
    pub unity: (BigFloat, BigFloat),
    pub precision: Precision,
}

impl ViewParams {
    /// Builds a view and chooses the precision its pixel step needs.
    pub fn new(
        center: (BigFloat, BigFloat),
        unity: (BigFloat, BigFloat),
    ) -> Result<Self, ViewError> {
        if unity.0.is_zero() && unity.1.is_zero() {
            return Err(ViewError::ZeroUnity);
        }
        let (re, im) = (center.0.to_f64(), center.1.to_f64());
        if !(-2.0..2.0).contains(&re) || !(-2.0..2.0).contains(&im) {
            return Err(ViewError::CenterOutOfRange(re, im));
        }
        let precision = Precision::for_unity(&unity);
        Ok(Self {
            center,
            unity,
            precision,
        })
    }

    pub fn from_f64(
        center_re: f64,
        center_im: f64,
        unity_re: f64,
        unity_im: f64,
    ) -> Result<Self, ViewError> {
        let bits = 128;
        Self::new(
            (
                BigFloat::with_precision(center_re, bits),
                BigFloat::with_precision(center_im, bits),
            ),
            (
                BigFloat::with_precision(unity_re, bits),
                BigFloat::with_precision(unity_im, bits),
            ),
        )
    }

    /// Fits a square of side `size` around the center into the shorter
    /// image dimension, unrotated.
    pub fn fit(
        center_re: &str,
        center_im: &str,
        size: &str,
        width: u32,
        height: u32,
        precision_bits: usize,
    ) -> Result<Self, ViewError> {
        if width == 0 || height == 0 {
            return Err(ViewError::EmptyImage(width, height));
        }
        let parse = |s: &str| BigFloat::from_string(s, precision_bits).map_err(ViewError::Parse);
        let short_side = BigFloat::with_precision(width.min(height) as f64, precision_bits);
        let step = parse(size)?.div(&short_side);
        Self::new(
            (parse(center_re)?, parse(center_im)?),
            (step, BigFloat::zero(precision_bits)),
        )
    }

    /// Overrides the automatically chosen precision.
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_divides_size_by_the_short_side() {
        let view = ViewParams::fit("-0.75", "0", "2.5", 200, 100, 128).unwrap();
        assert!((view.unity.0.to_f64() - 0.025).abs() < 1e-15);
        assert!(view.unity.1.is_zero());
        assert_eq!(view.precision, Precision::Double);
    }

    #[test]
    fn deep_fit_switches_to_fixed_point() {
        let view = ViewParams::fit("-1.401155", "0", "1e-20", 100, 100, 512).unwrap();
        assert!(matches!(view.precision, Precision::Fixed { limbs } if limbs >= 2));
    }

    #[test]
    fn zero_unity_is_rejected() {
        assert_eq!(
            ViewParams::from_f64(0.0, 0.0, 0.0, 0.0),
            Err(ViewError::ZeroUnity)
        );
    }

    #[test]
    fn center_must_be_representable() {
        assert!(matches!(
            ViewParams::from_f64(2.5, 0.0, 0.01, 0.0),
            Err(ViewError::CenterOutOfRange(..))
        ));
    }

    #[test]
    fn view_params_serialization_roundtrip() {
        let view = ViewParams::from_f64(-0.5, 0.25, 1.0 / 64.0, 0.0).unwrap();
        let json = serde_json::to_string(&view).unwrap();
        let restored: ViewParams = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, view);
    }
}
