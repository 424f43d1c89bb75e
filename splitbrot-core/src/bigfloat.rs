use crate::fixed_point::{FixedPoint, FixedPointError};
use crate::limbs::{Limb, LIMB_BITS};
use dashu::integer::{IBig, UBig};
use dashu_base::{Abs, Approximation, BitTest, UnsignedAbs};
use dashu_float::{DBig, FBig};
use serde::{Deserialize, Serialize};

/// Arbitrary precision floating point with explicit precision enforcement
///
/// Uses f64 internally when precision_bits <= 64, FBig otherwise.
/// View coordinates live in this type; the escape kernels consume them
/// after conversion to f64 or [`FixedPoint`].
#[derive(Clone, Debug)]
pub struct BigFloat {
    value: BigFloatValue,
    precision_bits: usize,
}

#[derive(Clone, Debug)]
pub enum BigFloatValue {
    F64(f64),
    Arbitrary(FBig),
}

impl BigFloat {
    /// Create BigFloat from f64 with explicit precision
    ///
    /// NO DEFAULT - precision must always be specified.
    /// Non-finite input only survives on the f64 path.
    pub fn with_precision(val: f64, precision_bits: usize) -> Self {
        debug_assert!(val.is_finite() || precision_bits <= 64);
        let value = if precision_bits <= 64 {
            BigFloatValue::F64(val)
        } else {
            let fbig = FBig::try_from(val)
                .unwrap_or(FBig::ZERO)
                .with_precision(precision_bits)
                .value();
            BigFloatValue::Arbitrary(fbig)
        };

        Self {
            value,
            precision_bits,
        }
    }

    /// Create zero with explicit precision
    pub fn zero(precision_bits: usize) -> Self {
        Self::with_precision(0.0, precision_bits)
    }

    /// Create one with explicit precision
    pub fn one(precision_bits: usize) -> Self {
        Self::with_precision(1.0, precision_bits)
    }

    /// Get precision in bits
    pub fn precision_bits(&self) -> usize {
        self.precision_bits
    }

    /// Same value carried at a different precision.
    pub fn to_precision(&self, precision_bits: usize) -> Self {
        if precision_bits <= 64 {
            return Self::with_precision(self.to_f64(), precision_bits);
        }
        Self {
            value: BigFloatValue::Arbitrary(self.to_fbig().with_precision(precision_bits).value()),
            precision_bits,
        }
    }

    /// Convert to f64 (previews and precision decisions only)
    /// May lose precision for values requiring > 64 bits
    pub fn to_f64(&self) -> f64 {
        match &self.value {
            BigFloatValue::F64(v) => *v,
            BigFloatValue::Arbitrary(v) => v.to_f64().value(),
        }
    }

    /// Create BigFloat from string with explicit precision
    ///
    /// Allows creating values beyond f64 range (e.g., "1e-1000").
    /// Uses atomic base conversion with target precision to avoid precision loss.
    pub fn from_string(val: &str, precision_bits: usize) -> Result<Self, String> {
        if precision_bits <= 64 {
            val.parse::<f64>()
                .map(|f| Self::with_precision(f, precision_bits))
                .map_err(|e| format!("Failed to parse f64: {}", e))
        } else {
            val.parse::<DBig>()
                .map_err(|e| format!("Failed to parse DBig: {}", e))
                .map(|dbig| {
                    let fbig_halfaway = match dbig.with_base_and_precision::<2>(precision_bits) {
                        Approximation::Exact(v) => v,
                        Approximation::Inexact(v, _) => v,
                    };
                    let fbig_with_prec =
                        fbig_halfaway.with_rounding::<dashu_float::round::mode::Zero>();
                    Self {
                        value: BigFloatValue::Arbitrary(fbig_with_prec),
                        precision_bits,
                    }
                })
        }
    }

    /// Add two BigFloats, preserving max precision
    pub fn add(&self, other: &Self) -> Self {
        self.binary_op(other, |a, b| a + b, |a, b| a + b)
    }

    /// Subtract two BigFloats, preserving max precision
    pub fn sub(&self, other: &Self) -> Self {
        self.binary_op(other, |a, b| a - b, |a, b| a - b)
    }

    /// Multiply two BigFloats, preserving max precision
    pub fn mul(&self, other: &Self) -> Self {
        self.binary_op(other, |a, b| a * b, |a, b| a * b)
    }

    /// Divide two BigFloats, preserving max precision
    pub fn div(&self, other: &Self) -> Self {
        self.binary_op(other, |a, b| a / b, |a, b| a / b)
    }

    fn binary_op(
        &self,
        other: &Self,
        on_f64: impl Fn(f64, f64) -> f64,
        on_fbig: impl Fn(&FBig, &FBig) -> FBig,
    ) -> Self {
        let result_precision = self.precision_bits.max(other.precision_bits);

        let result_value = match (&self.value, &other.value) {
            (BigFloatValue::F64(a), BigFloatValue::F64(b)) if result_precision <= 64 => {
                BigFloatValue::F64(on_f64(*a, *b))
            }
            _ => {
                let a_big = self.to_fbig_at(result_precision);
                let b_big = other.to_fbig_at(result_precision);
                BigFloatValue::Arbitrary(on_fbig(&a_big, &b_big))
            }
        };

        Self {
            value: result_value,
            precision_bits: result_precision,
        }
    }

    /// Absolute value
    pub fn abs(&self) -> Self {
        let value = match &self.value {
            BigFloatValue::F64(v) => BigFloatValue::F64(v.abs()),
            BigFloatValue::Arbitrary(v) => BigFloatValue::Arbitrary(v.clone().abs()),
        };
        Self {
            value,
            precision_bits: self.precision_bits,
        }
    }

    pub fn neg(&self) -> Self {
        let value = match &self.value {
            BigFloatValue::F64(v) => BigFloatValue::F64(-v),
            BigFloatValue::Arbitrary(v) => BigFloatValue::Arbitrary(-v.clone()),
        };
        Self {
            value,
            precision_bits: self.precision_bits,
        }
    }

    pub fn is_zero(&self) -> bool {
        match &self.value {
            BigFloatValue::F64(v) => *v == 0.0,
            BigFloatValue::Arbitrary(v) => *v.repr().significand() == IBig::ZERO,
        }
    }

    /// log2(|self|) to within a fraction of a bit, without underflowing at
    /// depths f64 cannot represent. Zero gives negative infinity.
    pub fn log2_approx(&self) -> f64 {
        match &self.value {
            BigFloatValue::F64(v) => v.abs().log2(),
            BigFloatValue::Arbitrary(v) => {
                let repr = v.repr();
                if *repr.significand() == IBig::ZERO {
                    return f64::NEG_INFINITY;
                }
                let significand: UBig = repr.significand().clone().unsigned_abs();
                let shift = significand.bit_len().saturating_sub(53);
                let top = u64::try_from(significand >> shift).unwrap_or(u64::MAX);
                (top as f64).log2() + (shift as isize + repr.exponent()) as f64
            }
        }
    }

    /// Exact conversion to the fixed-point format, rounding half-up below
    /// the last limb.
    pub fn to_fixed(&self, limb_count: usize) -> Result<FixedPoint, FixedPointError> {
        match &self.value {
            BigFloatValue::F64(v) => FixedPoint::from_f64(*v, limb_count),
            BigFloatValue::Arbitrary(v) => fbig_to_fixed(v, limb_count),
        }
    }

    fn to_fbig(&self) -> FBig {
        self.to_fbig_at(self.precision_bits)
    }

    fn to_fbig_at(&self, precision_bits: usize) -> FBig {
        match &self.value {
            BigFloatValue::F64(v) => FBig::try_from(*v)
                .unwrap_or(FBig::ZERO)
                .with_precision(precision_bits.max(64))
                .value(),
            BigFloatValue::Arbitrary(v) => v.clone(),
        }
    }
}

fn fbig_to_fixed(value: &FBig, limb_count: usize) -> Result<FixedPoint, FixedPointError> {
    if limb_count == 0 {
        return Err(FixedPointError::NoLimbs);
    }
    let repr = value.repr();
    let negative = *repr.significand() < IBig::ZERO;
    let significand: UBig = repr.significand().clone().unsigned_abs();
    let total_bits = limb_count * LIMB_BITS as usize;
    let shift = repr.exponent() + total_bits as isize - 1;
    let magnitude = if shift >= 0 {
        significand << shift as usize
    } else {
        let dropped = shift.unsigned_abs();
        (significand + (UBig::ONE << (dropped - 1))) >> dropped
    };
    if magnitude.bit_len() > total_bits {
        return Err(FixedPointError::OutOfRange(value.to_string()));
    }
    let mut limbs = vec![0; limb_count];
    for (i, chunk) in magnitude.to_le_bytes().chunks(8).enumerate() {
        let mut word = [0u8; 8];
        word[..chunk.len()].copy_from_slice(chunk);
        limbs[limb_count - 1 - i] = Limb::from_le_bytes(word);
    }
    let is_zero = magnitude == UBig::ZERO;
    Ok(FixedPoint::from_parts(negative && !is_zero, limbs))
}

impl PartialEq for BigFloat {
    fn eq(&self, other: &Self) -> bool {
        match (&self.value, &other.value) {
            (BigFloatValue::F64(a), BigFloatValue::F64(b)) => a == b,
            _ => self.to_fbig() == other.to_fbig(),
        }
    }
}

impl PartialOrd for BigFloat {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (&self.value, &other.value) {
            (BigFloatValue::F64(a), BigFloatValue::F64(b)) => a.partial_cmp(b),
            _ => self.to_fbig().partial_cmp(&other.to_fbig()),
        }
    }
}

impl std::fmt::Display for BigFloat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            BigFloatValue::F64(v) => write!(f, "{}", v),
            BigFloatValue::Arbitrary(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct BigFloatSerde {
    value: String,
    precision_bits: usize,
}

impl Serialize for BigFloat {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let value_str = match &self.value {
            BigFloatValue::F64(v) => v.to_string(),
            BigFloatValue::Arbitrary(v) => v.to_string(),
        };

        let serde = BigFloatSerde {
            value: value_str,
            precision_bits: self.precision_bits,
        };

        serde.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BigFloat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let serde = BigFloatSerde::deserialize(deserializer)?;

        let value = if serde.precision_bits <= 64 {
            let f = serde
                .value
                .parse::<f64>()
                .map_err(|e| serde::de::Error::custom(format!("Failed to parse f64: {}", e)))?;
            BigFloatValue::F64(f)
        } else {
            let fbig = serde
                .value
                .parse::<FBig>()
                .map_err(|e| serde::de::Error::custom(format!("Failed to parse FBig: {}", e)))?;
            BigFloatValue::Arbitrary(fbig)
        };

        Ok(BigFloat {
            value,
            precision_bits: serde.precision_bits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abs_returns_positive_for_negative_value() {
        let neg = BigFloat::with_precision(-5.0, 64);
        assert_eq!(neg.abs().to_f64(), 5.0);
    }

    #[test]
    fn abs_works_with_arbitrary_precision() {
        let neg = BigFloat::from_string("-1e-500", 7000).unwrap();
        let pos = BigFloat::from_string("1e-500", 7000).unwrap();
        assert_eq!(neg.abs(), pos);
    }

    #[test]
    fn neg_flips_sign_at_both_precisions() {
        assert_eq!(BigFloat::with_precision(2.5, 64).neg().to_f64(), -2.5);
        assert_eq!(BigFloat::with_precision(2.5, 256).neg().to_f64(), -2.5);
    }

    #[test]
    fn log2_approx_is_accurate_for_powers_of_two() {
        let v = BigFloat::with_precision(0.125, 256);
        assert!((v.log2_approx() + 3.0).abs() < 1e-9);
        assert!((BigFloat::with_precision(-8.0, 64).log2_approx() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn log2_approx_survives_extreme_depth() {
        let v = BigFloat::from_string("1e-500", 7000).unwrap();
        let expected = -500.0 * std::f64::consts::LOG2_10;
        assert!((v.log2_approx() - expected).abs() < 0.01);
    }

    #[test]
    fn log2_of_zero_is_negative_infinity() {
        assert_eq!(BigFloat::zero(256).log2_approx(), f64::NEG_INFINITY);
    }

    #[test]
    fn to_fixed_agrees_with_the_f64_path() {
        let wide = BigFloat::with_precision(-0.7109375, 512);
        let narrow = BigFloat::with_precision(-0.7109375, 64);
        assert_eq!(wide.to_fixed(4).unwrap(), narrow.to_fixed(4).unwrap());
    }

    #[test]
    fn to_fixed_keeps_bits_below_f64_precision() {
        // 2^-80 is lost entirely next to 0.5 in f64
        let v = BigFloat::with_precision(0.5, 256)
            .add(&BigFloat::with_precision(2f64.powi(-80), 256));
        let fixed = v.to_fixed(2).unwrap();
        assert_eq!(fixed.magnitude()[0], 0x4000_0000_0000_0000);
        // 2^-80 scaled by 2^127 is 2^47
        assert_eq!(fixed.magnitude()[1], 1 << 47);
    }

    #[test]
    fn to_fixed_rejects_out_of_range() {
        let v = BigFloat::with_precision(2.0, 256);
        assert!(v.to_fixed(2).is_err());
    }

    #[test]
    fn div_of_arbitrary_values() {
        let a = BigFloat::with_precision(3.0, 256);
        let b = BigFloat::with_precision(4.0, 256);
        assert_eq!(a.div(&b).to_f64(), 0.75);
    }
}
