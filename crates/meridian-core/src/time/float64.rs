//! 64-bit floating point time representation.
//!
//! Values are finite and non-negative. `-0.0` is normalized to `0.0` so the
//! total order agrees with equality.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

use super::{ENCODED_LEN, LogicalTime, LogicalTimeInterval, TimeError, fixed_width};

/// Floating point logical time in `[0.0, f64::MAX]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Float64Time(f64);

/// Finite floating point interval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Float64Interval(f64);

fn finite(value: f64) -> Result<f64, TimeError> {
    if value.is_finite() {
        // normalize negative zero
        Ok(if value == 0.0 { 0.0 } else { value })
    } else {
        Err(TimeError::NonFinite(value.to_string()))
    }
}

impl Float64Time {
    /// Construct a time; rejects NaN, infinities and negative values.
    pub fn new(value: f64) -> Result<Self, TimeError> {
        let value = finite(value)?;
        if value < 0.0 {
            return Err(TimeError::OutOfRange(format!("negative float time {value}")));
        }
        Ok(Self(value))
    }

    /// Raw value.
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl Float64Interval {
    /// Construct an interval; rejects NaN and infinities.
    pub fn new(value: f64) -> Result<Self, TimeError> {
        Ok(Self(finite(value)?))
    }

    /// Raw value.
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Float64Time {
    type Error = TimeError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Float64Time> for f64 {
    fn from(time: Float64Time) -> Self {
        time.0
    }
}

impl TryFrom<f64> for Float64Interval {
    type Error = TimeError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Float64Interval> for f64 {
    fn from(interval: Float64Interval) -> Self {
        interval.0
    }
}

impl PartialEq for Float64Time {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Float64Time {}

impl PartialOrd for Float64Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Float64Time {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialEq for Float64Interval {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Float64Interval {}

impl PartialOrd for Float64Interval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Float64Interval {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Float64Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Float64Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl LogicalTimeInterval for Float64Interval {
    fn zero() -> Self {
        Self(0.0)
    }

    fn epsilon() -> Self {
        // smallest positive subnormal
        Self(f64::from_bits(1))
    }

    fn encode(&self) -> [u8; ENCODED_LEN] {
        self.0.to_bits().to_be_bytes()
    }

    fn decode(bytes: &[u8]) -> Result<Self, TimeError> {
        Self::new(f64::from_bits(u64::from_be_bytes(fixed_width(bytes)?)))
    }
}

impl LogicalTime for Float64Time {
    type Interval = Float64Interval;

    fn initial() -> Self {
        Self(0.0)
    }

    fn final_time() -> Self {
        Self(f64::MAX)
    }

    fn add(self, interval: Float64Interval) -> Result<Self, TimeError> {
        let sum = self.0 + interval.0;
        if !sum.is_finite() {
            return Err(TimeError::Overflow(format!("{self} + {interval}")));
        }
        if sum < 0.0 {
            return Err(TimeError::Underflow(format!("{self} + {interval}")));
        }
        Self::new(sum)
    }

    fn subtract(self, interval: Float64Interval) -> Result<Self, TimeError> {
        let difference = self.0 - interval.0;
        if !difference.is_finite() {
            return Err(TimeError::Overflow(format!("{self} - {interval}")));
        }
        if difference < 0.0 {
            return Err(TimeError::Underflow(format!("{self} - {interval}")));
        }
        Self::new(difference)
    }

    fn distance(self, earlier: Self) -> Result<Float64Interval, TimeError> {
        Float64Interval::new(self.0 - earlier.0)
    }

    fn successor(self) -> Self {
        if self.is_final() { self } else { Self(self.0.next_up()) }
    }

    fn encode(&self) -> [u8; ENCODED_LEN] {
        self.0.to_bits().to_be_bytes()
    }

    fn decode(bytes: &[u8]) -> Result<Self, TimeError> {
        Self::new(f64::from_bits(u64::from_be_bytes(fixed_width(bytes)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_finite_values() {
        assert!(matches!(Float64Time::new(f64::NAN), Err(TimeError::NonFinite(_))));
        assert!(matches!(Float64Time::new(f64::INFINITY), Err(TimeError::NonFinite(_))));
        assert!(matches!(Float64Interval::new(f64::NEG_INFINITY), Err(TimeError::NonFinite(_))));
        assert!(matches!(Float64Time::new(-1.0), Err(TimeError::OutOfRange(_))));
    }

    #[test]
    fn negative_zero_equals_zero() {
        let neg = Float64Time::new(-0.0).unwrap();
        assert_eq!(neg, Float64Time::initial());
        assert_eq!(neg.encode(), Float64Time::initial().encode());
    }

    #[test]
    fn successor_is_strictly_greater() {
        let t = Float64Time::new(1.5).unwrap();
        assert!(t.successor() > t);
        assert_eq!(Float64Time::final_time().successor(), Float64Time::final_time());
    }

    #[test]
    fn add_overflow_is_reported() {
        let big = Float64Interval::new(f64::MAX).unwrap();
        assert!(matches!(Float64Time::final_time().add(big), Err(TimeError::Overflow(_))));
        assert_eq!(Float64Time::final_time().saturating_add(big), Float64Time::final_time());
    }

    #[test]
    fn decode_rejects_nan_bit_patterns() {
        let bytes = f64::NAN.to_bits().to_be_bytes();
        assert!(Float64Time::decode(&bytes).is_err());
        assert!(Float64Interval::decode(&bytes).is_err());
    }

    #[test]
    fn encoding_matches_ieee754_big_endian() {
        let t = Float64Time::new(1.0).unwrap();
        assert_eq!(t.encode(), [0x3f, 0xf0, 0, 0, 0, 0, 0, 0]);
    }
}
