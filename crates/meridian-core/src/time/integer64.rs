//! 64-bit integer time representation.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ENCODED_LEN, LogicalTime, LogicalTimeInterval, TimeError, fixed_width};

/// Integer logical time in `[0, i64::MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Integer64Time(i64);

/// Signed integer interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Integer64Interval(i64);

impl Integer64Time {
    /// Construct a time from a known non-negative value.
    ///
    /// Negative values are clamped to the initial time. Use
    /// [`Integer64Time::try_new`] for values from outside the process.
    pub const fn new(value: i64) -> Self {
        if value < 0 { Self(0) } else { Self(value) }
    }

    /// Construct a time, rejecting negative values like `decode` does.
    pub fn try_new(value: i64) -> Result<Self, TimeError> {
        if value < 0 {
            return Err(TimeError::OutOfRange(format!("negative integer time {value}")));
        }
        Ok(Self(value))
    }

    /// Raw value.
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl Integer64Interval {
    /// Construct an interval. Negative values are representable so lookahead
    /// validation can reject them.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Raw value.
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Integer64Time {
    type Error = TimeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<Integer64Time> for i64 {
    fn from(time: Integer64Time) -> Self {
        time.0
    }
}

impl fmt::Display for Integer64Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Integer64Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl LogicalTimeInterval for Integer64Interval {
    fn zero() -> Self {
        Self(0)
    }

    fn epsilon() -> Self {
        Self(1)
    }

    fn encode(&self) -> [u8; ENCODED_LEN] {
        self.0.to_be_bytes()
    }

    fn decode(bytes: &[u8]) -> Result<Self, TimeError> {
        Ok(Self(i64::from_be_bytes(fixed_width(bytes)?)))
    }
}

impl LogicalTime for Integer64Time {
    type Interval = Integer64Interval;

    fn initial() -> Self {
        Self(0)
    }

    fn final_time() -> Self {
        Self(i64::MAX)
    }

    fn add(self, interval: Integer64Interval) -> Result<Self, TimeError> {
        match self.0.checked_add(interval.0) {
            Some(v) if v >= 0 => Ok(Self(v)),
            Some(_) => Err(TimeError::Underflow(format!("{self} + {interval}"))),
            None if interval.0 < 0 => Err(TimeError::Underflow(format!("{self} + {interval}"))),
            None => Err(TimeError::Overflow(format!("{self} + {interval}"))),
        }
    }

    fn subtract(self, interval: Integer64Interval) -> Result<Self, TimeError> {
        match self.0.checked_sub(interval.0) {
            Some(v) if v >= 0 => Ok(Self(v)),
            Some(_) => Err(TimeError::Underflow(format!("{self} - {interval}"))),
            None => Err(TimeError::Overflow(format!("{self} - {interval}"))),
        }
    }

    fn distance(self, earlier: Self) -> Result<Integer64Interval, TimeError> {
        // both operands are non-negative, so the difference always fits
        Ok(Integer64Interval(self.0 - earlier.0))
    }

    fn successor(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    fn encode(&self) -> [u8; ENCODED_LEN] {
        self.0.to_be_bytes()
    }

    fn decode(bytes: &[u8]) -> Result<Self, TimeError> {
        Self::try_new(i64::from_be_bytes(fixed_width(bytes)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_within_range() {
        let t = Integer64Time::new(10);
        assert_eq!(t.add(Integer64Interval::new(5)).unwrap(), Integer64Time::new(15));
        assert_eq!(t.subtract(Integer64Interval::new(10)).unwrap(), Integer64Time::initial());
        assert_eq!(Integer64Time::new(15).distance(t).unwrap(), Integer64Interval::new(5));
    }

    #[test]
    fn arithmetic_past_bounds_fails() {
        let t = Integer64Time::new(3);
        assert!(matches!(t.subtract(Integer64Interval::new(4)), Err(TimeError::Underflow(_))));
        assert!(matches!(
            Integer64Time::final_time().add(Integer64Interval::new(1)),
            Err(TimeError::Overflow(_))
        ));
    }

    #[test]
    fn saturating_add_clamps_to_final() {
        let near_end = Integer64Time::new(i64::MAX - 1);
        assert_eq!(near_end.saturating_add(Integer64Interval::new(10)), Integer64Time::final_time());
        assert_eq!(Integer64Time::final_time().successor(), Integer64Time::final_time());
    }

    #[test]
    fn encoding_is_big_endian() {
        let t = Integer64Time::new(0x0102_0304_0506_0708);
        assert_eq!(t.encode(), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(Integer64Time::decode(&t.encode()).unwrap(), t);
    }

    #[test]
    fn decode_rejects_negative_time() {
        let bytes = (-1i64).to_be_bytes();
        assert!(matches!(Integer64Time::decode(&bytes), Err(TimeError::OutOfRange(_))));
        // negative intervals are valid values
        assert_eq!(Integer64Interval::decode(&bytes).unwrap(), Integer64Interval::new(-1));
    }

    #[test]
    fn negative_construction_clamps() {
        assert_eq!(Integer64Time::new(-5), Integer64Time::initial());
    }

    #[test]
    fn fallible_construction_rejects_negative() {
        assert!(matches!(Integer64Time::try_new(-5), Err(TimeError::OutOfRange(_))));
        assert!(matches!(Integer64Time::try_from(-1), Err(TimeError::OutOfRange(_))));
        assert_eq!(Integer64Time::try_new(7).unwrap(), Integer64Time::new(7));
        assert_eq!(i64::from(Integer64Time::new(7)), 7);
    }
}
