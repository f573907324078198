//! Logical time abstraction.
//!
//! A federation execution fixes one time representation when it is created.
//! Both standard representations are provided: [`Integer64Time`] and
//! [`Float64Time`], each with a matching interval type.
//!
//! # Encoding
//!
//! Every time and interval encodes to exactly [`ENCODED_LEN`] bytes, big
//! endian. Decoding validates length and value range and never panics.

mod float64;
mod integer64;

use std::fmt;

pub use float64::{Float64Interval, Float64Time};
pub use integer64::{Integer64Interval, Integer64Time};
use thiserror::Error;

/// Size in bytes of an encoded time or interval.
pub const ENCODED_LEN: usize = 8;

/// Errors from time arithmetic and decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    /// Result would exceed the final time.
    #[error("time arithmetic overflow: {0}")]
    Overflow(String),

    /// Result would precede the initial time.
    #[error("time arithmetic underflow: {0}")]
    Underflow(String),

    /// Floating point value is NaN or infinite.
    #[error("non-finite value: {0}")]
    NonFinite(String),

    /// Encoded buffer has the wrong size.
    #[error("invalid encoding length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Required length
        expected: usize,
        /// Length received
        actual: usize,
    },

    /// Decoded value is outside the representable range.
    #[error("value out of range: {0}")]
    OutOfRange(String),
}

/// Interval between two logical times.
pub trait LogicalTimeInterval:
    Copy + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// The zero interval.
    fn zero() -> Self;

    /// Smallest positive interval.
    fn epsilon() -> Self;

    /// Whether this is the zero interval.
    fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    /// Whether this interval is below zero.
    fn is_negative(&self) -> bool {
        *self < Self::zero()
    }

    /// Fixed-width big-endian encoding.
    fn encode(&self) -> [u8; ENCODED_LEN];

    /// Decode from exactly [`ENCODED_LEN`] bytes.
    fn decode(bytes: &[u8]) -> Result<Self, TimeError>;
}

/// Totally ordered logical time.
///
/// # Invariants
///
/// - `initial() <= t <= final_time()` for every value produced by arithmetic
///   or decoding
/// - `t.successor() > t` unless `t` is the final time
pub trait LogicalTime: Copy + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Interval type paired with this time.
    type Interval: LogicalTimeInterval;

    /// Earliest representable time; every federate starts here.
    fn initial() -> Self;

    /// Latest representable time.
    fn final_time() -> Self;

    /// Whether this is the initial time.
    fn is_initial(&self) -> bool {
        *self == Self::initial()
    }

    /// Whether this is the final time.
    fn is_final(&self) -> bool {
        *self == Self::final_time()
    }

    /// `self + interval`.
    fn add(self, interval: Self::Interval) -> Result<Self, TimeError>;

    /// `self - interval`.
    fn subtract(self, interval: Self::Interval) -> Result<Self, TimeError>;

    /// `self - earlier` as an interval.
    fn distance(self, earlier: Self) -> Result<Self::Interval, TimeError>;

    /// `self + interval`, clamped to the final time.
    ///
    /// Only meaningful for non-negative intervals.
    fn saturating_add(self, interval: Self::Interval) -> Self {
        self.add(interval).unwrap_or_else(|_| Self::final_time())
    }

    /// Smallest representable time strictly after `self`, or the final time.
    fn successor(self) -> Self;

    /// Fixed-width big-endian encoding.
    fn encode(&self) -> [u8; ENCODED_LEN];

    /// Decode from exactly [`ENCODED_LEN`] bytes.
    fn decode(bytes: &[u8]) -> Result<Self, TimeError>;
}

/// Copy `bytes` into a fixed array, checking the length.
pub(crate) fn fixed_width(bytes: &[u8]) -> Result<[u8; ENCODED_LEN], TimeError> {
    <[u8; ENCODED_LEN]>::try_from(bytes)
        .map_err(|_| TimeError::InvalidLength { expected: ENCODED_LEN, actual: bytes.len() })
}
