//! Fuzz target for logical time decoding
//!
//! # Strategy
//!
//! - Arbitrary byte slices of any length fed to every time and interval
//!   decoder
//!
//! # Invariants
//!
//! - Wrong lengths are rejected, never truncated or padded
//! - A decoded value survives an encode/decode round trip unchanged
//! - Decoded float values are finite and float times non-negative
//! - NEVER panic on malformed input

#![no_main]

use libfuzzer_sys::fuzz_target;
use meridian_core::{
    Float64Interval, Float64Time, Integer64Interval, Integer64Time, LogicalTime,
    LogicalTimeInterval,
};

fn check_time<T: LogicalTime>(data: &[u8]) {
    if let Ok(time) = T::decode(data) {
        assert_eq!(data.len(), 8, "decoded {} bytes", data.len());
        assert_eq!(T::decode(&time.encode()).ok(), Some(time));
        assert!(time >= T::initial());
    }
}

fn check_interval<I: LogicalTimeInterval>(data: &[u8]) {
    if let Ok(interval) = I::decode(data) {
        assert_eq!(data.len(), 8, "decoded {} bytes", data.len());
        assert_eq!(I::decode(&interval.encode()).ok(), Some(interval));
    }
}

fuzz_target!(|data: &[u8]| {
    check_time::<Integer64Time>(data);
    check_time::<Float64Time>(data);
    check_interval::<Integer64Interval>(data);
    check_interval::<Float64Interval>(data);

    if let Ok(time) = Float64Time::decode(data) {
        assert!(time.value().is_finite());
    }
    if let Ok(interval) = Float64Interval::decode(data) {
        assert!(interval.value().is_finite());
    }
});
