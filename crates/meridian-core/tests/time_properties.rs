//! Property-based tests for the logical time representations
//!
//! The coordinator relies on three things from a time type: a total order
//! consistent with arithmetic, an 8-byte encoding whose byte order matches
//! the value order for non-negative times, and decoding that never panics.

use meridian_core::{
    Float64Interval, Float64Time, Integer64Interval, Integer64Time, LogicalTime,
    LogicalTimeInterval, TimeError,
};
use proptest::prelude::*;

fn float_time() -> impl Strategy<Value = Float64Time> {
    (0.0f64..1.0e12).prop_map(|v| Float64Time::new(v).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: Integer encoding round-trips and preserves order bytewise
    #[test]
    fn prop_integer_encoding_preserves_order(a in 0i64.., b in 0i64..) {
        let (ta, tb) = (Integer64Time::new(a), Integer64Time::new(b));
        prop_assert_eq!(Integer64Time::decode(&ta.encode())?, ta);
        prop_assert_eq!(ta.encode().cmp(&tb.encode()), ta.cmp(&tb));
    }

    /// Property: Float encoding preserves order bytewise for non-negative times
    #[test]
    fn prop_float_encoding_preserves_order(a in float_time(), b in float_time()) {
        prop_assert_eq!(Float64Time::decode(&a.encode())?, a);
        prop_assert_eq!(a.encode().cmp(&b.encode()), a.cmp(&b));
    }

    /// Property: Adding a non-negative interval never moves time backwards
    #[test]
    fn prop_add_is_monotonic(t in 0i64..i64::MAX / 2, d in 0i64..i64::MAX / 2) {
        let time = Integer64Time::new(t);
        let later = time.add(Integer64Interval::new(d))?;
        prop_assert!(later >= time);
        prop_assert_eq!(later.distance(time)?, Integer64Interval::new(d));
    }

    /// Property: Successor is the next representable time
    #[test]
    fn prop_successor_is_strict(t in float_time()) {
        prop_assert!(t.successor() > t);
        prop_assert_eq!(t.add(Float64Interval::zero())?, t);
    }

    /// Property: Fallible construction accepts exactly what decoding accepts
    #[test]
    fn prop_integer_construction_matches_decode(value in any::<i64>()) {
        let constructed = Integer64Time::try_new(value);
        let decoded = Integer64Time::decode(&value.to_be_bytes());
        prop_assert_eq!(constructed.is_ok(), value >= 0);
        prop_assert_eq!(constructed.ok(), decoded.ok());
    }

    /// Property: Decoding arbitrary bytes never panics
    #[test]
    fn prop_decode_arbitrary_bytes(bytes in prop::collection::vec(any::<u8>(), 0..16)) {
        let integer = Integer64Time::decode(&bytes);
        let float = Float64Time::decode(&bytes);

        if bytes.len() != 8 {
            prop_assert!(
                matches!(integer, Err(TimeError::InvalidLength { .. })),
                "integer decode of {} bytes: {:?}", bytes.len(), integer
            );
            prop_assert!(
                matches!(float, Err(TimeError::InvalidLength { .. })),
                "float decode of {} bytes: {:?}", bytes.len(), float
            );
        }
    }
}

#[test]
fn float_fixture_encodings() {
    let t = Float64Time::new(2.5).unwrap();
    assert_eq!(hex::encode(t.encode()), "4004000000000000");

    let bytes = hex::decode("3ff0000000000000").unwrap();
    assert_eq!(Float64Time::decode(&bytes).unwrap(), Float64Time::new(1.0).unwrap());
}

#[test]
fn integer_fixture_encodings() {
    assert_eq!(hex::encode(Integer64Time::new(256).encode()), "0000000000000100");
    assert_eq!(hex::encode(Integer64Interval::epsilon().encode()), "0000000000000001");
    assert_eq!(hex::encode(Integer64Time::final_time().encode()), "7fffffffffffffff");
}

#[test]
fn float_epsilon_is_smallest_positive() {
    let eps = Float64Interval::epsilon();
    assert!(!eps.is_zero());
    assert!(!eps.is_negative());
    assert_eq!(hex::encode(eps.encode()), "0000000000000001");
}
