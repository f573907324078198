//! Fuzz target for federation snapshot decoding
//!
//! Snapshots come back from the save store, which may hold truncated or
//! corrupted bytes.
//!
//! # Strategy
//!
//! - Random bytes: completely arbitrary CBOR data
//! - Deeply nested: arrays nested to arbitrary depth (stack overflow)
//! - Huge lengths: CBOR claiming massive array or string lengths (memory)
//!
//! # Invariants
//!
//! - Decoding completes quickly and returns an error on garbage
//! - Huge claimed lengths are rejected, not allocated
//! - A decoded snapshot survives an encode/decode round trip unchanged
//! - NEVER panic on malformed CBOR

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use meridian_rti::FederationSnapshot;

#[derive(Debug, Clone, Arbitrary)]
enum SnapshotInput {
    RandomBytes { bytes: Vec<u8> },
    DeeplyNested { depth: u8 },
    HugeLength { claimed_len_exponent: u8, array: bool },
}

fuzz_target!(|input: SnapshotInput| {
    let bytes = match input {
        SnapshotInput::RandomBytes { bytes } => bytes,
        SnapshotInput::DeeplyNested { depth } => {
            let mut bytes = vec![0x83, 0x61, b'f'];
            bytes.extend(std::iter::repeat_n(0x81, usize::from(depth)));
            bytes.push(0x01);
            bytes
        }
        SnapshotInput::HugeLength { claimed_len_exponent, array } => {
            let exponent = u32::from(claimed_len_exponent % 32);
            let claimed = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
            let mut bytes = vec![0x83, if array { 0x9A } else { 0x7A }];
            bytes.extend_from_slice(&claimed.to_be_bytes());
            bytes.extend(std::iter::repeat_n(0x01, (claimed as usize).min(8)));
            bytes
        }
    };

    if let Ok(snapshot) = FederationSnapshot::decode(&bytes) {
        let encoded = snapshot.encode().expect("decoded snapshot must encode");
        assert_eq!(FederationSnapshot::decode(&encoded).ok(), Some(snapshot));
    }
});
