//! Fuzz target for federation operation sequences
//!
//! # Strategy
//!
//! - Arbitrary operation sequences across four federate slots: joins,
//!   resignations, crashes, time management, ownership transfer,
//!   synchronization points, save and restore
//! - Save store that fails a seeded fraction of writes and reads
//!
//! # Invariants
//!
//! - Standard invariants hold after every operation
//! - Store failures surface as failure callbacks, never as panics
//! - NEVER panic on any request sequence

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use meridian_harness::{InvariantRegistry, Operation, SimFederation};
use meridian_rti::{ChaoticSaveStore, FederationConfig, MemorySaveStore};

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u64,
    failure_percent: u8,
    operations: Vec<Operation>,
}

fuzz_target!(|input: Input| {
    let failure_rate = f64::from(input.failure_percent % 101) / 100.0;
    let store = ChaoticSaveStore::with_seed(MemorySaveStore::new(), failure_rate, input.seed);
    let mut sim = SimFederation::with_store(FederationConfig::default(), store);
    let registry = InvariantRegistry::standard();

    for (step, op) in input.operations.iter().take(256).enumerate() {
        sim.apply(op);
        registry.assert_all(&sim.snapshot(), &format!("after step {step} ({op:?})"));
    }
});
