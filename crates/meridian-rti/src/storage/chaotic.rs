//! Chaotic save store wrapper for fault injection testing
//!
//! Randomly fails store operations so tests can check that a failed
//! persistence turns into `FederationNotSaved` rather than corrupting the
//! federation.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use super::{SaveStore, StorageError};

/// Save store wrapper that randomly injects failures
///
/// Delegates to an underlying store but fails operations based on a
/// configured failure rate. The RNG state lives behind Arc<Mutex<>>, making
/// the wrapper Clone and thread-safe.
#[derive(Clone)]
pub struct ChaoticSaveStore<S: SaveStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    /// Number of injected failures
    failures: Arc<Mutex<usize>>,
}

/// Linear congruential generator. Same seed, same failure pattern.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // Numerical Recipes constants
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: SaveStore> ChaoticSaveStore<S> {
    /// Wrap `inner` with the default seed
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            failures: Arc::new(Mutex::new(0)),
        }
    }

    /// Underlying store (for checking what survived the chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of failures injected so far.
    #[allow(clippy::expect_used)]
    pub fn failure_count(&self) -> usize {
        *self.failures.lock().expect("failures mutex poisoned")
    }

    fn inject(&self) -> Result<(), StorageError> {
        #[allow(clippy::expect_used)]
        let fail = self.rng.lock().expect("ChaoticRng mutex poisoned").next() < self.failure_rate;
        if fail {
            #[allow(clippy::expect_used)]
            let mut failures = self.failures.lock().expect("failures mutex poisoned");
            *failures += 1;
            return Err(StorageError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

impl<S: SaveStore> SaveStore for ChaoticSaveStore<S> {
    fn store_snapshot(
        &self,
        federation: &str,
        label: &str,
        snapshot: &[u8],
    ) -> Result<(), StorageError> {
        self.inject()?;
        self.inner.store_snapshot(federation, label, snapshot)
    }

    fn load_snapshot(&self, federation: &str, label: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.inject()?;
        self.inner.load_snapshot(federation, label)
    }

    fn list_labels(&self, federation: &str) -> Result<Vec<String>, StorageError> {
        self.inject()?;
        self.inner.list_labels(federation)
    }

    fn remove_federation(&self, federation: &str) -> Result<(), StorageError> {
        self.inject()?;
        self.inner.remove_federation(federation)
    }
}
