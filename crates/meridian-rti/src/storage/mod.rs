//! Snapshot persistence for federation saves.
//!
//! A successful federation save hands the coordinator's encoded state to a
//! [`SaveStore`] under `(federation, label)`; a restore loads it back. The
//! trait is synchronous, like the rest of the coordinator core.

mod chaotic;
mod error;
mod memory;

pub use chaotic::ChaoticSaveStore;
pub use error::StorageError;
pub use memory::MemorySaveStore;

/// Storage for encoded federation snapshots
///
/// Must be Clone (one store is shared by every federation of an executive),
/// Send + Sync (federations run on separate tasks), and synchronous.
/// Implementations typically share internal state via Arc, so clones access
/// the same underlying store.
///
/// # Panics
///
/// Implementations may panic if internal synchronization primitives are
/// poisoned. Acceptable for test/simulation code, but production
/// implementations should handle poisoned mutexes gracefully.
pub trait SaveStore: Clone + Send + Sync + 'static {
    /// Store a snapshot, replacing any previous one under the same label.
    fn store_snapshot(
        &self,
        federation: &str,
        label: &str,
        snapshot: &[u8],
    ) -> Result<(), StorageError>;

    /// Load a snapshot. `None` if nothing is stored under the label.
    fn load_snapshot(&self, federation: &str, label: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Labels stored for a federation, sorted.
    fn list_labels(&self, federation: &str) -> Result<Vec<String>, StorageError>;

    /// Remove every snapshot of a federation.
    fn remove_federation(&self, federation: &str) -> Result<(), StorageError>;
}
