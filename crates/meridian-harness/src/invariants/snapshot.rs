//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of a federation execution at a
//! point in time, together with the per-federate histories the harness has
//! recorded. Invariants operate on snapshots rather than live state.

use meridian_core::{AttributeHandle, FederateHandle, Integer64Time, ObjectInstanceHandle};

/// Snapshot of a whole federation execution.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Joined federates in handle order.
    pub federates: Vec<FederateView>,
    /// Every attribute of every registered object instance.
    pub attributes: Vec<AttributeView>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no federates, no objects).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether `federate` is joined.
    pub fn is_joined(&self, federate: FederateHandle) -> bool {
        self.federates.iter().any(|view| view.handle == federate)
    }
}

/// Time state and history of one joined federate.
#[derive(Debug, Clone)]
pub struct FederateView {
    /// Federate handle.
    pub handle: FederateHandle,
    /// Time regulation enabled.
    pub regulating: bool,
    /// Time constrained enabled.
    pub constrained: bool,
    /// Current logical time.
    pub current_time: Integer64Time,
    /// Current GALT. `None` when no other federate regulates.
    pub galt: Option<Integer64Time>,
    /// Every grant received, in delivery order.
    pub grants: Vec<Integer64Time>,
    /// Observed GALT values since the regulator set last grew.
    pub galts: Vec<Integer64Time>,
    /// Grants that moved a constrained clock forward, with the GALT in
    /// force once the granting request completed.
    pub constrained_advances: Vec<(Integer64Time, Option<Integer64Time>)>,
}

impl FederateView {
    /// View of a federate at the initial time with no history.
    pub fn new(handle: FederateHandle) -> Self {
        Self {
            handle,
            regulating: false,
            constrained: false,
            current_time: Integer64Time::new(0),
            galt: None,
            grants: Vec::new(),
            galts: Vec::new(),
            constrained_advances: Vec::new(),
        }
    }
}

/// Ownership state of one attribute instance.
#[derive(Debug, Clone)]
pub struct AttributeView {
    /// Object instance.
    pub object: ObjectInstanceHandle,
    /// Attribute.
    pub attribute: AttributeHandle,
    /// Current owner.
    pub owner: Option<FederateHandle>,
    /// Waiting acquirers in FIFO order.
    pub requesting: Vec<FederateHandle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_has_no_federates() {
        let snapshot = SystemSnapshot::empty();
        assert!(snapshot.federates.is_empty());
        assert!(!snapshot.is_joined(FederateHandle::new(1)));
    }

    #[test]
    fn joined_lookup() {
        let mut snapshot = SystemSnapshot::empty();
        snapshot.federates.push(FederateView::new(FederateHandle::new(2)));
        assert!(snapshot.is_joined(FederateHandle::new(2)));
        assert!(!snapshot.is_joined(FederateHandle::new(3)));
    }
}
