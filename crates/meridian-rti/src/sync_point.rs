//! Synchronization point coordinator.
//!
//! A point moves `Registering → Announced → WaitingForFederationToSynchronize
//! → Achieved`. Registration outcomes are callbacks, never errors: the
//! registrant learns of success or failure asynchronously. A point is
//! released, and its label becomes free again, once every participant has
//! achieved it or resigned.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use meridian_core::{FederateHandle, LogicalTime, RtiError};

use crate::callback::{Callback, Delivery, SynchronizationPointFailureReason};

/// Lifecycle of a synchronization point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPointState {
    /// Accepted, not yet announced.
    Registering,
    /// Announced; no participant has achieved it yet.
    Announced,
    /// At least one participant achieved; waiting on the rest.
    WaitingForFederationToSynchronize,
    /// Every participant achieved; released.
    Achieved,
}

/// An outstanding synchronization point.
#[derive(Debug, Clone)]
pub struct SynchronizationPoint {
    label: String,
    tag: Bytes,
    participants: BTreeSet<FederateHandle>,
    awaiting: BTreeSet<FederateHandle>,
    failed: BTreeSet<FederateHandle>,
    /// Registered without an explicit set; late joiners participate
    federation_wide: bool,
    state: SyncPointState,
}

impl SynchronizationPoint {
    /// Point label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Registrant's tag.
    pub fn tag(&self) -> &Bytes {
        &self.tag
    }

    /// Participants still joined.
    pub fn participants(&self) -> &BTreeSet<FederateHandle> {
        &self.participants
    }

    /// Participants that have not achieved the point.
    pub fn awaiting(&self) -> &BTreeSet<FederateHandle> {
        &self.awaiting
    }

    /// Participants that reported failure or resigned.
    pub fn failed(&self) -> &BTreeSet<FederateHandle> {
        &self.failed
    }

    /// Current state.
    pub fn state(&self) -> SyncPointState {
        self.state
    }

    /// Whether late joiners are added to the point.
    pub fn is_federation_wide(&self) -> bool {
        self.federation_wide
    }

    fn announce<T: LogicalTime>(&self, federate: FederateHandle) -> Delivery<T> {
        Delivery::new(federate, Callback::AnnounceSynchronizationPoint {
            label: self.label.clone(),
            tag: self.tag.clone(),
        })
    }

    fn synchronized<T: LogicalTime>(&self) -> Vec<Delivery<T>> {
        self.participants
            .iter()
            .map(|federate| {
                Delivery::new(*federate, Callback::FederationSynchronized {
                    label: self.label.clone(),
                    failed: self.failed.clone(),
                })
            })
            .collect()
    }
}

/// Synchronization points of one federation execution, keyed by label.
#[derive(Debug, Default)]
pub struct SyncPointCoordinator {
    points: BTreeMap<String, SynchronizationPoint>,
}

impl SyncPointCoordinator {
    /// Create a coordinator with no outstanding points.
    pub fn new() -> Self {
        Self::default()
    }

    /// Outstanding point by label.
    pub fn point(&self, label: &str) -> Option<&SynchronizationPoint> {
        self.points.get(label)
    }

    /// Outstanding points in label order.
    pub fn points(&self) -> impl Iterator<Item = &SynchronizationPoint> {
        self.points.values()
    }

    /// `registerFederationSynchronizationPoint`.
    ///
    /// `participants` of `None` or an empty set means every joined federate,
    /// now and later.
    pub fn register<T: LogicalTime>(
        &mut self,
        registrant: FederateHandle,
        label: String,
        tag: Bytes,
        participants: Option<BTreeSet<FederateHandle>>,
        joined: &[FederateHandle],
    ) -> Vec<Delivery<T>> {
        let failed = |label: String, reason| {
            tracing::debug!(label = %label, registrant = %registrant, ?reason, "Synchronization point rejected");
            vec![Delivery::new(registrant, Callback::SynchronizationPointRegistrationFailed {
                label,
                reason,
            })]
        };

        if self.points.contains_key(&label) {
            return failed(label, SynchronizationPointFailureReason::LabelNotUnique);
        }

        let (participants, federation_wide) = match participants {
            Some(set) if !set.is_empty() => (set, false),
            _ => (joined.iter().copied().collect(), true),
        };
        if participants.iter().any(|federate| !joined.contains(federate)) {
            return failed(label, SynchronizationPointFailureReason::SynchronizationSetMemberNotJoined);
        }

        let mut point = SynchronizationPoint {
            label: label.clone(),
            tag,
            awaiting: participants.clone(),
            participants,
            failed: BTreeSet::new(),
            federation_wide,
            state: SyncPointState::Registering,
        };

        let mut out = vec![Delivery::new(registrant, Callback::SynchronizationPointRegistrationSucceeded {
            label: label.clone(),
        })];
        out.extend(point.participants.iter().map(|federate| point.announce(*federate)));
        point.state = SyncPointState::Announced;

        tracing::debug!(
            label = %label,
            participants = point.participants.len(),
            federation_wide,
            "Synchronization point announced"
        );
        self.points.insert(label, point);
        out
    }

    /// `synchronizationPointAchieved`. `success = false` records the
    /// federate as failed but still counts as achieved.
    pub fn achieved<T: LogicalTime>(
        &mut self,
        federate: FederateHandle,
        label: &str,
        success: bool,
    ) -> Result<Vec<Delivery<T>>, RtiError> {
        let point = self
            .points
            .get_mut(label)
            .filter(|point| point.awaiting.contains(&federate))
            .ok_or_else(|| RtiError::SynchronizationPointLabelNotAnnounced(label.to_string()))?;

        point.awaiting.remove(&federate);
        if !success {
            point.failed.insert(federate);
        }
        point.state = SyncPointState::WaitingForFederationToSynchronize;

        Ok(self.release_if_done(label))
    }

    /// Add a newly joined federate to every federation-wide point.
    pub fn federate_joined<T: LogicalTime>(&mut self, federate: FederateHandle) -> Vec<Delivery<T>> {
        let mut out = Vec::new();
        for point in self.points.values_mut().filter(|point| point.federation_wide) {
            point.participants.insert(federate);
            point.awaiting.insert(federate);
            out.push(point.announce(federate));
        }
        out
    }

    /// Drop a resigning federate from every point. Outstanding obligations
    /// count as failed; points left with nobody awaiting are released.
    pub fn federate_resigned<T: LogicalTime>(&mut self, federate: FederateHandle) -> Vec<Delivery<T>> {
        let mut affected = Vec::new();
        for point in self.points.values_mut() {
            if !point.participants.remove(&federate) {
                continue;
            }
            if point.awaiting.remove(&federate) {
                point.failed.insert(federate);
            }
            affected.push(point.label.clone());
        }

        affected.iter().flat_map(|label| self.release_if_done(label)).collect()
    }

    fn release_if_done<T: LogicalTime>(&mut self, label: &str) -> Vec<Delivery<T>> {
        let Some(point) = self.points.get(label) else {
            return Vec::new();
        };
        if !point.awaiting.is_empty() {
            return Vec::new();
        }

        let Some(mut point) = self.points.remove(label) else {
            return Vec::new();
        };
        point.state = SyncPointState::Achieved;
        tracing::debug!(label = %label, failed = point.failed.len(), "Federation synchronized");
        point.synchronized()
    }
}
