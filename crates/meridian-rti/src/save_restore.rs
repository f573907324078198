//! Federation save and restore barriers.
//!
//! Save and restore share one shape: the coordinator instructs every joined
//! federate, collects a begun report (informational) and then a complete or
//! not-complete report from each. A single not-complete latches failure but
//! collection continues; the barrier resolves only once every instructed
//! federate has reported or resigned.
//!
//! The coordinator tracks barrier state only. Persisting and applying
//! snapshots is up to the federation execution, which acts on the
//! [`Resolution`] a closing barrier yields.

use std::collections::BTreeMap;

use meridian_core::{FederateHandle, LogicalTime, RtiError};
use serde::{Deserialize, Serialize};

use crate::{
    callback::{Callback, Delivery},
    ownership::OwnershipSnapshot,
    storage::StorageError,
    time_manager::TimeStateSnapshot,
};

/// Per-federate save status, as reported by `queryFederationSaveStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveStatus {
    /// No save in progress, or the federate was not instructed.
    NoSaveInProgress,
    /// Instructed, no report yet.
    InstructedToSave,
    /// Reported `federateSaveBegun`.
    Saving,
    /// Reported completion; waiting for the rest of the federation.
    WaitingForFederationToSave,
}

/// Per-federate restore status, as reported by
/// `queryFederationRestoreStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestoreStatus {
    /// No restore in progress, or the federate was not instructed.
    NoRestoreInProgress,
    /// Instructed, no report yet.
    InstructedToRestore,
    /// Reported `federateRestoreBegun`.
    Restoring,
    /// Reported completion; waiting for the rest of the federation.
    WaitingForFederationToRestore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Instructed,
    Begun,
    Reported,
}

/// Why a barrier closed without success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierFailure {
    /// A federate reported not-complete.
    Reported,
    /// A federate resigned before reporting.
    Resigned,
}

/// Outcome of a closed barrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Save or restore label
    pub label: String,
    /// Instructed federates still joined
    pub participants: Vec<FederateHandle>,
    /// First failure latched, if any
    pub failure: Option<BarrierFailure>,
}

#[derive(Debug)]
struct Barrier {
    label: String,
    members: BTreeMap<FederateHandle, Phase>,
    failure: Option<BarrierFailure>,
}

impl Barrier {
    fn new(label: String, joined: &[FederateHandle]) -> Self {
        Self {
            label,
            members: joined.iter().map(|federate| (*federate, Phase::Instructed)).collect(),
            failure: None,
        }
    }

    fn is_closed(&self) -> bool {
        self.members.values().all(|phase| *phase == Phase::Reported)
    }

    fn resolution(&self) -> Resolution {
        Resolution {
            label: self.label.clone(),
            participants: self.members.keys().copied().collect(),
            failure: self.failure,
        }
    }

    fn latch(&mut self, failure: BarrierFailure) {
        self.failure.get_or_insert(failure);
    }
}

/// Save and restore barrier coordinator.
#[derive(Debug, Default)]
pub struct SaveRestoreCoordinator {
    save: Option<Barrier>,
    restore: Option<Barrier>,
}

impl SaveRestoreCoordinator {
    /// Create an idle coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a save is outstanding.
    pub fn save_in_progress(&self) -> bool {
        self.save.is_some()
    }

    /// Whether a restore is outstanding.
    pub fn restore_in_progress(&self) -> bool {
        self.restore.is_some()
    }

    /// Label of the outstanding save.
    pub fn save_label(&self) -> Option<&str> {
        self.save.as_ref().map(|barrier| barrier.label.as_str())
    }

    /// Label of the outstanding restore.
    pub fn restore_label(&self) -> Option<&str> {
        self.restore.as_ref().map(|barrier| barrier.label.as_str())
    }

    fn check_idle(&self) -> Result<(), RtiError> {
        if self.save.is_some() {
            return Err(RtiError::SaveInProgress);
        }
        if self.restore.is_some() {
            return Err(RtiError::RestoreInProgress);
        }
        Ok(())
    }

    /// `requestFederationSave`. Instructs every joined federate.
    pub fn request_save<T: LogicalTime>(
        &mut self,
        label: String,
        joined: &[FederateHandle],
    ) -> Result<Vec<Delivery<T>>, RtiError> {
        self.check_idle()?;

        let out = joined
            .iter()
            .map(|federate| {
                Delivery::new(*federate, Callback::InitiateFederateSave { label: label.clone() })
            })
            .collect();

        tracing::debug!(label = %label, federates = joined.len(), "Federation save initiated");
        self.save = Some(Barrier::new(label, joined));
        Ok(out)
    }

    /// `requestFederationRestore`, once the federation has checked that the
    /// snapshot exists. Announces the restore to every joined federate.
    pub fn request_restore<T: LogicalTime>(
        &mut self,
        requester: FederateHandle,
        label: String,
        joined: &[FederateHandle],
    ) -> Result<Vec<Delivery<T>>, RtiError> {
        self.check_idle()?;

        let mut out =
            vec![Delivery::new(requester, Callback::RequestFederationRestoreSucceeded {
                label: label.clone(),
            })];
        for federate in joined {
            out.push(Delivery::new(*federate, Callback::FederationRestoreBegun));
            out.push(Delivery::new(*federate, Callback::InitiateFederateRestore {
                label: label.clone(),
                federate: *federate,
            }));
        }

        tracing::debug!(label = %label, federates = joined.len(), "Federation restore initiated");
        self.restore = Some(Barrier::new(label, joined));
        Ok(out)
    }

    fn save_member(&mut self, federate: FederateHandle) -> Result<&mut Barrier, RtiError> {
        match self.save.as_mut() {
            Some(barrier) if barrier.members.contains_key(&federate) => Ok(barrier),
            _ => Err(RtiError::SaveNotInitiated),
        }
    }

    fn restore_member(&mut self, federate: FederateHandle) -> Result<&mut Barrier, RtiError> {
        match self.restore.as_mut() {
            Some(barrier) if barrier.members.contains_key(&federate) => Ok(barrier),
            _ => Err(RtiError::RestoreNotRequested),
        }
    }

    /// `federateSaveBegun`.
    pub fn save_begun(&mut self, federate: FederateHandle) -> Result<(), RtiError> {
        let barrier = self.save_member(federate)?;
        if let Some(phase) = barrier.members.get_mut(&federate)
            && *phase == Phase::Instructed
        {
            *phase = Phase::Begun;
        }
        Ok(())
    }

    /// `federateSaveComplete` / `federateSaveNotComplete`. Returns the
    /// resolution if this report closed the barrier.
    pub fn save_report(
        &mut self,
        federate: FederateHandle,
        success: bool,
    ) -> Result<Option<Resolution>, RtiError> {
        let barrier = self.save_member(federate)?;
        barrier.members.insert(federate, Phase::Reported);
        if !success {
            barrier.latch(BarrierFailure::Reported);
        }
        Ok(Self::close(&mut self.save))
    }

    /// `federateRestoreBegun`.
    pub fn restore_begun(&mut self, federate: FederateHandle) -> Result<(), RtiError> {
        let barrier = self.restore_member(federate)?;
        if let Some(phase) = barrier.members.get_mut(&federate)
            && *phase == Phase::Instructed
        {
            *phase = Phase::Begun;
        }
        Ok(())
    }

    /// `federateRestoreComplete` / `federateRestoreNotComplete`.
    pub fn restore_report(
        &mut self,
        federate: FederateHandle,
        success: bool,
    ) -> Result<Option<Resolution>, RtiError> {
        let barrier = self.restore_member(federate)?;
        barrier.members.insert(federate, Phase::Reported);
        if !success {
            barrier.latch(BarrierFailure::Reported);
        }
        Ok(Self::close(&mut self.restore))
    }

    /// Resignation mid-operation: an implicit not-complete from `federate`.
    /// Returns the save and restore resolutions it caused, if any.
    pub fn federate_resigned(
        &mut self,
        federate: FederateHandle,
    ) -> (Option<Resolution>, Option<Resolution>) {
        let resign = |slot: &mut Option<Barrier>| {
            let barrier = slot.as_mut()?;
            barrier.members.remove(&federate)?;
            barrier.latch(BarrierFailure::Resigned);
            Self::close(slot)
        };
        let save = resign(&mut self.save);
        let restore = resign(&mut self.restore);
        (save, restore)
    }

    fn close(slot: &mut Option<Barrier>) -> Option<Resolution> {
        if !slot.as_ref()?.is_closed() {
            return None;
        }
        slot.take().map(|barrier| barrier.resolution())
    }

    /// Save status of each federate in `joined`.
    pub fn save_status(&self, joined: &[FederateHandle]) -> Vec<(FederateHandle, SaveStatus)> {
        joined
            .iter()
            .map(|federate| {
                let phase = self.save.as_ref().and_then(|barrier| barrier.members.get(federate));
                let status = match phase {
                    None => SaveStatus::NoSaveInProgress,
                    Some(Phase::Instructed) => SaveStatus::InstructedToSave,
                    Some(Phase::Begun) => SaveStatus::Saving,
                    Some(Phase::Reported) => SaveStatus::WaitingForFederationToSave,
                };
                (*federate, status)
            })
            .collect()
    }

    /// Restore status of each federate in `joined`.
    pub fn restore_status(
        &self,
        joined: &[FederateHandle],
    ) -> Vec<(FederateHandle, RestoreStatus)> {
        joined
            .iter()
            .map(|federate| {
                let phase = self.restore.as_ref().and_then(|barrier| barrier.members.get(federate));
                let status = match phase {
                    None => RestoreStatus::NoRestoreInProgress,
                    Some(Phase::Instructed) => RestoreStatus::InstructedToRestore,
                    Some(Phase::Begun) => RestoreStatus::Restoring,
                    Some(Phase::Reported) => RestoreStatus::WaitingForFederationToRestore,
                };
                (*federate, status)
            })
            .collect()
    }
}

/// Coordinator state persisted by a federation save.
///
/// Logical times and intervals travel in their fixed-width encoding, so the
/// snapshot itself is independent of the time representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationSnapshot {
    /// Name of the saved federation execution
    pub federation: String,
    /// Per-federate time state
    pub time: Vec<TimeStateSnapshot>,
    /// Object instances and attribute owners
    pub ownership: OwnershipSnapshot,
}

impl FederationSnapshot {
    /// Encode as CBOR.
    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)?;
        Ok(buf)
    }

    /// Decode from CBOR.
    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        Ok(ciborium::from_reader(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownership::ObjectSnapshot;
    use meridian_core::{AttributeHandle, Integer64Time, ObjectClassHandle, ObjectInstanceHandle};

    fn fed(v: u32) -> FederateHandle {
        FederateHandle::new(v)
    }

    fn all() -> Vec<FederateHandle> {
        vec![fed(1), fed(2), fed(3)]
    }

    #[test]
    fn save_closes_after_all_report() {
        let mut c = SaveRestoreCoordinator::new();
        let out: Vec<Delivery<Integer64Time>> = c.request_save("s".into(), &all()).unwrap();
        assert_eq!(out.len(), 3);

        assert_eq!(c.save_report(fed(1), true).unwrap(), None);
        assert_eq!(c.save_report(fed(2), true).unwrap(), None);
        let resolution = c.save_report(fed(3), true).unwrap().unwrap();
        assert_eq!(resolution.failure, None);
        assert_eq!(resolution.participants, all());
        assert!(!c.save_in_progress());
    }

    #[test]
    fn failure_latches_but_collection_continues() {
        let mut c = SaveRestoreCoordinator::new();
        let _: Vec<Delivery<Integer64Time>> = c.request_save("s".into(), &all()).unwrap();

        assert_eq!(c.save_report(fed(2), false).unwrap(), None);
        assert!(c.save_in_progress());
        assert_eq!(c.save_report(fed(1), true).unwrap(), None);
        let resolution = c.save_report(fed(3), true).unwrap().unwrap();
        assert_eq!(resolution.failure, Some(BarrierFailure::Reported));
    }

    #[test]
    fn resignation_counts_as_failure() {
        let mut c = SaveRestoreCoordinator::new();
        let _: Vec<Delivery<Integer64Time>> = c.request_save("s".into(), &all()).unwrap();
        c.save_report(fed(1), true).unwrap();
        c.save_report(fed(3), true).unwrap();

        let (save, restore) = c.federate_resigned(fed(2));
        let save = save.unwrap();
        assert_eq!(save.failure, Some(BarrierFailure::Resigned));
        assert_eq!(save.participants, vec![fed(1), fed(3)]);
        assert!(restore.is_none());
    }

    #[test]
    fn one_operation_at_a_time() {
        let mut c = SaveRestoreCoordinator::new();
        let _: Vec<Delivery<Integer64Time>> = c.request_save("s".into(), &all()).unwrap();

        let second: Result<Vec<Delivery<Integer64Time>>, _> = c.request_save("t".into(), &all());
        assert_eq!(second, Err(RtiError::SaveInProgress));
        let restore: Result<Vec<Delivery<Integer64Time>>, _> =
            c.request_restore(fed(1), "t".into(), &all());
        assert_eq!(restore, Err(RtiError::SaveInProgress));
    }

    #[test]
    fn reports_without_operation_rejected() {
        let mut c = SaveRestoreCoordinator::new();
        assert_eq!(c.save_begun(fed(1)), Err(RtiError::SaveNotInitiated));
        assert_eq!(c.restore_report(fed(1), true), Err(RtiError::RestoreNotRequested));

        let _: Vec<Delivery<Integer64Time>> = c.request_save("s".into(), &[fed(1)]).unwrap();
        assert_eq!(c.save_report(fed(9), true), Err(RtiError::SaveNotInitiated));
    }

    #[test]
    fn status_tracks_phases() {
        let mut c = SaveRestoreCoordinator::new();
        let _: Vec<Delivery<Integer64Time>> = c.request_save("s".into(), &all()).unwrap();
        c.save_begun(fed(1)).unwrap();
        c.save_report(fed(2), true).unwrap();

        assert_eq!(c.save_status(&[fed(1), fed(2), fed(3), fed(4)]), vec![
            (fed(1), SaveStatus::Saving),
            (fed(2), SaveStatus::WaitingForFederationToSave),
            (fed(3), SaveStatus::InstructedToSave),
            (fed(4), SaveStatus::NoSaveInProgress),
        ]);
    }

    #[test]
    fn restore_announces_to_everyone() {
        let mut c = SaveRestoreCoordinator::new();
        let out: Vec<Delivery<Integer64Time>> =
            c.request_restore(fed(2), "s".into(), &all()).unwrap();

        assert_eq!(out[0], Delivery::new(fed(2), Callback::RequestFederationRestoreSucceeded {
            label: "s".into()
        }));
        assert_eq!(out.len(), 1 + 2 * 3);
        assert!(c.restore_in_progress());
        assert_eq!(c.restore_label(), Some("s"));
    }

    #[test]
    fn snapshot_encodes_as_cbor() {
        let snapshot = FederationSnapshot {
            federation: "fed".into(),
            time: Vec::new(),
            ownership: OwnershipSnapshot {
                objects: vec![ObjectSnapshot {
                    object: ObjectInstanceHandle::new(1),
                    class: ObjectClassHandle::new(2),
                    owners: vec![(AttributeHandle::new(0), Some(fed(1)))],
                }],
                next_object: 2,
            },
        };
        let bytes = snapshot.encode().unwrap();
        assert_eq!(FederationSnapshot::decode(&bytes).unwrap(), snapshot);
        assert!(matches!(
            FederationSnapshot::decode(&[0xff, 0x00]),
            Err(StorageError::Serialization(_))
        ));
    }
}
