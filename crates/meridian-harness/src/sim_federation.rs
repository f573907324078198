//! Simulated federation for operation-driven testing.
//!
//! `SimFederation` wraps a [`FederationExecution`] over integer time, maps
//! [`Operation`]s onto requests and records what each federate observed:
//! grants, GALT values, and constrained advances. Those histories feed the
//! invariant checks through [`SimFederation::snapshot`].

use std::collections::BTreeMap;

use bytes::Bytes;
use meridian_core::{
    AttributeHandle, FederateHandle, Integer64Interval, Integer64Time, InteractionClassHandle,
    LogicalTime, ObjectClassHandle, ObjectInstanceHandle, ObjectModel,
};
use meridian_rti::{
    AdvanceKind, Callback, Delivery, FederationConfig, FederationExecution, MemorySaveStore,
    Request, Response, SaveStore,
};

use crate::{
    invariants::{AttributeView, FederateView, SystemSnapshot},
    model::{Operation, OperationResult},
};

/// Number of federate slots operations address.
pub const FEDERATE_SLOTS: usize = 4;

/// Interaction class every simulated federate may subscribe to.
const SIGNAL: InteractionClassHandle = InteractionClassHandle::new(1);

/// Object class registered by [`Operation::RegisterObject`].
const VEHICLE: ObjectClassHandle = ObjectClassHandle::new(1);

/// Object model of the simulated federation.
pub fn object_model() -> ObjectModel {
    ObjectModel::builder()
        .object_class(VEHICLE, "Vehicle", [AttributeHandle::new(1), AttributeHandle::new(2)])
        .interaction_class(SIGNAL, "Signal")
        .build()
}

#[derive(Debug, Default)]
struct FederateHistory {
    grants: Vec<Integer64Time>,
    galts: Vec<Integer64Time>,
    constrained_advances: Vec<(Integer64Time, Option<Integer64Time>)>,
}

/// A federation execution driven by [`Operation`]s.
pub struct SimFederation<S: SaveStore = MemorySaveStore> {
    execution: FederationExecution<Integer64Time, S>,
    slots: [Option<FederateHandle>; FEDERATE_SLOTS],
    joins: u32,
    histories: BTreeMap<FederateHandle, FederateHistory>,
    last_deliveries: Vec<Delivery<Integer64Time>>,
}

impl SimFederation {
    /// Create an empty federation with default configuration and an
    /// in-memory save store.
    pub fn new() -> Self {
        Self::with_store(FederationConfig::default(), MemorySaveStore::new())
    }
}

impl Default for SimFederation {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SaveStore> SimFederation<S> {
    /// Create an empty federation over `store`.
    pub fn with_store(config: FederationConfig, store: S) -> Self {
        Self {
            execution: FederationExecution::new("simulation", object_model(), config, store),
            slots: [None; FEDERATE_SLOTS],
            joins: 0,
            histories: BTreeMap::new(),
            last_deliveries: Vec::new(),
        }
    }

    /// The wrapped federation execution.
    pub fn execution(&self) -> &FederationExecution<Integer64Time, S> {
        &self.execution
    }

    /// Federate occupying `slot`.
    pub fn federate(&self, slot: usize) -> Option<FederateHandle> {
        self.slots.get(slot % FEDERATE_SLOTS).copied().flatten()
    }

    /// Callbacks produced by the last applied operation.
    pub fn last_deliveries(&self) -> &[Delivery<Integer64Time>] {
        &self.last_deliveries
    }

    /// Live object instance at `index` (modulo the live count) in handle
    /// order.
    pub fn object(&self, index: u8) -> Option<ObjectInstanceHandle> {
        let count = self.execution.ownership().objects().count();
        if count == 0 {
            return None;
        }
        self.execution.ownership().objects().nth(usize::from(index) % count).map(|(h, _)| h)
    }

    /// Object instance and attribute addressed by indices.
    pub fn attribute(&self, object: u8, attribute: u8) -> Option<(ObjectInstanceHandle, AttributeHandle)> {
        let handle = self.object(object)?;
        let attributes = self.execution.ownership().object(handle)?.attributes();
        let index = usize::from(attribute) % attributes.len().max(1);
        attributes.keys().nth(index).map(|a| (handle, *a))
    }

    /// Apply one operation.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        self.last_deliveries.clear();
        let slot = usize::from(op.federate()) % FEDERATE_SLOTS;

        if matches!(op, Operation::Join { .. }) {
            return self.join(slot);
        }
        let Some(federate) = self.slots[slot] else {
            return OperationResult::Skipped;
        };

        if matches!(op, Operation::Crash { .. }) {
            let before = self.clocks();
            let deliveries = self.execution.disconnect(federate);
            self.depart(slot, federate);
            self.record(&before, deliveries, false);
            return OperationResult::Applied;
        }

        let Some(request) = self.request_for(federate, op) else {
            return OperationResult::Skipped;
        };
        let regulators_grow = matches!(request, Request::EnableTimeRegulation { .. });
        let before = self.clocks();

        match self.execution.process(federate, request) {
            Ok(outcome) => {
                if outcome.response == Response::Resigned {
                    self.depart(slot, federate);
                }
                self.record(&before, outcome.deliveries, regulators_grow);
                OperationResult::Applied
            },
            Err(err) => {
                tracing::debug!(federate = %federate, ?op, error = %err, "Operation rejected");
                OperationResult::Rejected(err)
            },
        }
    }

    /// Capture observable state and recorded histories.
    pub fn snapshot(&self) -> SystemSnapshot {
        let federates = self
            .execution
            .joined()
            .into_iter()
            .map(|handle| {
                let mut view = FederateView::new(handle);
                if let Some(state) = self.execution.time().state(handle) {
                    view.regulating = state.is_regulating();
                    view.constrained = state.is_constrained();
                    view.current_time = state.current_time();
                }
                view.galt = self.execution.time().galt_for(handle);
                if let Some(history) = self.histories.get(&handle) {
                    view.grants.clone_from(&history.grants);
                    view.galts.clone_from(&history.galts);
                    view.constrained_advances.clone_from(&history.constrained_advances);
                }
                view
            })
            .collect();

        let attributes = self
            .execution
            .ownership()
            .objects()
            .flat_map(|(object, instance)| {
                instance.attributes().iter().map(move |(attribute, record)| AttributeView {
                    object,
                    attribute: *attribute,
                    owner: record.owner(),
                    requesting: record.requesting().collect(),
                })
            })
            .collect();

        SystemSnapshot { federates, attributes }
    }

    fn join(&mut self, slot: usize) -> OperationResult {
        if self.slots[slot].is_some() {
            return OperationResult::Skipped;
        }
        self.joins += 1;
        match self.execution.join("simulated", format!("federate-{}", self.joins)) {
            Ok((federate, deliveries)) => {
                self.slots[slot] = Some(federate);
                self.histories.insert(federate, FederateHistory::default());
                let before = self.clocks();
                self.record(&before, deliveries, false);
                OperationResult::Applied
            },
            Err(err) => OperationResult::Rejected(err),
        }
    }

    fn depart(&mut self, slot: usize, federate: FederateHandle) {
        self.slots[slot] = None;
        self.histories.remove(&federate);
    }

    fn clocks(&self) -> BTreeMap<FederateHandle, Integer64Time> {
        self.execution.time().states().map(|(h, s)| (h, s.current_time())).collect()
    }

    fn current_time(&self, federate: FederateHandle) -> Option<Integer64Time> {
        self.execution.time().state(federate).map(|s| s.current_time())
    }

    fn request_for(&self, federate: FederateHandle, op: &Operation) -> Option<Request<Integer64Time>> {
        let lookahead = |value: u8| Integer64Interval::new(i64::from(value % 8));
        let request = match *op {
            Operation::Join { .. } | Operation::Crash { .. } => return None,
            Operation::Resign { action, .. } => Request::Resign(action.into()),

            Operation::EnableRegulation { lookahead: value, .. } => {
                Request::EnableTimeRegulation { lookahead: lookahead(value) }
            },
            Operation::DisableRegulation { .. } => Request::DisableTimeRegulation,
            Operation::EnableConstrained { .. } => Request::EnableTimeConstrained,
            Operation::DisableConstrained { .. } => Request::DisableTimeConstrained,
            Operation::ModifyLookahead { lookahead: value, .. } => {
                Request::ModifyLookahead { lookahead: lookahead(value) }
            },
            Operation::Advance { kind, delta, .. } => {
                let time = self
                    .current_time(federate)?
                    .add(Integer64Interval::new(i64::from(delta % 16)))
                    .ok()?;
                Request::TimeAdvance { kind: AdvanceKind::from(kind), time }
            },
            Operation::Subscribe { .. } => Request::SubscribeInteractionClass(SIGNAL),
            Operation::Send { delta, timestamped, .. } => {
                let time = if timestamped {
                    let state = self.execution.time().state(federate)?;
                    let base = state.lots().unwrap_or_else(|| state.current_time());
                    Some(base.add(Integer64Interval::new(i64::from(delta % 8))).ok()?)
                } else {
                    None
                };
                Request::SendInteraction {
                    class: SIGNAL,
                    parameters: Bytes::from(vec![delta]),
                    tag: Bytes::new(),
                    time,
                }
            },

            Operation::RegisterObject { .. } => Request::RegisterObjectInstance { class: VEHICLE },
            Operation::DeleteObject { object, .. } => {
                Request::DeleteObjectInstance { object: self.object(object)?, tag: Bytes::new() }
            },
            Operation::Acquire { object, attribute, .. } => {
                let (object, attribute) = self.attribute(object, attribute)?;
                Request::Acquire {
                    object,
                    attributes: [attribute].into_iter().collect(),
                    tag: Bytes::from_static(b"acquire"),
                }
            },
            Operation::AcquireIfAvailable { object, attribute, .. } => {
                let (object, attribute) = self.attribute(object, attribute)?;
                Request::AcquireIfAvailable { object, attributes: [attribute].into_iter().collect() }
            },
            Operation::CancelAcquisition { object, attribute, .. } => {
                let (object, attribute) = self.attribute(object, attribute)?;
                Request::CancelAcquisition { object, attributes: [attribute].into_iter().collect() }
            },
            Operation::Divest { object, attribute, .. } => {
                let (object, attribute) = self.attribute(object, attribute)?;
                Request::UnconditionalDivest { object, attributes: [attribute].into_iter().collect() }
            },
            Operation::NegotiatedDivest { object, attribute, .. } => {
                let (object, attribute) = self.attribute(object, attribute)?;
                Request::NegotiatedDivest {
                    object,
                    attributes: [attribute].into_iter().collect(),
                    tag: Bytes::from_static(b"offer"),
                }
            },
            Operation::ConfirmDivestiture { object, attribute, .. } => {
                let (object, attribute) = self.attribute(object, attribute)?;
                Request::ConfirmDivestiture { object, attributes: [attribute].into_iter().collect() }
            },
            Operation::CancelNegotiatedDivestiture { object, attribute, .. } => {
                let (object, attribute) = self.attribute(object, attribute)?;
                Request::CancelNegotiatedDivestiture {
                    object,
                    attributes: [attribute].into_iter().collect(),
                }
            },

            Operation::RegisterSyncPoint { label, .. } => Request::RegisterSynchronizationPoint {
                label: format!("point-{}", label % 4),
                tag: Bytes::new(),
                participants: None,
            },
            Operation::AchieveSyncPoint { label, success, .. } => {
                Request::SynchronizationPointAchieved { label: format!("point-{}", label % 4), success }
            },

            Operation::RequestSave { label, .. } => {
                Request::RequestFederationSave { label: format!("save-{}", label % 3) }
            },
            Operation::ReportSave { success: true, .. } => Request::FederateSaveComplete,
            Operation::ReportSave { success: false, .. } => Request::FederateSaveNotComplete,
            Operation::RequestRestore { label, .. } => {
                Request::RequestFederationRestore { label: format!("save-{}", label % 3) }
            },
            Operation::ReportRestore { success: true, .. } => Request::FederateRestoreComplete,
            Operation::ReportRestore { success: false, .. } => Request::FederateRestoreNotComplete,
        };
        Some(request)
    }

    /// Fold one step's callbacks into the per-federate histories.
    fn record(
        &mut self,
        before: &BTreeMap<FederateHandle, Integer64Time>,
        deliveries: Vec<Delivery<Integer64Time>>,
        regulators_grew: bool,
    ) {
        let restored = deliveries.iter().any(|d| d.callback == Callback::FederationRestored);
        for history in self.histories.values_mut() {
            if restored || regulators_grew {
                history.galts.clear();
            }
            if restored {
                history.grants.clear();
                history.constrained_advances.clear();
            }
        }

        let time = self.execution.time();
        for delivery in &deliveries {
            let Callback::TimeAdvanceGrant { time: granted } = delivery.callback else {
                continue;
            };
            let Some(history) = self.histories.get_mut(&delivery.federate) else {
                continue;
            };
            history.grants.push(granted);

            let constrained = time.state(delivery.federate).is_some_and(|s| s.is_constrained());
            let advanced = before.get(&delivery.federate).is_some_and(|prior| granted > *prior);
            if constrained && advanced {
                history.constrained_advances.push((granted, time.galt_for(delivery.federate)));
            }
        }

        for (federate, history) in &mut self.histories {
            if let Some(galt) = time.galt_for(*federate)
                && history.galts.last() != Some(&galt)
            {
                history.galts.push(galt);
            }
        }

        self.last_deliveries = deliveries;
    }
}
