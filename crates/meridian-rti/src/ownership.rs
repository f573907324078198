//! Attribute ownership manager.
//!
//! Each attribute of each object instance has at most one owner and a FIFO
//! queue of federates waiting to acquire it. Transfers always go to the
//! queue head, so acquirers are served strictly in request order.
//!
//! Every operation validates all requested attributes before touching any of
//! them: a request either applies to the whole set or fails without effect.
//!
//! # Invariants
//!
//! - At most one owner per attribute
//! - An owner is never queued for its own attribute
//! - An unowned attribute has an empty queue

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use indexmap::IndexMap;
use meridian_core::{
    AttributeHandle, FederateHandle, LogicalTime, ObjectClassHandle, ObjectInstanceHandle,
    PRIVILEGE_TO_DELETE, RtiError,
};
use serde::{Deserialize, Serialize};

use crate::callback::{Callback, Delivery};

/// Ownership record for one attribute of one object instance.
#[derive(Debug, Clone, Default)]
pub struct AttributeOwnership {
    owner: Option<FederateHandle>,
    wants_to_divest: bool,
    divesting_tag: Bytes,
    /// Waiting acquirers in request order, with their tags
    requesting: IndexMap<FederateHandle, Bytes>,
}

impl AttributeOwnership {
    /// Current owner.
    pub fn owner(&self) -> Option<FederateHandle> {
        self.owner
    }

    /// Whether a negotiated divestiture is pending.
    pub fn wants_to_divest(&self) -> bool {
        self.wants_to_divest
    }

    /// Waiting acquirers in FIFO order.
    pub fn requesting(&self) -> impl Iterator<Item = FederateHandle> + '_ {
        self.requesting.keys().copied()
    }

    /// Hand the attribute to the queue head, or leave it unowned.
    fn transfer_to_next(&mut self) -> Option<(FederateHandle, Bytes)> {
        self.wants_to_divest = false;
        self.divesting_tag = Bytes::new();
        let next = self.requesting.shift_remove_index(0);
        self.owner = next.as_ref().map(|(federate, _)| *federate);
        next
    }
}

/// A registered object instance.
#[derive(Debug, Clone)]
pub struct ObjectInstance {
    class: ObjectClassHandle,
    attributes: BTreeMap<AttributeHandle, AttributeOwnership>,
}

impl ObjectInstance {
    /// Object class.
    pub fn class(&self) -> ObjectClassHandle {
        self.class
    }

    /// Ownership records by attribute.
    pub fn attributes(&self) -> &BTreeMap<AttributeHandle, AttributeOwnership> {
        &self.attributes
    }
}

/// Serialized ownership of one object instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    /// Instance handle
    pub object: ObjectInstanceHandle,
    /// Object class
    pub class: ObjectClassHandle,
    /// Owner per attribute
    pub owners: Vec<(AttributeHandle, Option<FederateHandle>)>,
}

/// Serialized ownership table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipSnapshot {
    /// Object instances
    pub objects: Vec<ObjectSnapshot>,
    /// Next instance handle value
    pub next_object: u64,
}

/// Attributes acquired immediately and attributes left pending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionResult {
    /// Now owned by the caller
    pub acquired: BTreeSet<AttributeHandle>,
    /// Queued (acquire) or unavailable (acquire-if-available)
    pub pending: BTreeSet<AttributeHandle>,
}

/// Accumulates per-recipient attribute sets so each recipient receives one
/// callback per kind and tag.
#[derive(Default)]
struct Grouped {
    acquired: BTreeMap<(FederateHandle, Bytes), BTreeSet<AttributeHandle>>,
    divested: BTreeMap<FederateHandle, BTreeSet<AttributeHandle>>,
    release: BTreeMap<(FederateHandle, Bytes), BTreeSet<AttributeHandle>>,
    confirm: BTreeMap<FederateHandle, BTreeSet<AttributeHandle>>,
}

impl Grouped {
    fn into_deliveries<T: LogicalTime>(self, object: ObjectInstanceHandle) -> Vec<Delivery<T>> {
        let mut out = Vec::new();
        for (federate, attributes) in self.divested {
            out.push(Delivery::new(federate, Callback::AttributeOwnershipDivestitureNotification {
                object,
                attributes,
            }));
        }
        for ((federate, tag), attributes) in self.acquired {
            out.push(Delivery::new(federate, Callback::AttributeOwnershipAcquisitionNotification {
                object,
                attributes,
                tag,
            }));
        }
        for ((federate, tag), attributes) in self.release {
            out.push(Delivery::new(federate, Callback::RequestAttributeOwnershipRelease {
                object,
                attributes,
                tag,
            }));
        }
        for (federate, attributes) in self.confirm {
            out.push(Delivery::new(federate, Callback::RequestDivestitureConfirmation {
                object,
                attributes,
            }));
        }
        out
    }
}

/// Ownership table for one federation execution.
#[derive(Debug)]
pub struct OwnershipManager {
    objects: BTreeMap<ObjectInstanceHandle, ObjectInstance>,
    next_object: u64,
}

impl Default for OwnershipManager {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnershipManager {
    /// Create an empty table. The first instance handle issued is 1.
    pub fn new() -> Self {
        Self { objects: BTreeMap::new(), next_object: 1 }
    }

    /// Object instance. `None` if unknown.
    pub fn object(&self, object: ObjectInstanceHandle) -> Option<&ObjectInstance> {
        self.objects.get(&object)
    }

    /// All object instances in handle order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectInstanceHandle, &ObjectInstance)> {
        self.objects.iter().map(|(handle, instance)| (*handle, instance))
    }

    /// Create an instance whose attributes are all owned by `owner`.
    pub fn register_object(
        &mut self,
        owner: FederateHandle,
        class: ObjectClassHandle,
        attributes: BTreeSet<AttributeHandle>,
    ) -> Result<ObjectInstanceHandle, RtiError> {
        let object = ObjectInstanceHandle::new(self.next_object);
        self.next_object = self
            .next_object
            .checked_add(1)
            .ok_or_else(|| RtiError::RtiInternal("object handle space exhausted".to_string()))?;

        let attributes = attributes
            .into_iter()
            .map(|attribute| {
                (attribute, AttributeOwnership { owner: Some(owner), ..Default::default() })
            })
            .collect();
        self.objects.insert(object, ObjectInstance { class, attributes });

        tracing::debug!(object = %object, class = %class, owner = %owner, "Object registered");
        Ok(object)
    }

    /// Delete an instance. The caller must own its privilege-to-delete.
    pub fn delete_object<T: LogicalTime>(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        tag: Bytes,
        others: &[FederateHandle],
    ) -> Result<Vec<Delivery<T>>, RtiError> {
        let instance = self.objects.get(&object).ok_or(RtiError::ObjectInstanceNotKnown(object))?;
        let holder = instance.attributes.get(&PRIVILEGE_TO_DELETE).and_then(|a| a.owner);
        if holder != Some(federate) {
            return Err(RtiError::DeletePrivilegeNotHeld(object));
        }

        self.objects.remove(&object);
        tracing::debug!(object = %object, federate = %federate, "Object deleted");

        Ok(others
            .iter()
            .filter(|other| **other != federate)
            .map(|other| {
                Delivery::new(*other, Callback::RemoveObjectInstance { object, tag: tag.clone() })
            })
            .collect())
    }

    /// Owner of one attribute. `None` if unowned.
    pub fn query_owner(
        &self,
        object: ObjectInstanceHandle,
        attribute: AttributeHandle,
    ) -> Result<Option<FederateHandle>, RtiError> {
        let instance = self.objects.get(&object).ok_or(RtiError::ObjectInstanceNotKnown(object))?;
        instance
            .attributes
            .get(&attribute)
            .map(AttributeOwnership::owner)
            .ok_or(RtiError::AttributeNotDefined { object, attribute })
    }

    /// Resolve `object` and check every attribute is defined for it.
    fn resolve(
        &self,
        object: ObjectInstanceHandle,
        attributes: &BTreeSet<AttributeHandle>,
    ) -> Result<&ObjectInstance, RtiError> {
        let instance = self.objects.get(&object).ok_or(RtiError::ObjectInstanceNotKnown(object))?;
        if let Some(attribute) = attributes.iter().find(|a| !instance.attributes.contains_key(a)) {
            return Err(RtiError::AttributeNotDefined { object, attribute: *attribute });
        }
        Ok(instance)
    }

    /// Resolve `object` and check `federate` owns every attribute.
    fn resolve_owned(
        &self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &BTreeSet<AttributeHandle>,
    ) -> Result<&ObjectInstance, RtiError> {
        let instance = self.resolve(object, attributes)?;
        for attribute in attributes {
            if instance.attributes[attribute].owner != Some(federate) {
                return Err(RtiError::AttributeNotOwned { object, attribute: *attribute });
            }
        }
        Ok(instance)
    }

    fn records_mut<'a>(
        &'a mut self,
        object: ObjectInstanceHandle,
        attributes: &'a BTreeSet<AttributeHandle>,
    ) -> impl Iterator<Item = (AttributeHandle, &'a mut AttributeOwnership)> + 'a {
        self.objects
            .get_mut(&object)
            .into_iter()
            .flat_map(|instance| instance.attributes.iter_mut())
            .filter(move |(attribute, _)| attributes.contains(*attribute))
            .map(|(attribute, record)| (*attribute, record))
    }

    /// `unconditionalAttributeOwnershipDivestiture`. Each attribute passes to
    /// its queue head, if any. The divesting federate is not notified.
    pub fn unconditional_divest<T: LogicalTime>(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &BTreeSet<AttributeHandle>,
    ) -> Result<Vec<Delivery<T>>, RtiError> {
        self.resolve_owned(federate, object, attributes)?;

        let mut grouped = Grouped::default();
        for (attribute, record) in self.records_mut(object, attributes) {
            if let Some((next, tag)) = record.transfer_to_next() {
                tracing::debug!(
                    object = %object,
                    attribute = %attribute,
                    from = %federate,
                    to = %next,
                    "Ownership transferred"
                );
                grouped.acquired.entry((next, tag)).or_default().insert(attribute);
            }
        }
        Ok(grouped.into_deliveries(object))
    }

    /// `negotiatedAttributeOwnershipDivestiture`.
    ///
    /// Attributes with waiting acquirers transfer at once; the rest stay
    /// offered and every other joined federate is asked to assume them.
    pub fn negotiated_divest<T: LogicalTime>(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &BTreeSet<AttributeHandle>,
        tag: Bytes,
        others: &[FederateHandle],
    ) -> Result<Vec<Delivery<T>>, RtiError> {
        let instance = self.resolve_owned(federate, object, attributes)?;
        if let Some(attribute) = attributes.iter().find(|a| instance.attributes[*a].wants_to_divest)
        {
            return Err(RtiError::AttributeAlreadyBeingDivested { object, attribute: *attribute });
        }

        let mut grouped = Grouped::default();
        let mut offered = BTreeSet::new();
        for (attribute, record) in self.records_mut(object, attributes) {
            if record.requesting.is_empty() {
                record.wants_to_divest = true;
                record.divesting_tag = tag.clone();
                offered.insert(attribute);
            } else if let Some((next, next_tag)) = record.transfer_to_next() {
                grouped.divested.entry(federate).or_default().insert(attribute);
                grouped.acquired.entry((next, next_tag)).or_default().insert(attribute);
            }
        }

        let mut out = grouped.into_deliveries(object);
        if !offered.is_empty() {
            for other in others.iter().filter(|other| **other != federate) {
                out.push(Delivery::new(*other, Callback::RequestAttributeOwnershipAssumption {
                    object,
                    attributes: offered.clone(),
                    tag: tag.clone(),
                }));
            }
        }
        Ok(out)
    }

    /// `confirmDivestiture`. Completes a negotiated divestiture: each
    /// attribute passes to its queue head or becomes unowned.
    pub fn confirm_divestiture<T: LogicalTime>(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &BTreeSet<AttributeHandle>,
    ) -> Result<Vec<Delivery<T>>, RtiError> {
        let instance = self.resolve_owned(federate, object, attributes)?;
        for attribute in attributes {
            let record = &instance.attributes[attribute];
            if !record.wants_to_divest {
                return Err(if record.requesting.is_empty() {
                    RtiError::NoAcquisitionPending { object, attribute: *attribute }
                } else {
                    RtiError::AttributeDivestitureWasNotRequested { object, attribute: *attribute }
                });
            }
        }

        let mut grouped = Grouped::default();
        for (attribute, record) in self.records_mut(object, attributes) {
            grouped.divested.entry(federate).or_default().insert(attribute);
            if let Some((next, tag)) = record.transfer_to_next() {
                grouped.acquired.entry((next, tag)).or_default().insert(attribute);
            }
        }
        Ok(grouped.into_deliveries(object))
    }

    /// `cancelNegotiatedAttributeOwnershipDivestiture`. Only attributes the
    /// caller still owns and is divesting are affected.
    pub fn cancel_negotiated_divestiture(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &BTreeSet<AttributeHandle>,
    ) -> Result<(), RtiError> {
        self.resolve(object, attributes)?;
        for (_, record) in self.records_mut(object, attributes) {
            if record.owner == Some(federate) {
                record.wants_to_divest = false;
                record.divesting_tag = Bytes::new();
            }
        }
        Ok(())
    }

    /// `attributeOwnershipAcquisition`. Unowned attributes are acquired at
    /// once; owned ones queue the caller and prompt the owner.
    pub fn acquire<T: LogicalTime>(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &BTreeSet<AttributeHandle>,
        tag: Bytes,
    ) -> Result<(AcquisitionResult, Vec<Delivery<T>>), RtiError> {
        let instance = self.resolve(object, attributes)?;
        for attribute in attributes {
            let record = &instance.attributes[attribute];
            if record.owner == Some(federate) {
                return Err(RtiError::AttributeAlreadyOwned { object, attribute: *attribute });
            }
            if record.requesting.contains_key(&federate) {
                return Err(RtiError::AttributeAlreadyBeingAcquired {
                    object,
                    attribute: *attribute,
                });
            }
        }

        let mut result = AcquisitionResult::default();
        let mut grouped = Grouped::default();
        for (attribute, record) in self.records_mut(object, attributes) {
            match record.owner {
                None => {
                    debug_assert!(record.requesting.is_empty());
                    record.owner = Some(federate);
                    result.acquired.insert(attribute);
                    grouped.acquired.entry((federate, tag.clone())).or_default().insert(attribute);
                },
                Some(owner) => {
                    record.requesting.insert(federate, tag.clone());
                    result.pending.insert(attribute);
                    if record.wants_to_divest {
                        grouped.confirm.entry(owner).or_default().insert(attribute);
                    } else {
                        grouped.release.entry((owner, tag.clone())).or_default().insert(attribute);
                    }
                },
            }
        }

        tracing::debug!(
            object = %object,
            federate = %federate,
            acquired = result.acquired.len(),
            queued = result.pending.len(),
            "Acquisition requested"
        );
        Ok((result, grouped.into_deliveries(object)))
    }

    /// `attributeOwnershipAcquisitionIfAvailable`. Never queues. Attributes
    /// that are unowned, or offered through a negotiated divestiture, are
    /// taken; the rest are reported unavailable.
    pub fn acquire_if_available<T: LogicalTime>(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &BTreeSet<AttributeHandle>,
    ) -> Result<(AcquisitionResult, Vec<Delivery<T>>), RtiError> {
        let instance = self.resolve(object, attributes)?;
        for attribute in attributes {
            let record = &instance.attributes[attribute];
            if record.owner == Some(federate) {
                return Err(RtiError::AttributeAlreadyOwned { object, attribute: *attribute });
            }
            if record.requesting.contains_key(&federate) {
                return Err(RtiError::AttributeAlreadyBeingAcquired {
                    object,
                    attribute: *attribute,
                });
            }
        }

        let mut result = AcquisitionResult::default();
        let mut grouped = Grouped::default();
        for (attribute, record) in self.records_mut(object, attributes) {
            match record.owner {
                None => {
                    record.owner = Some(federate);
                    result.acquired.insert(attribute);
                },
                Some(owner) if record.wants_to_divest && record.requesting.is_empty() => {
                    record.owner = Some(federate);
                    record.wants_to_divest = false;
                    record.divesting_tag = Bytes::new();
                    result.acquired.insert(attribute);
                    grouped.divested.entry(owner).or_default().insert(attribute);
                },
                Some(_) => {
                    result.pending.insert(attribute);
                },
            }
        }

        let mut out = grouped.into_deliveries(object);
        if !result.acquired.is_empty() {
            out.push(Delivery::new(federate, Callback::AttributeOwnershipAcquisitionNotification {
                object,
                attributes: result.acquired.clone(),
                tag: Bytes::new(),
            }));
        }
        if !result.pending.is_empty() {
            out.push(Delivery::new(federate, Callback::AttributeOwnershipUnavailable {
                object,
                attributes: result.pending.clone(),
            }));
        }
        Ok((result, out))
    }

    /// `cancelAttributeOwnershipAcquisition`. Attributes the caller is not
    /// queued for are ignored.
    pub fn cancel_acquisition<T: LogicalTime>(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        attributes: &BTreeSet<AttributeHandle>,
    ) -> Result<Vec<Delivery<T>>, RtiError> {
        self.resolve(object, attributes)?;

        let mut cancelled = BTreeSet::new();
        for (attribute, record) in self.records_mut(object, attributes) {
            if record.requesting.shift_remove(&federate).is_some() {
                cancelled.insert(attribute);
            }
        }

        if cancelled.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Delivery::new(federate, Callback::ConfirmAttributeOwnershipAcquisitionCancellation {
            object,
            attributes: cancelled,
        })])
    }

    /// Remove `federate` from every acquisition queue.
    pub fn withdraw_acquisitions(&mut self, federate: FederateHandle) {
        for instance in self.objects.values_mut() {
            for record in instance.attributes.values_mut() {
                record.requesting.shift_remove(&federate);
            }
        }
    }

    /// Delete every instance whose privilege-to-delete `federate` owns.
    pub fn delete_owned_objects<T: LogicalTime>(
        &mut self,
        federate: FederateHandle,
        others: &[FederateHandle],
    ) -> Vec<Delivery<T>> {
        let deletable: Vec<_> = self
            .objects
            .iter()
            .filter(|(_, instance)| {
                instance.attributes.get(&PRIVILEGE_TO_DELETE).and_then(|a| a.owner)
                    == Some(federate)
            })
            .map(|(object, _)| *object)
            .collect();

        let mut out = Vec::new();
        for object in deletable {
            self.objects.remove(&object);
            for other in others.iter().filter(|other| **other != federate) {
                out.push(Delivery::new(*other, Callback::RemoveObjectInstance {
                    object,
                    tag: Bytes::new(),
                }));
            }
        }
        out
    }

    /// Unconditionally divest every attribute `federate` owns.
    pub fn divest_all<T: LogicalTime>(&mut self, federate: FederateHandle) -> Vec<Delivery<T>> {
        let mut out = Vec::new();
        for (object, instance) in &mut self.objects {
            let mut grouped = Grouped::default();
            for (attribute, record) in &mut instance.attributes {
                if record.owner != Some(federate) {
                    continue;
                }
                if let Some((next, tag)) = record.transfer_to_next() {
                    grouped.acquired.entry((next, tag)).or_default().insert(*attribute);
                }
            }
            out.extend(grouped.into_deliveries(*object));
        }
        out
    }

    /// Whether `federate` owns any attribute.
    pub fn owns_any(&self, federate: FederateHandle) -> bool {
        self.objects
            .values()
            .flat_map(|instance| instance.attributes.values())
            .any(|record| record.owner == Some(federate))
    }

    /// Whether `federate` owns an attribute of an instance it could not
    /// delete.
    pub fn owns_undeletable(&self, federate: FederateHandle) -> bool {
        self.objects.values().any(|instance| {
            let deletable = instance.attributes.get(&PRIVILEGE_TO_DELETE).and_then(|a| a.owner)
                == Some(federate);
            !deletable && instance.attributes.values().any(|record| record.owner == Some(federate))
        })
    }

    /// Serialize the ownership table. Queues and divestiture offers are not
    /// part of the snapshot.
    pub fn snapshot(&self) -> OwnershipSnapshot {
        OwnershipSnapshot {
            objects: self
                .objects
                .iter()
                .map(|(object, instance)| ObjectSnapshot {
                    object: *object,
                    class: instance.class,
                    owners: instance
                        .attributes
                        .iter()
                        .map(|(attribute, record)| (*attribute, record.owner))
                        .collect(),
                })
                .collect(),
            next_object: self.next_object,
        }
    }

    /// Replace the ownership table from a snapshot.
    pub fn restore(&mut self, snapshot: &OwnershipSnapshot) {
        self.objects = snapshot
            .objects
            .iter()
            .map(|entry| {
                let attributes = entry
                    .owners
                    .iter()
                    .map(|(attribute, owner)| {
                        (*attribute, AttributeOwnership { owner: *owner, ..Default::default() })
                    })
                    .collect();
                (entry.object, ObjectInstance { class: entry.class, attributes })
            })
            .collect();
        self.next_object = self.next_object.max(snapshot.next_object);
    }
}
