//! Reference model of FIFO attribute ownership.
//!
//! Covers acquisition, acquisition-if-available, unconditional divestiture,
//! cancellation and divesting resignation. Negotiated divestiture and object
//! deletion are left to the invariant checks.

use std::collections::{BTreeMap, VecDeque};

use meridian_core::{AttributeHandle, FederateHandle};

/// One object instance in the reference model.
#[derive(Debug, Clone, Default)]
pub struct ModelObject {
    owners: BTreeMap<AttributeHandle, Option<FederateHandle>>,
    queues: BTreeMap<AttributeHandle, VecDeque<FederateHandle>>,
}

impl ModelObject {
    /// Owner of `attribute`.
    pub fn owner(&self, attribute: AttributeHandle) -> Option<FederateHandle> {
        self.owners.get(&attribute).copied().flatten()
    }

    /// Waiting acquirers of `attribute` in FIFO order.
    pub fn queue(&self, attribute: AttributeHandle) -> Vec<FederateHandle> {
        self.queues.get(&attribute).map(|q| q.iter().copied().collect()).unwrap_or_default()
    }

    fn hand_off(&mut self, attribute: AttributeHandle) {
        let next = self.queues.get_mut(&attribute).and_then(VecDeque::pop_front);
        self.owners.insert(attribute, next);
    }
}

/// Reference ownership model, objects indexed in registration order.
#[derive(Debug, Clone, Default)]
pub struct OwnershipModel {
    objects: Vec<ModelObject>,
}

impl OwnershipModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered objects.
    pub fn objects(&self) -> &[ModelObject] {
        &self.objects
    }

    /// Record a registration: `owner` owns every attribute.
    pub fn register(
        &mut self,
        owner: FederateHandle,
        attributes: impl IntoIterator<Item = AttributeHandle>,
    ) {
        let owners = attributes.into_iter().map(|a| (a, Some(owner))).collect();
        self.objects.push(ModelObject { owners, queues: BTreeMap::new() });
    }

    /// Accepted acquisition: take an unowned attribute, otherwise join the
    /// back of the queue once.
    pub fn acquire(&mut self, federate: FederateHandle, object: usize, attribute: AttributeHandle) {
        let Some(model) = self.objects.get_mut(object) else { return };
        if model.owner(attribute).is_none() {
            model.owners.insert(attribute, Some(federate));
            return;
        }
        let queue = model.queues.entry(attribute).or_default();
        if !queue.contains(&federate) {
            queue.push_back(federate);
        }
    }

    /// Accepted acquisition-if-available: only an unowned attribute moves.
    pub fn acquire_if_available(
        &mut self,
        federate: FederateHandle,
        object: usize,
        attribute: AttributeHandle,
    ) {
        if let Some(model) = self.objects.get_mut(object)
            && model.owner(attribute).is_none()
        {
            model.owners.insert(attribute, Some(federate));
        }
    }

    /// Accepted unconditional divestiture: the queue head takes over.
    pub fn divest(&mut self, object: usize, attribute: AttributeHandle) {
        if let Some(model) = self.objects.get_mut(object) {
            model.hand_off(attribute);
        }
    }

    /// Accepted cancellation.
    pub fn cancel(&mut self, federate: FederateHandle, object: usize, attribute: AttributeHandle) {
        if let Some(queue) = self.objects.get_mut(object).and_then(|m| m.queues.get_mut(&attribute))
        {
            queue.retain(|f| *f != federate);
        }
    }

    /// Divesting resignation: withdraw every acquisition, then hand off
    /// everything owned.
    pub fn resign(&mut self, federate: FederateHandle) {
        for model in &mut self.objects {
            for queue in model.queues.values_mut() {
                queue.retain(|f| *f != federate);
            }
            let owned: Vec<_> = model
                .owners
                .iter()
                .filter(|(_, owner)| **owner == Some(federate))
                .map(|(attribute, _)| *attribute)
                .collect();
            for attribute in owned {
                model.hand_off(attribute);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fed(v: u32) -> FederateHandle {
        FederateHandle::new(v)
    }

    const ATTR: AttributeHandle = AttributeHandle::new(1);

    #[test]
    fn queue_hands_off_in_order() {
        let mut model = OwnershipModel::new();
        model.register(fed(1), [ATTR]);
        model.acquire(fed(2), 0, ATTR);
        model.acquire(fed(3), 0, ATTR);
        model.acquire(fed(2), 0, ATTR);
        assert_eq!(model.objects()[0].queue(ATTR), vec![fed(2), fed(3)]);

        model.divest(0, ATTR);
        assert_eq!(model.objects()[0].owner(ATTR), Some(fed(2)));
        model.divest(0, ATTR);
        model.divest(0, ATTR);
        assert_eq!(model.objects()[0].owner(ATTR), None);
    }

    #[test]
    fn resign_withdraws_then_hands_off() {
        let mut model = OwnershipModel::new();
        model.register(fed(1), [ATTR]);
        model.register(fed(2), [ATTR]);
        model.acquire(fed(1), 1, ATTR);
        model.acquire(fed(3), 0, ATTR);

        model.resign(fed(1));
        assert_eq!(model.objects()[0].owner(ATTR), Some(fed(3)));
        assert!(model.objects()[1].queue(ATTR).is_empty());
    }
}
