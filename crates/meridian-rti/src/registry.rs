//! Federate registry with interaction subscription tracking.
//!
//! The registry assigns federate handles and maintains bidirectional
//! mappings: interaction class → subscribers (for routing) and federate →
//! classes (for cleanup on resign). Handles are issued monotonically and
//! never reused, so iterating the registry visits federates in join order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use meridian_core::{FederateHandle, InteractionClassHandle, RtiError};

/// Information about a joined federate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederateInfo {
    /// Federate name, unique within the federation execution
    pub name: String,
    /// Federate type as given on join
    pub federate_type: String,
}

/// Registry of joined federates.
#[derive(Debug)]
pub struct FederateRegistry {
    /// Handle → info, ordered by join
    federates: BTreeMap<FederateHandle, FederateInfo>,
    /// Name → handle (reverse index)
    names: HashMap<String, FederateHandle>,
    /// Interaction class → subscribed federates
    subscribers: HashMap<InteractionClassHandle, BTreeSet<FederateHandle>>,
    /// Federate → subscribed interaction classes
    subscriptions: HashMap<FederateHandle, BTreeSet<InteractionClassHandle>>,
    /// Next handle to issue
    next_handle: u32,
}

impl Default for FederateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FederateRegistry {
    /// Create an empty registry. The first handle issued is 1.
    pub fn new() -> Self {
        Self {
            federates: BTreeMap::new(),
            names: HashMap::new(),
            subscribers: HashMap::new(),
            subscriptions: HashMap::new(),
            next_handle: 1,
        }
    }

    /// Register a federate and issue its handle.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        federate_type: impl Into<String>,
    ) -> Result<FederateHandle, RtiError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(RtiError::FederateNameAlreadyInUse(name));
        }

        let handle = FederateHandle::new(self.next_handle);
        self.next_handle = self
            .next_handle
            .checked_add(1)
            .ok_or_else(|| RtiError::RtiInternal("federate handle space exhausted".to_string()))?;

        self.names.insert(name.clone(), handle);
        self.federates.insert(handle, FederateInfo { name, federate_type: federate_type.into() });
        self.subscriptions.insert(handle, BTreeSet::new());

        debug_assert_eq!(self.names.len(), self.federates.len());
        Ok(handle)
    }

    /// Remove a federate and all its subscriptions.
    ///
    /// Returns the federate's info if it was registered.
    pub fn unregister(&mut self, federate: FederateHandle) -> Option<FederateInfo> {
        let info = self.federates.remove(&federate)?;
        self.names.remove(&info.name);

        for class in self.subscriptions.remove(&federate).unwrap_or_default() {
            if let Some(subscribers) = self.subscribers.get_mut(&class) {
                subscribers.remove(&federate);
                if subscribers.is_empty() {
                    self.subscribers.remove(&class);
                }
            }
        }

        Some(info)
    }

    /// Check if a federate is joined.
    pub fn contains(&self, federate: FederateHandle) -> bool {
        self.federates.contains_key(&federate)
    }

    /// Fail with `FederateNotExecutionMember` unless `federate` is joined.
    pub fn require(&self, federate: FederateHandle) -> Result<&FederateInfo, RtiError> {
        self.federates.get(&federate).ok_or(RtiError::FederateNotExecutionMember(federate))
    }

    /// Federate info. `None` if not joined.
    pub fn info(&self, federate: FederateHandle) -> Option<&FederateInfo> {
        self.federates.get(&federate)
    }

    /// Handle for a federate name. `None` if no such federate is joined.
    pub fn handle_for_name(&self, name: &str) -> Option<FederateHandle> {
        self.names.get(name).copied()
    }

    /// Joined federates in join order.
    pub fn handles(&self) -> impl Iterator<Item = FederateHandle> + '_ {
        self.federates.keys().copied()
    }

    /// Joined federates other than `federate`, in join order.
    pub fn others(&self, federate: FederateHandle) -> Vec<FederateHandle> {
        self.handles().filter(|h| *h != federate).collect()
    }

    /// Number of joined federates.
    pub fn len(&self) -> usize {
        self.federates.len()
    }

    /// Check if no federates are joined.
    pub fn is_empty(&self) -> bool {
        self.federates.is_empty()
    }

    /// Subscribe a federate to an interaction class.
    ///
    /// Returns `false` if already subscribed.
    pub fn subscribe(&mut self, federate: FederateHandle, class: InteractionClassHandle) -> bool {
        let Some(classes) = self.subscriptions.get_mut(&federate) else {
            return false;
        };
        if !classes.insert(class) {
            return false;
        }
        self.subscribers.entry(class).or_default().insert(federate);
        true
    }

    /// Unsubscribe a federate from an interaction class.
    ///
    /// Returns `false` if it was not subscribed.
    pub fn unsubscribe(&mut self, federate: FederateHandle, class: InteractionClassHandle) -> bool {
        let removed = self.subscriptions.get_mut(&federate).is_some_and(|c| c.remove(&class));
        if removed && let Some(subscribers) = self.subscribers.get_mut(&class) {
            subscribers.remove(&federate);
            if subscribers.is_empty() {
                self.subscribers.remove(&class);
            }
        }
        removed
    }

    /// Subscribers of an interaction class, in join order.
    pub fn subscribers(&self, class: InteractionClassHandle) -> Vec<FederateHandle> {
        self.subscribers.get(&class).map(|s| s.iter().copied().collect()).unwrap_or_default()
    }

    /// Interaction classes a federate subscribes to.
    pub fn subscriptions(&self, federate: FederateHandle) -> Option<&BTreeSet<InteractionClassHandle>> {
        self.subscriptions.get(&federate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_monotonic_and_never_reused() {
        let mut registry = FederateRegistry::new();
        let a = registry.register("a", "t").unwrap();
        let b = registry.register("b", "t").unwrap();
        assert!(a < b);

        registry.unregister(a);
        let c = registry.register("a", "t").unwrap();
        assert!(c > b);
        assert_eq!(registry.handles().collect::<Vec<_>>(), vec![b, c]);
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut registry = FederateRegistry::new();
        registry.register("alpha", "t").unwrap();
        assert_eq!(
            registry.register("alpha", "other"),
            Err(RtiError::FederateNameAlreadyInUse("alpha".to_string()))
        );
    }

    #[test]
    fn unregister_cleans_subscriptions() {
        let mut registry = FederateRegistry::new();
        let a = registry.register("a", "t").unwrap();
        let b = registry.register("b", "t").unwrap();
        let class = InteractionClassHandle::new(1);

        assert!(registry.subscribe(a, class));
        assert!(!registry.subscribe(a, class));
        assert!(registry.subscribe(b, class));
        assert_eq!(registry.subscribers(class), vec![a, b]);

        registry.unregister(a);
        assert_eq!(registry.subscribers(class), vec![b]);
        assert!(registry.handle_for_name("a").is_none());
    }

    #[test]
    fn unsubscribe_unknown_is_false() {
        let mut registry = FederateRegistry::new();
        let a = registry.register("a", "t").unwrap();
        assert!(!registry.unsubscribe(a, InteractionClassHandle::new(3)));
        assert!(!registry.subscribe(FederateHandle::new(99), InteractionClassHandle::new(3)));
    }
}
