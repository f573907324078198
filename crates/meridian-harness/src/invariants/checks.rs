//! Standard invariant checks.
//!
//! These capture behavioral properties of time management and ownership
//! that must hold after every request, whatever came before.

use super::{Invariant, InvariantResult, SystemSnapshot};

/// Attribute owners and waiting acquirers are joined, and an owner never
/// waits on its own attribute.
pub struct OwnershipExclusivity;

impl Invariant for OwnershipExclusivity {
    fn name(&self) -> &'static str {
        "OwnershipExclusivity"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for view in &state.attributes {
            if let Some(owner) = view.owner {
                if !state.is_joined(owner) {
                    return Err(self.violation(format!(
                        "{} {} owned by departed {owner}",
                        view.object, view.attribute
                    )));
                }
                if view.requesting.contains(&owner) {
                    return Err(self.violation(format!(
                        "{} {}: owner {owner} is queued for its own attribute",
                        view.object, view.attribute
                    )));
                }
            }
            if let Some(stranger) = view.requesting.iter().find(|f| !state.is_joined(**f)) {
                return Err(self.violation(format!(
                    "{} {}: departed {stranger} still queued",
                    view.object, view.attribute
                )));
            }
        }
        Ok(())
    }
}

/// An attribute nobody owns has nobody waiting for it.
///
/// An acquisition of an unowned attribute completes at once, and a divesting
/// owner hands off to the queue head.
pub struct UnownedHasNoQueue;

impl Invariant for UnownedHasNoQueue {
    fn name(&self) -> &'static str {
        "UnownedHasNoQueue"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        match state.attributes.iter().find(|v| v.owner.is_none() && !v.requesting.is_empty()) {
            Some(view) => Err(self.violation(format!(
                "{} {} unowned with acquirers {:?}",
                view.object, view.attribute, view.requesting
            ))),
            None => Ok(()),
        }
    }
}

/// Grants never move a federate's clock backwards.
pub struct GrantMonotonicity;

impl Invariant for GrantMonotonicity {
    fn name(&self) -> &'static str {
        "GrantMonotonicity"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for federate in &state.federates {
            for window in federate.grants.windows(2) {
                if window[1] < window[0] {
                    return Err(self.violation(format!(
                        "{}: grant {} after {}",
                        federate.handle, window[1], window[0]
                    )));
                }
            }
        }
        Ok(())
    }
}

/// GALT never decreases while the set of regulators only shrinks.
pub struct GaltMonotonicity;

impl Invariant for GaltMonotonicity {
    fn name(&self) -> &'static str {
        "GaltMonotonicity"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for federate in &state.federates {
            for window in federate.galts.windows(2) {
                if window[1] < window[0] {
                    return Err(self.violation(format!(
                        "{}: GALT fell from {} to {}",
                        federate.handle, window[0], window[1]
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A constrained clock only moves forward to times within its GALT.
pub struct ConstrainedGrantWithinGalt;

impl Invariant for ConstrainedGrantWithinGalt {
    fn name(&self) -> &'static str {
        "ConstrainedGrantWithinGalt"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for federate in &state.federates {
            for (grant, galt) in &federate.constrained_advances {
                if let Some(galt) = galt
                    && grant > galt
                {
                    return Err(self.violation(format!(
                        "{}: granted {grant} beyond GALT {galt}",
                        federate.handle
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use meridian_core::{AttributeHandle, FederateHandle, Integer64Time, ObjectInstanceHandle};

    use super::*;
    use crate::invariants::{AttributeView, FederateView};

    fn t(v: i64) -> Integer64Time {
        Integer64Time::new(v)
    }

    fn attribute(owner: Option<u32>, requesting: &[u32]) -> AttributeView {
        AttributeView {
            object: ObjectInstanceHandle::new(1),
            attribute: AttributeHandle::new(1),
            owner: owner.map(FederateHandle::new),
            requesting: requesting.iter().copied().map(FederateHandle::new).collect(),
        }
    }

    fn joined(handles: &[u32]) -> SystemSnapshot {
        let mut state = SystemSnapshot::empty();
        state.federates = handles.iter().map(|h| FederateView::new(FederateHandle::new(*h))).collect();
        state
    }

    #[test]
    fn owner_must_be_joined() {
        let mut state = joined(&[1]);
        state.attributes.push(attribute(Some(2), &[]));
        assert!(OwnershipExclusivity.check(&state).is_err());

        state.attributes[0] = attribute(Some(1), &[]);
        assert!(OwnershipExclusivity.check(&state).is_ok());
    }

    #[test]
    fn owner_cannot_queue_for_itself() {
        let mut state = joined(&[1, 2]);
        state.attributes.push(attribute(Some(1), &[2, 1]));
        let violation = OwnershipExclusivity.check(&state).unwrap_err();
        assert!(violation.message.contains("queued for its own attribute"));
    }

    #[test]
    fn departed_acquirer_detected() {
        let mut state = joined(&[1]);
        state.attributes.push(attribute(Some(1), &[3]));
        assert!(OwnershipExclusivity.check(&state).is_err());
    }

    #[test]
    fn unowned_queue_detected() {
        let mut state = joined(&[1]);
        state.attributes.push(attribute(None, &[]));
        assert!(UnownedHasNoQueue.check(&state).is_ok());

        state.attributes.push(attribute(None, &[1]));
        assert!(UnownedHasNoQueue.check(&state).is_err());
    }

    #[test]
    fn repeated_grant_is_monotonic() {
        let mut state = joined(&[1]);
        state.federates[0].grants = vec![t(1), t(1), t(4)];
        assert!(GrantMonotonicity.check(&state).is_ok());

        state.federates[0].grants.push(t(3));
        assert!(GrantMonotonicity.check(&state).is_err());
    }

    #[test]
    fn falling_galt_detected() {
        let mut state = joined(&[1]);
        state.federates[0].galts = vec![t(2), t(6), t(5)];
        let violation = GaltMonotonicity.check(&state).unwrap_err();
        assert_eq!(violation.to_string(), "GaltMonotonicity: federate#1: GALT fell from 6 to 5");
    }

    #[test]
    fn grant_beyond_galt_detected() {
        let mut state = joined(&[1]);
        state.federates[0].constrained_advances = vec![(t(3), Some(t(3))), (t(9), None)];
        assert!(ConstrainedGrantWithinGalt.check(&state).is_ok());

        state.federates[0].constrained_advances.push((t(5), Some(t(4))));
        assert!(ConstrainedGrantWithinGalt.check(&state).is_err());
    }
}
