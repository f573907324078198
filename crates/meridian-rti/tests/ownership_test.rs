//! Ownership transfer through the federation execution.

use std::collections::BTreeSet;

use bytes::Bytes;
use meridian_core::{
    AttributeHandle, FederateHandle, Integer64Time, ObjectClassHandle, ObjectInstanceHandle,
    ObjectModel, PRIVILEGE_TO_DELETE, RtiError,
};
use meridian_rti::{
    Callback, Delivery, FederationConfig, FederationExecution, MemorySaveStore, Request,
    ResignAction, Response,
};

type Federation = FederationExecution<Integer64Time, MemorySaveStore>;

const AIRCRAFT: ObjectClassHandle = ObjectClassHandle::new(1);
const POSITION: AttributeHandle = AttributeHandle::new(1);
const VELOCITY: AttributeHandle = AttributeHandle::new(2);

fn attrs(list: &[AttributeHandle]) -> BTreeSet<AttributeHandle> {
    list.iter().copied().collect()
}

fn federation(names: &[&str]) -> (Federation, Vec<FederateHandle>) {
    let model = ObjectModel::builder().object_class(AIRCRAFT, "Aircraft", [POSITION, VELOCITY]).build();
    let mut f = FederationExecution::new("own", model, FederationConfig::default(), MemorySaveStore::new());
    let handles = names.iter().map(|name| f.join("sim", *name).unwrap().0).collect();
    (f, handles)
}

fn register(f: &mut Federation, owner: FederateHandle) -> ObjectInstanceHandle {
    match f.process(owner, Request::RegisterObjectInstance { class: AIRCRAFT }).unwrap().response {
        Response::ObjectRegistered(object) => object,
        other => panic!("unexpected response {other:?}"),
    }
}

fn owner(f: &mut Federation, by: FederateHandle, object: ObjectInstanceHandle) -> Option<FederateHandle> {
    match f.process(by, Request::QueryAttributeOwnership { object, attribute: POSITION }).unwrap().response {
        Response::Owner(owner) => owner,
        other => panic!("unexpected response {other:?}"),
    }
}

#[test]
fn if_available_then_queued_acquirer_takes_over() {
    let (mut f, feds) = federation(&["r", "p", "q"]);
    let (r, p, q) = (feds[0], feds[1], feds[2]);
    let object = register(&mut f, r);
    f.process(r, Request::UnconditionalDivest { object, attributes: attrs(&[POSITION]) }).unwrap();
    assert_eq!(owner(&mut f, r, object), None);

    let outcome =
        f.process(p, Request::AcquireIfAvailable { object, attributes: attrs(&[POSITION]) }).unwrap();
    assert_eq!(outcome.response, Response::Acquisition {
        acquired: attrs(&[POSITION]),
        pending: BTreeSet::new()
    });
    assert_eq!(owner(&mut f, r, object), Some(p));

    let outcome = f
        .process(q, Request::Acquire { object, attributes: attrs(&[POSITION]), tag: Bytes::new() })
        .unwrap();
    assert_eq!(outcome.response, Response::Acquisition {
        acquired: BTreeSet::new(),
        pending: attrs(&[POSITION])
    });

    let outcome =
        f.process(p, Request::UnconditionalDivest { object, attributes: attrs(&[POSITION]) }).unwrap();
    assert_eq!(outcome.deliveries, vec![Delivery::new(
        q,
        Callback::AttributeOwnershipAcquisitionNotification {
            object,
            attributes: attrs(&[POSITION]),
            tag: Bytes::new(),
        }
    )]);
    assert!(outcome.deliveries.iter().all(|d| d.federate != p));
    assert_eq!(owner(&mut f, r, object), Some(q));
}

#[test]
fn fifo_order_across_three_acquirers() {
    let (mut f, feds) = federation(&["o", "a", "b", "c"]);
    let object = register(&mut f, feds[0]);

    for acquirer in &feds[1..] {
        f.process(*acquirer, Request::Acquire {
            object,
            attributes: attrs(&[POSITION]),
            tag: Bytes::new(),
        })
        .unwrap();
    }

    let mut holder = feds[0];
    for expected in &feds[1..] {
        f.process(holder, Request::UnconditionalDivest { object, attributes: attrs(&[POSITION]) })
            .unwrap();
        assert_eq!(owner(&mut f, holder, object), Some(*expected));
        holder = *expected;
    }
}

#[test]
fn negotiated_divestiture_offers_then_confirms() {
    let (mut f, feds) = federation(&["o", "a"]);
    let (o, a) = (feds[0], feds[1]);
    let object = register(&mut f, o);
    let tag = Bytes::from_static(b"take it");

    let outcome = f
        .process(o, Request::NegotiatedDivest {
            object,
            attributes: attrs(&[POSITION]),
            tag: tag.clone(),
        })
        .unwrap();
    assert_eq!(outcome.deliveries, vec![Delivery::new(
        a,
        Callback::RequestAttributeOwnershipAssumption { object, attributes: attrs(&[POSITION]), tag }
    )]);

    let outcome = f
        .process(a, Request::Acquire { object, attributes: attrs(&[POSITION]), tag: Bytes::new() })
        .unwrap();
    assert_eq!(outcome.deliveries, vec![Delivery::new(
        o,
        Callback::RequestDivestitureConfirmation { object, attributes: attrs(&[POSITION]) }
    )]);

    let outcome =
        f.process(o, Request::ConfirmDivestiture { object, attributes: attrs(&[POSITION]) }).unwrap();
    assert_eq!(outcome.deliveries.len(), 2);
    assert_eq!(owner(&mut f, o, object), Some(a));
}

#[test]
fn acquire_if_available_takes_offered_attribute() {
    let (mut f, feds) = federation(&["o", "a"]);
    let (o, a) = (feds[0], feds[1]);
    let object = register(&mut f, o);
    f.process(o, Request::NegotiatedDivest {
        object,
        attributes: attrs(&[POSITION]),
        tag: Bytes::new(),
    })
    .unwrap();

    let outcome = f
        .process(a, Request::AcquireIfAvailable { object, attributes: attrs(&[POSITION, VELOCITY]) })
        .unwrap();
    assert_eq!(outcome.response, Response::Acquisition {
        acquired: attrs(&[POSITION]),
        pending: attrs(&[VELOCITY])
    });
    assert!(outcome.deliveries.contains(&Delivery::new(
        o,
        Callback::AttributeOwnershipDivestitureNotification { object, attributes: attrs(&[POSITION]) }
    )));
    assert!(outcome.deliveries.contains(&Delivery::new(
        a,
        Callback::AttributeOwnershipUnavailable { object, attributes: attrs(&[VELOCITY]) }
    )));
}

#[test]
fn cancelling_absent_acquisition_is_idempotent() {
    let (mut f, feds) = federation(&["o", "a", "b"]);
    let object = register(&mut f, feds[0]);
    f.process(feds[1], Request::Acquire {
        object,
        attributes: attrs(&[POSITION]),
        tag: Bytes::new(),
    })
    .unwrap();

    for _ in 0..2 {
        let outcome = f
            .process(feds[2], Request::CancelAcquisition { object, attributes: attrs(&[POSITION]) })
            .unwrap();
        assert!(outcome.deliveries.is_empty());
    }

    f.process(feds[0], Request::UnconditionalDivest { object, attributes: attrs(&[POSITION]) })
        .unwrap();
    assert_eq!(owner(&mut f, feds[0], object), Some(feds[1]));
}

#[test]
fn cancel_negotiated_after_transfer_is_noop() {
    let (mut f, feds) = federation(&["o", "a"]);
    let (o, a) = (feds[0], feds[1]);
    let object = register(&mut f, o);
    f.process(a, Request::Acquire { object, attributes: attrs(&[POSITION]), tag: Bytes::new() })
        .unwrap();
    f.process(o, Request::NegotiatedDivest {
        object,
        attributes: attrs(&[POSITION]),
        tag: Bytes::new(),
    })
    .unwrap();
    assert_eq!(owner(&mut f, o, object), Some(a));

    assert!(
        f.process(o, Request::CancelNegotiatedDivestiture { object, attributes: attrs(&[POSITION]) })
            .is_ok()
    );
    assert_eq!(owner(&mut f, o, object), Some(a));
}

#[test]
fn referential_errors() {
    let (mut f, feds) = federation(&["o", "a"]);
    let object = register(&mut f, feds[0]);
    let bogus = AttributeHandle::new(42);

    assert_eq!(
        f.process(feds[0], Request::UnconditionalDivest { object, attributes: attrs(&[bogus]) }),
        Err(RtiError::AttributeNotDefined { object, attribute: bogus })
    );
    let missing = ObjectInstanceHandle::new(999);
    assert_eq!(
        f.process(feds[1], Request::QueryAttributeOwnership { object: missing, attribute: POSITION }),
        Err(RtiError::ObjectInstanceNotKnown(missing))
    );
    assert_eq!(
        f.process(feds[1], Request::RegisterObjectInstance { class: ObjectClassHandle::new(5) }),
        Err(RtiError::ObjectClassNotDefined(ObjectClassHandle::new(5)))
    );
    assert_eq!(
        f.process(feds[1], Request::UnconditionalDivest { object, attributes: attrs(&[POSITION]) }),
        Err(RtiError::AttributeNotOwned { object, attribute: POSITION })
    );
}

#[test]
fn delete_object_notifies_others() {
    let (mut f, feds) = federation(&["o", "a"]);
    let object = register(&mut f, feds[0]);
    let tag = Bytes::from_static(b"bye");

    assert_eq!(
        f.process(feds[1], Request::DeleteObjectInstance { object, tag: tag.clone() }),
        Err(RtiError::DeletePrivilegeNotHeld(object))
    );
    let outcome = f.process(feds[0], Request::DeleteObjectInstance { object, tag: tag.clone() }).unwrap();
    assert_eq!(outcome.deliveries, vec![Delivery::new(feds[1], Callback::RemoveObjectInstance {
        object,
        tag
    })]);
}

#[test]
fn resign_action_governs_disposal() {
    let (mut f, feds) = federation(&["o", "a"]);
    let (o, a) = (feds[0], feds[1]);
    let object = register(&mut f, o);
    f.process(a, Request::Acquire { object, attributes: attrs(&[POSITION]), tag: Bytes::new() })
        .unwrap();

    let outcome = f.process(o, Request::Resign(ResignAction::UnconditionallyDivestAttributes)).unwrap();
    assert!(outcome.deliveries.contains(&Delivery::new(
        a,
        Callback::AttributeOwnershipAcquisitionNotification {
            object,
            attributes: attrs(&[POSITION]),
            tag: Bytes::new(),
        }
    )));
    assert_eq!(owner(&mut f, a, object), Some(a));
    assert_eq!(
        f.ownership().query_owner(object, PRIVILEGE_TO_DELETE).unwrap(),
        None
    );
}

#[test]
fn resign_withdraws_queued_acquisitions() {
    let (mut f, feds) = federation(&["o", "a", "b"]);
    let object = register(&mut f, feds[0]);
    for acquirer in [feds[1], feds[2]] {
        f.process(acquirer, Request::Acquire {
            object,
            attributes: attrs(&[POSITION]),
            tag: Bytes::new(),
        })
        .unwrap();
    }

    f.process(feds[1], Request::Resign(ResignAction::CancelPendingOwnershipAcquisitions)).unwrap();
    f.process(feds[0], Request::UnconditionalDivest { object, attributes: attrs(&[POSITION]) })
        .unwrap();
    assert_eq!(owner(&mut f, feds[0], object), Some(feds[2]));
}
