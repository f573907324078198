//! Federation save/restore barriers and synchronization points, end to end
//! through the federation execution.

use std::collections::BTreeSet;

use bytes::Bytes;
use meridian_core::{
    AttributeHandle, FederateHandle, Integer64Interval, Integer64Time, ObjectClassHandle,
    ObjectModel, RtiError,
};
use meridian_rti::{
    Callback, ChaoticSaveStore, Delivery, FederationConfig, FederationExecution, MemorySaveStore,
    Request, ResignAction, Response, RestoreFailureReason, SaveFailureReason, SaveStatus,
    SaveStore,
};

fn model() -> ObjectModel {
    ObjectModel::builder()
        .object_class(ObjectClassHandle::new(1), "Ship", [AttributeHandle::new(1)])
        .build()
}

fn federation<S: SaveStore>(
    store: S,
    count: usize,
) -> (FederationExecution<Integer64Time, S>, Vec<FederateHandle>) {
    let mut f = FederationExecution::new("fleet", model(), FederationConfig::default(), store);
    let feds = (0..count).map(|i| f.join("sim", format!("f{i}")).unwrap().0).collect();
    (f, feds)
}

fn everyone<T: meridian_core::LogicalTime>(
    feds: &[FederateHandle],
    callback: &Callback<T>,
) -> Vec<Delivery<T>> {
    feds.iter().map(|f| Delivery::new(*f, callback.clone())).collect()
}

#[test]
fn save_completes_when_all_report() {
    let (mut f, feds) = federation(MemorySaveStore::new(), 3);

    let outcome = f.process(feds[0], Request::RequestFederationSave { label: "noon".into() }).unwrap();
    assert_eq!(outcome.deliveries, everyone(&feds, &Callback::InitiateFederateSave {
        label: "noon".into()
    }));

    for fed in &feds[..2] {
        f.process(*fed, Request::FederateSaveBegun).unwrap();
        let outcome = f.process(*fed, Request::FederateSaveComplete).unwrap();
        assert!(outcome.deliveries.is_empty());
    }
    let outcome = f.process(feds[2], Request::FederateSaveComplete).unwrap();
    assert_eq!(outcome.deliveries, everyone(&feds, &Callback::FederationSaved));
    assert_eq!(f.store().list_labels("fleet").unwrap(), vec!["noon".to_string()]);
}

#[test]
fn failed_save_closes_only_after_everyone_reports() {
    let (mut f, feds) = federation(MemorySaveStore::new(), 3);
    f.process(feds[0], Request::RequestFederationSave { label: "noon".into() }).unwrap();

    let outcome = f.process(feds[1], Request::FederateSaveNotComplete).unwrap();
    assert!(outcome.deliveries.is_empty());
    assert!(f.save_restore().save_in_progress());

    let outcome = f.process(feds[0], Request::FederateSaveComplete).unwrap();
    assert!(outcome.deliveries.is_empty());

    let outcome = f.process(feds[2], Request::FederateSaveComplete).unwrap();
    assert_eq!(
        outcome.deliveries,
        everyone(&feds, &Callback::FederationNotSaved {
            reason: SaveFailureReason::FederateReportedFailure
        })
    );
    assert!(f.store().list_labels("fleet").unwrap().is_empty());
}

#[test]
fn resignation_mid_save_fails_the_save() {
    let (mut f, feds) = federation(MemorySaveStore::new(), 3);
    f.process(feds[0], Request::RequestFederationSave { label: "noon".into() }).unwrap();
    f.process(feds[0], Request::FederateSaveComplete).unwrap();
    f.process(feds[2], Request::FederateSaveComplete).unwrap();

    let outcome = f.process(feds[1], Request::Resign(ResignAction::NoAction)).unwrap();
    assert_eq!(
        outcome.deliveries,
        everyone(&[feds[0], feds[2]], &Callback::FederationNotSaved {
            reason: SaveFailureReason::FederateResigned
        })
    );
    assert!(!f.save_restore().save_in_progress());
}

#[test]
fn store_failure_reports_rti_unable_to_save() {
    let store = ChaoticSaveStore::new(MemorySaveStore::new(), 1.0);
    let (mut f, feds) = federation(store, 1);
    f.process(feds[0], Request::RequestFederationSave { label: "noon".into() }).unwrap();

    let outcome = f.process(feds[0], Request::FederateSaveComplete).unwrap();
    assert_eq!(outcome.deliveries, vec![Delivery::new(feds[0], Callback::FederationNotSaved {
        reason: SaveFailureReason::RtiUnableToSave
    })]);
    assert_eq!(f.store().failure_count(), 1);
}

#[test]
fn second_save_rejected_and_status_reported() {
    let (mut f, feds) = federation(MemorySaveStore::new(), 2);
    f.process(feds[0], Request::RequestFederationSave { label: "a".into() }).unwrap();
    assert_eq!(
        f.process(feds[1], Request::RequestFederationSave { label: "b".into() }),
        Err(RtiError::SaveInProgress)
    );

    f.process(feds[1], Request::FederateSaveBegun).unwrap();
    let outcome = f.process(feds[0], Request::QueryFederationSaveStatus).unwrap();
    assert_eq!(outcome.response, Response::SaveStatus(vec![
        (feds[0], SaveStatus::InstructedToSave),
        (feds[1], SaveStatus::Saving),
    ]));
    assert_eq!(f.process(feds[0], Request::FederateRestoreComplete), Err(RtiError::RestoreNotRequested));
}

#[test]
fn restore_rewinds_time_and_ownership() {
    let (mut f, feds) = federation(MemorySaveStore::new(), 2);
    let (a, b) = (feds[0], feds[1]);
    f.process(a, Request::EnableTimeRegulation { lookahead: Integer64Interval::new(1) }).unwrap();
    let object = match f
        .process(a, Request::RegisterObjectInstance { class: ObjectClassHandle::new(1) })
        .unwrap()
        .response
    {
        Response::ObjectRegistered(object) => object,
        other => panic!("unexpected response {other:?}"),
    };

    f.process(a, Request::RequestFederationSave { label: "s".into() }).unwrap();
    f.process(a, Request::FederateSaveComplete).unwrap();
    f.process(b, Request::FederateSaveComplete).unwrap();

    let position: BTreeSet<_> = [AttributeHandle::new(1)].into_iter().collect();
    f.process(a, Request::UnconditionalDivest { object, attributes: position }).unwrap();
    f.process(a, Request::TimeAdvance {
        kind: meridian_rti::AdvanceKind::TimeAdvance,
        time: Integer64Time::new(20),
    })
    .unwrap();

    let outcome = f.process(b, Request::RequestFederationRestore { label: "s".into() }).unwrap();
    assert_eq!(outcome.deliveries[0], Delivery::new(b, Callback::RequestFederationRestoreSucceeded {
        label: "s".into()
    }));
    assert!(outcome.deliveries.contains(&Delivery::new(a, Callback::InitiateFederateRestore {
        label: "s".into(),
        federate: a,
    })));

    f.process(a, Request::FederateRestoreBegun).unwrap();
    f.process(a, Request::FederateRestoreComplete).unwrap();
    let outcome = f.process(b, Request::FederateRestoreComplete).unwrap();
    assert_eq!(outcome.deliveries, everyone(&feds, &Callback::FederationRestored));

    assert_eq!(
        f.process(a, Request::QueryLogicalTime).unwrap().response,
        Response::LogicalTime(Integer64Time::new(0))
    );
    assert_eq!(f.ownership().query_owner(object, AttributeHandle::new(1)).unwrap(), Some(a));
}

#[test]
fn failed_restore_keeps_current_state() {
    let (mut f, feds) = federation(MemorySaveStore::new(), 2);
    f.process(feds[0], Request::RequestFederationSave { label: "s".into() }).unwrap();
    f.process(feds[0], Request::FederateSaveComplete).unwrap();
    f.process(feds[1], Request::FederateSaveComplete).unwrap();
    f.process(feds[0], Request::EnableTimeConstrained).unwrap();

    f.process(feds[0], Request::RequestFederationRestore { label: "s".into() }).unwrap();
    f.process(feds[0], Request::FederateRestoreNotComplete).unwrap();
    let outcome = f.process(feds[1], Request::FederateRestoreComplete).unwrap();

    assert_eq!(
        outcome.deliveries,
        everyone(&feds, &Callback::FederationNotRestored {
            reason: RestoreFailureReason::FederateReportedFailure
        })
    );
    assert!(f.time().state(feds[0]).unwrap().is_constrained());
}

#[test]
fn restore_requires_saved_federates() {
    let (mut f, feds) = federation(MemorySaveStore::new(), 2);
    f.process(feds[0], Request::RequestFederationSave { label: "s".into() }).unwrap();
    f.process(feds[0], Request::FederateSaveComplete).unwrap();
    f.process(feds[1], Request::FederateSaveComplete).unwrap();
    f.process(feds[1], Request::Resign(ResignAction::NoAction)).unwrap();

    let outcome = f.process(feds[0], Request::RequestFederationRestore { label: "s".into() }).unwrap();
    assert_eq!(outcome.deliveries, vec![Delivery::new(
        feds[0],
        Callback::RequestFederationRestoreFailed { label: "s".into() }
    )]);
}

#[test]
fn synchronization_point_round() {
    let (mut f, feds) = federation(MemorySaveStore::new(), 2);
    let tag = Bytes::from_static(b"go");

    let outcome = f
        .process(feds[0], Request::RegisterSynchronizationPoint {
            label: "start".into(),
            tag: tag.clone(),
            participants: None,
        })
        .unwrap();
    assert_eq!(outcome.deliveries.len(), 3);

    let (late, announced) = f.join("sim", "late").unwrap();
    assert_eq!(announced, vec![Delivery::new(late, Callback::AnnounceSynchronizationPoint {
        label: "start".into(),
        tag,
    })]);

    f.process(feds[0], Request::SynchronizationPointAchieved { label: "start".into(), success: true })
        .unwrap();
    f.process(feds[1], Request::SynchronizationPointAchieved { label: "start".into(), success: true })
        .unwrap();
    let outcome = f
        .process(late, Request::SynchronizationPointAchieved { label: "start".into(), success: true })
        .unwrap();

    let all = [feds[0], feds[1], late];
    assert_eq!(outcome.deliveries, everyone(&all, &Callback::FederationSynchronized {
        label: "start".into(),
        failed: BTreeSet::new(),
    }));
    assert_eq!(
        f.process(late, Request::SynchronizationPointAchieved { label: "start".into(), success: true }),
        Err(RtiError::SynchronizationPointLabelNotAnnounced("start".into()))
    );
}
