//! Property-based tests for the coordination protocols
//!
//! Random request sequences are applied to a small federation and the
//! externally visible guarantees checked after every step: grants never move
//! a clock backwards, a fixed set of regulators never lowers anyone's GALT,
//! constrained clocks stay within GALT, and ownership hands off in request
//! order.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use meridian_core::{
    AttributeHandle, FederateHandle, Integer64Interval, Integer64Time, InteractionClassHandle,
    LogicalTime, ObjectClassHandle, ObjectModel,
};
use meridian_rti::{
    AdvanceKind, Callback, FederationConfig, FederationExecution, MemorySaveStore, Request,
    Response,
};
use proptest::prelude::*;

type Federation = FederationExecution<Integer64Time, MemorySaveStore>;

const RADIO: InteractionClassHandle = InteractionClassHandle::new(1);
const TRUCK: ObjectClassHandle = ObjectClassHandle::new(1);
const CARGO: AttributeHandle = AttributeHandle::new(1);

#[derive(Debug, Clone)]
enum Step {
    Advance { federate: usize, kind: AdvanceKind, delta: i64 },
    Send { federate: usize, delta: i64 },
}

fn step() -> impl Strategy<Value = Step> {
    let kind = prop_oneof![
        Just(AdvanceKind::TimeAdvance),
        Just(AdvanceKind::TimeAdvanceAvailable),
        Just(AdvanceKind::NextMessage),
        Just(AdvanceKind::NextMessageAvailable),
        Just(AdvanceKind::FlushQueue),
    ];
    prop_oneof![
        3 => (0usize..3, kind, 0i64..6)
            .prop_map(|(federate, kind, delta)| Step::Advance { federate, kind, delta }),
        1 => (0usize..3, 0i64..6).prop_map(|(federate, delta)| Step::Send { federate, delta }),
    ]
}

/// Two constrained regulators with lookahead 1 and one constrained-only
/// federate, all subscribed to RADIO.
fn federation() -> (Federation, Vec<FederateHandle>) {
    let model = ObjectModel::builder().interaction_class(RADIO, "Radio").build();
    let mut f =
        FederationExecution::new("props", model, FederationConfig::default(), MemorySaveStore::new());
    let feds: Vec<_> = ["a", "b", "c"].iter().map(|n| f.join("sim", *n).unwrap().0).collect();

    for fed in &feds[..2] {
        f.process(*fed, Request::EnableTimeRegulation { lookahead: Integer64Interval::new(1) })
            .unwrap();
    }
    for fed in &feds {
        f.process(*fed, Request::EnableTimeConstrained).unwrap();
        f.process(*fed, Request::SubscribeInteractionClass(RADIO)).unwrap();
    }
    (f, feds)
}

fn logical_time(f: &Federation, fed: FederateHandle) -> Integer64Time {
    f.time().state(fed).map_or_else(Integer64Time::initial, |s| s.current_time())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: Grants never move a clock backwards, and the clock follows
    /// the last grant
    #[test]
    fn prop_grants_are_monotonic(steps in prop::collection::vec(step(), 1..60)) {
        let (mut f, feds) = federation();
        let mut last: BTreeMap<FederateHandle, Integer64Time> = BTreeMap::new();

        for step in steps {
            let Some(outcome) = apply(&mut f, &feds, &step) else { continue };
            for delivery in outcome {
                if let Callback::TimeAdvanceGrant { time } = delivery.callback {
                    let previous = last.insert(delivery.federate, time).unwrap_or_else(Integer64Time::initial);
                    prop_assert!(time >= previous, "grant {time} after {previous}");
                    prop_assert_eq!(logical_time(&f, delivery.federate), time);
                }
            }
        }
    }

    /// Property: With a fixed set of regulators, GALT never decreases and
    /// constrained clocks never pass it
    #[test]
    fn prop_galt_is_monotonic_and_bounds_constrained(steps in prop::collection::vec(step(), 1..60)) {
        let (mut f, feds) = federation();
        let mut galts: BTreeMap<FederateHandle, Integer64Time> =
            feds.iter().filter_map(|fed| Some((*fed, f.time().galt_for(*fed)?))).collect();

        for step in steps {
            apply(&mut f, &feds, &step);
            for fed in &feds {
                let Some(galt) = f.time().galt_for(*fed) else { continue };
                if let Some(previous) = galts.insert(*fed, galt) {
                    prop_assert!(galt >= previous, "GALT of {fed} fell from {previous} to {galt}");
                }
                prop_assert!(logical_time(&f, *fed) <= galt);
            }
        }
    }

    /// Property: Queued acquirers receive ownership in request order
    #[test]
    fn prop_acquisition_queue_is_fifo(order in Just((1usize..5).collect::<Vec<_>>()).prop_shuffle()) {
        let model = ObjectModel::builder().object_class(TRUCK, "Truck", [CARGO]).build();
        let mut f: Federation =
            FederationExecution::new("fifo", model, FederationConfig::default(), MemorySaveStore::new());
        let feds: Vec<_> =
            (0..5).map(|i| f.join("sim", format!("f{i}")).unwrap().0).collect();
        let cargo: BTreeSet<_> = [CARGO].into_iter().collect();

        let object = match f.process(feds[0], Request::RegisterObjectInstance { class: TRUCK }).unwrap().response {
            Response::ObjectRegistered(object) => object,
            other => panic!("unexpected response {other:?}"),
        };
        for i in &order {
            f.process(feds[*i], Request::Acquire { object, attributes: cargo.clone(), tag: Bytes::new() })
                .unwrap();
        }

        let mut owner = feds[0];
        for i in &order {
            f.process(owner, Request::UnconditionalDivest { object, attributes: cargo.clone() })
                .unwrap();
            owner = feds[*i];
            prop_assert_eq!(f.ownership().query_owner(object, CARGO).unwrap(), Some(owner));
        }
    }
}

/// Apply one step, ignoring rejected requests.
fn apply(
    f: &mut Federation,
    feds: &[FederateHandle],
    step: &Step,
) -> Option<Vec<meridian_rti::Delivery<Integer64Time>>> {
    let (federate, request) = match *step {
        Step::Advance { federate, kind, delta } => {
            let fed = feds[federate];
            let time = logical_time(f, fed).add(Integer64Interval::new(delta)).ok()?;
            (fed, Request::TimeAdvance { kind, time })
        },
        Step::Send { federate, delta } => {
            let fed = feds[federate];
            let base = f.time().state(fed)?.lots().unwrap_or_else(|| logical_time(f, fed));
            let time = base.add(Integer64Interval::new(delta)).ok()?;
            (fed, Request::SendInteraction {
                class: RADIO,
                parameters: Bytes::new(),
                tag: Bytes::new(),
                time: Some(time),
            })
        },
    };
    f.process(federate, request).ok().map(|outcome| outcome.deliveries)
}
