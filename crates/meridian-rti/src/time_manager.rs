//! Time management engine.
//!
//! Tracks each federate's logical clock and decides when outstanding time
//! advances may be granted.
//!
//! # Causality
//!
//! A constrained federate is never granted a time advance, nor delivered a
//! timestamp-ordered message, past its GALT: the least time any *other*
//! regulating federate may still send at (the minimum of their LOTS).
//!
//! # Evaluation
//!
//! Requests that cannot be granted are parked in the federate's state.
//! Every mutation that can move GALT re-runs [`TimeManager::evaluate`], which
//! revisits parked requests and constrained enables in join order until a
//! fixpoint, emitting only net-new callbacks.
//!
//! # LOTS
//!
//! A regulator's LOTS is its base time plus lookahead, where the base is the
//! requested time of an outstanding advance (bounded by LITS and GALT for
//! next-message requests) or otherwise the current time. With zero lookahead
//! a non-available request (or a grant from one) moves LOTS to the successor
//! of the base. LOTS never decreases while the federate stays regulating, so
//! GALT never decreases while the set of regulators is unchanged.

use std::collections::BTreeMap;

use bytes::Bytes;
use meridian_core::{
    FederateHandle, InteractionClassHandle, LogicalTime, LogicalTimeInterval, RtiError,
};
use serde::{Deserialize, Serialize};

use crate::{
    callback::{Callback, Delivery, OrderType},
    request::AdvanceKind,
};

/// A timestamp-ordered message waiting for its receiver's clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    /// Interaction class
    pub class: InteractionClassHandle,
    /// Encoded parameter values
    pub parameters: Bytes,
    /// User-supplied tag
    pub tag: Bytes,
    /// Sending federate
    pub sender: FederateHandle,
}

/// An interaction on its way to subscribers.
#[derive(Debug, Clone)]
pub struct OutgoingMessage<T: LogicalTime> {
    /// Message content
    pub message: QueuedMessage,
    /// Timestamp, if sent with one
    pub time: Option<T>,
}

/// Per-federate time state.
#[derive(Debug, Clone)]
pub struct FederateTimeState<T: LogicalTime> {
    regulating: bool,
    constrained: bool,
    constrained_pending: bool,
    lookahead: T::Interval,
    current_time: T,
    requested_time: Option<T>,
    pending_request: AdvanceKind,
    /// Promised LOTS; also the floor for the next computation
    lots: Option<T>,
    /// Last grant came from a non-available request
    strict: bool,
    /// Undelivered timestamp-ordered messages keyed by (timestamp, arrival)
    queue: BTreeMap<(T, u64), QueuedMessage>,
}

impl<T: LogicalTime> Default for FederateTimeState<T> {
    fn default() -> Self {
        Self {
            regulating: false,
            constrained: false,
            constrained_pending: false,
            lookahead: <T::Interval as LogicalTimeInterval>::zero(),
            current_time: T::initial(),
            requested_time: None,
            pending_request: AdvanceKind::None,
            lots: None,
            strict: false,
            queue: BTreeMap::new(),
        }
    }
}

impl<T: LogicalTime> FederateTimeState<T> {
    /// Whether the federate is time regulating.
    pub fn is_regulating(&self) -> bool {
        self.regulating
    }

    /// Whether the federate is time constrained.
    pub fn is_constrained(&self) -> bool {
        self.constrained
    }

    /// Whether a constrained enable is outstanding.
    pub fn is_constrained_pending(&self) -> bool {
        self.constrained_pending
    }

    /// Current lookahead.
    pub fn lookahead(&self) -> T::Interval {
        self.lookahead
    }

    /// Current logical time.
    pub fn current_time(&self) -> T {
        self.current_time
    }

    /// Requested time of the outstanding advance.
    pub fn requested_time(&self) -> Option<T> {
        self.requested_time
    }

    /// Kind of the outstanding advance.
    pub fn pending_request(&self) -> AdvanceKind {
        self.pending_request
    }

    /// Whether a time advance is outstanding.
    pub fn time_advance_pending(&self) -> bool {
        self.pending_request != AdvanceKind::None
    }

    /// Least outgoing timestamp. `None` unless regulating.
    pub fn lots(&self) -> Option<T> {
        self.lots
    }

    /// Smallest queued timestamp.
    pub fn lits(&self) -> Option<T> {
        self.queue.keys().next().map(|(time, _)| *time)
    }

    /// Number of undelivered timestamp-ordered messages.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn base_time(&self) -> T {
        match self.pending_request {
            AdvanceKind::None => self.current_time,
            AdvanceKind::NextMessage | AdvanceKind::NextMessageAvailable => {
                let requested = self.requested_time.unwrap_or(self.current_time);
                self.lits().map_or(requested, |lits| requested.min(lits))
            },
            _ => self.requested_time.unwrap_or(self.current_time),
        }
    }

    fn strict_base(&self) -> bool {
        match self.pending_request {
            AdvanceKind::None => self.strict,
            kind => !kind.is_available(),
        }
    }

    /// LOTS ignoring other federates.
    fn unbounded_lots(&self) -> T {
        step(self.base_time(), self.lookahead, self.strict_base())
    }
}

/// `base + lookahead`, or its successor for strict zero-lookahead bases.
fn step<T: LogicalTime>(base: T, lookahead: T::Interval, strict: bool) -> T {
    let lots = base.saturating_add(lookahead);
    if strict && lookahead.is_zero() { lots.successor() } else { lots }
}

/// Serialized time state, logical times in their fixed-width encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeStateSnapshot {
    /// Federate
    pub federate: FederateHandle,
    /// Regulating flag
    pub regulating: bool,
    /// Constrained flag
    pub constrained: bool,
    /// Encoded lookahead
    pub lookahead: [u8; 8],
    /// Encoded current time
    pub current_time: [u8; 8],
    /// Encoded LOTS floor
    pub lots: Option<[u8; 8]>,
    /// Strict flag of the last grant
    pub strict: bool,
}

/// Time management engine for one federation execution.
#[derive(Debug)]
pub struct TimeManager<T: LogicalTime> {
    states: BTreeMap<FederateHandle, FederateTimeState<T>>,
    require_positive_lookahead: bool,
    next_sequence: u64,
    /// Last federation-wide GALT, for change logging
    galt: Option<T>,
}

impl<T: LogicalTime> TimeManager<T> {
    /// Create an engine with no federates.
    pub fn new(require_positive_lookahead: bool) -> Self {
        Self { states: BTreeMap::new(), require_positive_lookahead, next_sequence: 0, galt: None }
    }

    /// Start tracking a newly joined federate at the initial time.
    pub fn add_federate(&mut self, federate: FederateHandle) {
        self.states.insert(federate, FederateTimeState::default());
    }

    /// Stop tracking a resigned federate. Removing a regulator can only raise
    /// GALT, so parked requests are re-evaluated.
    pub fn remove_federate(&mut self, federate: FederateHandle) -> Vec<Delivery<T>> {
        let mut out = Vec::new();
        if self.states.remove(&federate).is_some() {
            self.evaluate(&mut out);
        }
        out
    }

    /// Time state of a federate.
    pub fn state(&self, federate: FederateHandle) -> Option<&FederateTimeState<T>> {
        self.states.get(&federate)
    }

    /// All time states in join order.
    pub fn states(&self) -> impl Iterator<Item = (FederateHandle, &FederateTimeState<T>)> {
        self.states.iter().map(|(handle, state)| (*handle, state))
    }

    fn state_mut(&mut self, federate: FederateHandle) -> Result<&mut FederateTimeState<T>, RtiError> {
        self.states.get_mut(&federate).ok_or(RtiError::FederateNotExecutionMember(federate))
    }

    fn require(&self, federate: FederateHandle) -> Result<&FederateTimeState<T>, RtiError> {
        self.states.get(&federate).ok_or(RtiError::FederateNotExecutionMember(federate))
    }

    /// Federation-wide GALT: the minimum LOTS over all regulators.
    pub fn galt(&self) -> Option<T> {
        self.states.values().filter_map(|s| s.lots).min()
    }

    /// GALT as seen by `federate`, excluding its own LOTS.
    pub fn galt_for(&self, federate: FederateHandle) -> Option<T> {
        self.states.iter().filter(|(h, _)| **h != federate).filter_map(|(_, s)| s.lots).min()
    }

    /// Federation-wide LITS: the smallest queued timestamp.
    pub fn lits(&self) -> Option<T> {
        self.states.values().filter_map(FederateTimeState::lits).min()
    }

    /// `queryLITS`: the federate's LITS bounded by its GALT.
    pub fn query_lits(&self, federate: FederateHandle) -> Result<Option<T>, RtiError> {
        let lits = self.require(federate)?.lits();
        let galt = self.galt_for(federate);
        Ok(match (lits, galt) {
            (Some(l), Some(g)) => Some(l.min(g)),
            (l, g) => l.or(g),
        })
    }

    /// `queryLookahead`.
    pub fn query_lookahead(&self, federate: FederateHandle) -> Result<T::Interval, RtiError> {
        let state = self.require(federate)?;
        if !state.regulating {
            return Err(RtiError::TimeRegulationIsNotEnabled);
        }
        Ok(state.lookahead)
    }

    /// `queryLogicalTime`.
    pub fn query_logical_time(&self, federate: FederateHandle) -> Result<T, RtiError> {
        Ok(self.require(federate)?.current_time)
    }

    fn validate_lookahead(&self, lookahead: T::Interval) -> Result<(), RtiError> {
        if lookahead.is_negative() {
            return Err(RtiError::InvalidLookahead(format!("negative lookahead {lookahead}")));
        }
        if self.require_positive_lookahead && lookahead.is_zero() {
            return Err(RtiError::InvalidLookahead("zero lookahead not permitted".to_string()));
        }
        Ok(())
    }

    /// `enableTimeRegulation`.
    ///
    /// If constrained federates exist, the regulator's time moves forward so
    /// its LOTS does not fall below any constrained federate's current time.
    pub fn enable_time_regulation(
        &mut self,
        federate: FederateHandle,
        lookahead: T::Interval,
    ) -> Result<Vec<Delivery<T>>, RtiError> {
        let state = self.require(federate)?;
        if state.regulating {
            return Err(RtiError::TimeRegulationAlreadyEnabled);
        }
        self.validate_lookahead(lookahead)?;
        if state.time_advance_pending() {
            return Err(RtiError::InTimeAdvancingState);
        }

        let required = self
            .states
            .iter()
            .filter(|(h, s)| **h != federate && s.constrained)
            .map(|(_, s)| if s.strict { s.current_time.successor() } else { s.current_time })
            .max();

        let mut time = state.current_time;
        if let Some(required) = required
            && time.saturating_add(lookahead) < required
        {
            time = time.max(required.subtract(lookahead)?);
        }

        let state = self.state_mut(federate)?;
        state.regulating = true;
        state.lookahead = lookahead;
        state.current_time = time;
        state.strict = false;
        state.lots = None;

        tracing::debug!(
            federate = %federate,
            time = %time,
            lookahead = %lookahead,
            "Time regulation enabled"
        );

        let mut out = vec![Delivery::new(federate, Callback::TimeRegulationEnabled { time })];
        self.evaluate(&mut out);
        Ok(out)
    }

    /// `disableTimeRegulation`.
    pub fn disable_time_regulation(
        &mut self,
        federate: FederateHandle,
    ) -> Result<Vec<Delivery<T>>, RtiError> {
        let state = self.state_mut(federate)?;
        if !state.regulating {
            return Err(RtiError::TimeRegulationIsNotEnabled);
        }
        state.regulating = false;
        state.lots = None;

        tracing::debug!(federate = %federate, "Time regulation disabled");

        let mut out = Vec::new();
        self.evaluate(&mut out);
        Ok(out)
    }

    /// `enableTimeConstrained`. Completes asynchronously once the federate's
    /// time does not exceed its GALT.
    pub fn enable_time_constrained(
        &mut self,
        federate: FederateHandle,
    ) -> Result<Vec<Delivery<T>>, RtiError> {
        let state = self.state_mut(federate)?;
        if state.constrained {
            return Err(RtiError::TimeConstrainedAlreadyEnabled);
        }
        if state.constrained_pending {
            return Err(RtiError::RequestForTimeConstrainedPending);
        }
        if state.time_advance_pending() {
            return Err(RtiError::InTimeAdvancingState);
        }
        state.constrained_pending = true;

        let mut out = Vec::new();
        self.evaluate(&mut out);
        Ok(out)
    }

    /// `disableTimeConstrained`. Queued messages are delivered at once in
    /// arrival order and any outstanding advance becomes ungated.
    pub fn disable_time_constrained(
        &mut self,
        federate: FederateHandle,
    ) -> Result<Vec<Delivery<T>>, RtiError> {
        let state = self.state_mut(federate)?;
        if !state.constrained {
            return Err(RtiError::TimeConstrainedIsNotEnabled);
        }
        state.constrained = false;

        let mut queued: Vec<_> = std::mem::take(&mut state.queue).into_iter().collect();
        queued.sort_by_key(|((_, sequence), _)| *sequence);

        let mut out: Vec<_> = queued
            .into_iter()
            .map(|((time, _), message)| {
                Delivery::new(federate, receive(message, Some(time), OrderType::Receive))
            })
            .collect();

        tracing::debug!(federate = %federate, flushed = out.len(), "Time constrained disabled");

        self.evaluate(&mut out);
        Ok(out)
    }

    /// `modifyLookahead`. A decrease never lowers the promised LOTS.
    pub fn modify_lookahead(
        &mut self,
        federate: FederateHandle,
        lookahead: T::Interval,
    ) -> Result<Vec<Delivery<T>>, RtiError> {
        if !self.require(federate)?.regulating {
            return Err(RtiError::TimeRegulationIsNotEnabled);
        }
        self.validate_lookahead(lookahead)?;
        self.state_mut(federate)?.lookahead = lookahead;

        let mut out = Vec::new();
        self.evaluate(&mut out);
        Ok(out)
    }

    /// Time advance request of any kind.
    pub fn request_advance(
        &mut self,
        federate: FederateHandle,
        kind: AdvanceKind,
        time: T,
    ) -> Result<Vec<Delivery<T>>, RtiError> {
        if kind == AdvanceKind::None {
            return Err(RtiError::RtiInternal("time advance without a kind".to_string()));
        }

        let state = self.require(federate)?;
        if state.time_advance_pending() {
            return Err(RtiError::TimeAdvanceAlreadyInProgress);
        }
        if state.constrained_pending {
            return Err(RtiError::RequestForTimeConstrainedPending);
        }
        if time <= state.current_time {
            return Err(RtiError::LogicalTimeAlreadyPassed {
                requested: time.to_string(),
                current: state.current_time.to_string(),
            });
        }

        let mut out = Vec::new();
        if kind == AdvanceKind::FlushQueue {
            self.flush_queue(federate, time, &mut out)?;
        } else {
            let state = self.state_mut(federate)?;
            state.pending_request = kind;
            state.requested_time = Some(time);
            tracing::debug!(federate = %federate, ?kind, time = %time, "Time advance requested");
        }

        self.evaluate(&mut out);
        Ok(out)
    }

    /// Deliver everything queued up to `time`, then grant as far as causality
    /// allows.
    fn flush_queue(
        &mut self,
        federate: FederateHandle,
        time: T,
        out: &mut Vec<Delivery<T>>,
    ) -> Result<(), RtiError> {
        let galt = self.galt_for(federate);
        let state = self.state_mut(federate)?;

        deliver_up_to(federate, state, time, out);

        let mut granted = time;
        if state.constrained
            && let Some(galt) = galt
        {
            granted = granted.min(galt);
        }
        granted = granted.max(state.current_time);

        state.pending_request = AdvanceKind::FlushQueue;
        state.requested_time = Some(time);
        grant(federate, state, granted, out);
        Ok(())
    }

    /// Fail with `InvalidLogicalTime` if `time` is below a regulating
    /// sender's LOTS.
    pub fn check_send_time(&self, sender: FederateHandle, time: T) -> Result<(), RtiError> {
        let state = self.require(sender)?;
        if let Some(lots) = state.lots
            && state.regulating
            && time < lots
        {
            return Err(RtiError::InvalidLogicalTime(format!(
                "timestamp {time} is below the sender's LOTS {lots}"
            )));
        }
        Ok(())
    }

    /// Route a message to its receivers.
    ///
    /// Timestamped messages from a regulating sender are queued for
    /// constrained receivers; everything else is delivered in arrival order.
    pub fn route_message(
        &mut self,
        sender: FederateHandle,
        receivers: &[FederateHandle],
        outgoing: OutgoingMessage<T>,
    ) -> Vec<Delivery<T>> {
        let regulating = self.states.get(&sender).is_some_and(|s| s.regulating);
        let timestamp = outgoing.time.filter(|_| regulating);

        let mut out = Vec::new();
        let mut queued = false;

        for receiver in receivers.iter().copied().filter(|r| *r != sender) {
            let Some(state) = self.states.get_mut(&receiver) else {
                continue;
            };

            match timestamp {
                Some(time) if state.constrained => {
                    if time <= state.current_time {
                        out.push(Delivery::new(
                            receiver,
                            receive(outgoing.message.clone(), Some(time), OrderType::Timestamp),
                        ));
                    } else {
                        let sequence = self.next_sequence;
                        self.next_sequence += 1;
                        state.queue.insert((time, sequence), outgoing.message.clone());
                        queued = true;
                    }
                },
                _ => out.push(Delivery::new(
                    receiver,
                    receive(outgoing.message.clone(), outgoing.time, OrderType::Receive),
                )),
            }
        }

        if queued {
            self.evaluate(&mut out);
        }
        out
    }

    /// Re-evaluate parked requests until nothing more can be granted.
    pub fn evaluate(&mut self, out: &mut Vec<Delivery<T>>) {
        loop {
            self.refresh_lots();

            let handles: Vec<_> = self.states.keys().copied().collect();
            let mut progressed = false;
            for handle in handles {
                if self.try_progress(handle, out) {
                    progressed = true;
                    self.refresh_lots();
                }
            }

            if !progressed {
                break;
            }
        }

        let galt = self.galt();
        if galt != self.galt {
            tracing::debug!(old = ?self.galt, new = ?galt, "GALT updated");
            self.galt = galt;
        }
    }

    /// Recompute every regulator's LOTS.
    ///
    /// Constrained regulators waiting on a next-message request may still be
    /// granted anything up to their GALT, so their LOTS is also bounded by
    /// it. Those bounds depend on each other; the greatest consistent
    /// assignment is found by iterating from the unbounded values downwards.
    fn refresh_lots(&mut self) {
        let mut values: BTreeMap<FederateHandle, T> = self
            .states
            .iter()
            .filter(|(_, s)| s.regulating)
            .map(|(h, s)| {
                let lots = s.unbounded_lots();
                (*h, s.lots.map_or(lots, |floor| lots.max(floor)))
            })
            .collect();

        let bounded: Vec<FederateHandle> = self
            .states
            .iter()
            .filter(|(_, s)| s.regulating && s.constrained && s.pending_request.is_next_message())
            .map(|(h, _)| *h)
            .collect();

        for _ in 0..=values.len() {
            let mut changed = false;
            for handle in &bounded {
                let galt =
                    values.iter().filter(|(h, _)| *h != handle).map(|(_, lots)| *lots).min();
                let (Some(galt), Some(state), Some(current)) =
                    (galt, self.states.get(handle), values.get(handle).copied())
                else {
                    continue;
                };

                let candidate = step(
                    galt.max(state.current_time),
                    state.lookahead,
                    !state.pending_request.is_available(),
                );
                let mut lots = current.min(candidate);
                if let Some(floor) = state.lots {
                    lots = lots.max(floor);
                }
                if lots < current {
                    values.insert(*handle, lots);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        for (handle, state) in &mut self.states {
            state.lots = values.get(handle).copied();
        }
    }

    /// Complete a constrained enable or grant a parked advance, if GALT
    /// allows it.
    fn try_progress(&mut self, federate: FederateHandle, out: &mut Vec<Delivery<T>>) -> bool {
        let galt = self.galt_for(federate);
        let Some(state) = self.states.get_mut(&federate) else {
            return false;
        };

        if state.constrained_pending {
            if galt.is_none_or(|g| state.current_time <= g) {
                state.constrained_pending = false;
                state.constrained = true;
                let time = state.current_time;
                tracing::debug!(federate = %federate, time = %time, "Time constrained enabled");
                out.push(Delivery::new(federate, Callback::TimeConstrainedEnabled { time }));
                return true;
            }
            return false;
        }

        let Some(requested) = state.requested_time else {
            return false;
        };
        let kind = state.pending_request;

        let target = if kind.is_next_message() {
            state.lits().map_or(requested, |lits| requested.min(lits))
        } else {
            requested
        };

        let allowed = match galt {
            Some(galt) if state.constrained => {
                if kind.is_available() {
                    target <= galt
                } else {
                    target < galt
                }
            },
            _ => true,
        };
        if !allowed {
            return false;
        }

        deliver_up_to(federate, state, target, out);
        grant(federate, state, target, out);
        true
    }

    /// Serialize every federate's time state.
    pub fn snapshot(&self) -> Vec<TimeStateSnapshot> {
        self.states
            .iter()
            .map(|(federate, s)| TimeStateSnapshot {
                federate: *federate,
                regulating: s.regulating,
                constrained: s.constrained,
                lookahead: s.lookahead.encode(),
                current_time: s.current_time.encode(),
                lots: s.lots.map(|lots| lots.encode()),
                strict: s.strict,
            })
            .collect()
    }

    /// Replace time states from a snapshot.
    ///
    /// Outstanding advances, constrained enables and queued messages are
    /// discarded for every federate. Federates absent from the snapshot keep
    /// their flags and clock. Nothing changes if any entry fails to decode.
    pub fn restore(&mut self, snapshot: &[TimeStateSnapshot]) -> Result<(), RtiError> {
        let mut decoded = Vec::with_capacity(snapshot.len());
        for entry in snapshot {
            let lots = entry.lots.as_ref().map(|bytes| T::decode(bytes)).transpose()?;
            decoded.push((
                entry.federate,
                entry.regulating,
                entry.constrained,
                T::Interval::decode(&entry.lookahead)?,
                T::decode(&entry.current_time)?,
                lots,
                entry.strict,
            ));
        }

        for state in self.states.values_mut() {
            state.constrained_pending = false;
            state.pending_request = AdvanceKind::None;
            state.requested_time = None;
            state.queue.clear();
        }

        for (federate, regulating, constrained, lookahead, current_time, lots, strict) in decoded {
            if let Some(state) = self.states.get_mut(&federate) {
                state.regulating = regulating;
                state.constrained = constrained;
                state.lookahead = lookahead;
                state.current_time = current_time;
                state.lots = if regulating { lots } else { None };
                state.strict = strict;
            }
        }

        self.refresh_lots();
        self.galt = self.galt();
        Ok(())
    }
}

fn receive<T: LogicalTime>(message: QueuedMessage, time: Option<T>, order: OrderType) -> Callback<T> {
    Callback::ReceiveInteraction {
        class: message.class,
        parameters: message.parameters,
        tag: message.tag,
        sender: message.sender,
        time,
        order,
    }
}

/// Deliver queued messages with timestamp `<= time`, in timestamp then
/// arrival order.
fn deliver_up_to<T: LogicalTime>(
    federate: FederateHandle,
    state: &mut FederateTimeState<T>,
    time: T,
    out: &mut Vec<Delivery<T>>,
) {
    while let Some(entry) = state.queue.first_entry() {
        if entry.key().0 > time {
            break;
        }
        let ((timestamp, _), message) = entry.remove_entry();
        out.push(Delivery::new(federate, receive(message, Some(timestamp), OrderType::Timestamp)));
    }
}

fn grant<T: LogicalTime>(
    federate: FederateHandle,
    state: &mut FederateTimeState<T>,
    time: T,
    out: &mut Vec<Delivery<T>>,
) {
    debug_assert!(time >= state.current_time);

    state.strict = !state.pending_request.is_available();
    state.pending_request = AdvanceKind::None;
    state.requested_time = None;
    state.current_time = time;

    tracing::debug!(federate = %federate, time = %time, "Time advance granted");
    out.push(Delivery::new(federate, Callback::TimeAdvanceGrant { time }));
}
