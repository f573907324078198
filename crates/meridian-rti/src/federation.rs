//! Federation execution.
//!
//! Ties together the federate registry, time management, ownership, sync
//! points and save/restore for one federation execution. The execution is
//! Sans-IO: [`FederationExecution::process`] applies one request atomically
//! and returns the synchronous response plus every callback it produced. The
//! caller routes the callbacks; nothing here blocks or performs I/O beyond
//! the synchronous [`SaveStore`].

use meridian_core::{FederateHandle, LogicalTime, ObjectModel, RtiError};

use crate::{
    callback::{Callback, Delivery, RestoreFailureReason, SaveFailureReason},
    config::FederationConfig,
    ownership::OwnershipManager,
    registry::FederateRegistry,
    request::{Outcome, Request, ResignAction, Response},
    save_restore::{BarrierFailure, FederationSnapshot, Resolution, SaveRestoreCoordinator},
    storage::SaveStore,
    sync_point::SyncPointCoordinator,
    time_manager::{OutgoingMessage, QueuedMessage, TimeManager},
};

/// One federation execution.
pub struct FederationExecution<T: LogicalTime, S: SaveStore> {
    name: String,
    object_model: ObjectModel,
    config: FederationConfig,
    store: S,
    registry: FederateRegistry,
    time: TimeManager<T>,
    ownership: OwnershipManager,
    sync_points: SyncPointCoordinator,
    save_restore: SaveRestoreCoordinator,
    /// Snapshot loaded by an accepted restore request
    pending_restore: Option<FederationSnapshot>,
}

impl<T: LogicalTime, S: SaveStore> FederationExecution<T, S> {
    /// Create an empty federation execution.
    pub fn new(
        name: impl Into<String>,
        object_model: ObjectModel,
        config: FederationConfig,
        store: S,
    ) -> Self {
        let time = TimeManager::new(config.require_positive_lookahead);
        Self {
            name: name.into(),
            object_model,
            config,
            store,
            registry: FederateRegistry::new(),
            time,
            ownership: OwnershipManager::new(),
            sync_points: SyncPointCoordinator::new(),
            save_restore: SaveRestoreCoordinator::new(),
            pending_restore: None,
        }
    }

    /// Federation execution name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration.
    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    /// Object model.
    pub fn object_model(&self) -> &ObjectModel {
        &self.object_model
    }

    /// Joined federates.
    pub fn registry(&self) -> &FederateRegistry {
        &self.registry
    }

    /// Time management state.
    pub fn time(&self) -> &TimeManager<T> {
        &self.time
    }

    /// Ownership table.
    pub fn ownership(&self) -> &OwnershipManager {
        &self.ownership
    }

    /// Outstanding synchronization points.
    pub fn sync_points(&self) -> &SyncPointCoordinator {
        &self.sync_points
    }

    /// Save and restore barriers.
    pub fn save_restore(&self) -> &SaveRestoreCoordinator {
        &self.save_restore
    }

    /// Snapshot store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Joined federates in join order.
    pub fn joined(&self) -> Vec<FederateHandle> {
        self.registry.handles().collect()
    }

    /// `joinFederationExecution`.
    ///
    /// Returns the new handle and announcements of outstanding
    /// federation-wide synchronization points.
    pub fn join(
        &mut self,
        federate_type: impl Into<String>,
        federate_name: impl Into<String>,
    ) -> Result<(FederateHandle, Vec<Delivery<T>>), RtiError> {
        if self.save_restore.save_in_progress() {
            return Err(RtiError::SaveInProgress);
        }
        if self.save_restore.restore_in_progress() {
            return Err(RtiError::RestoreInProgress);
        }
        if self.registry.len() >= self.config.max_federates {
            return Err(RtiError::FederationFull { max: self.config.max_federates });
        }

        let federate_name = federate_name.into();
        let federate = self.registry.register(federate_name.clone(), federate_type)?;
        self.time.add_federate(federate);
        let out = self.sync_points.federate_joined(federate);

        tracing::info!(
            federation = %self.name,
            federate = %federate,
            name = %federate_name,
            "Federate joined"
        );
        Ok((federate, out))
    }

    /// Apply one request from a joined federate.
    pub fn process(
        &mut self,
        federate: FederateHandle,
        request: Request<T>,
    ) -> Result<Outcome<T>, RtiError> {
        self.registry.require(federate)?;

        if !request.allowed_during_save_or_restore() {
            if self.save_restore.save_in_progress() {
                return Err(RtiError::SaveInProgress);
            }
            if self.save_restore.restore_in_progress() {
                return Err(RtiError::RestoreInProgress);
            }
        }

        tracing::trace!(federate = %federate, service = request.name(), "Processing request");

        match request {
            Request::Resign(action) => self.resign(federate, action),

            Request::EnableTimeRegulation { lookahead } => {
                Ok(Outcome::done(self.time.enable_time_regulation(federate, lookahead)?))
            },
            Request::DisableTimeRegulation => {
                Ok(Outcome::done(self.time.disable_time_regulation(federate)?))
            },
            Request::EnableTimeConstrained => {
                Ok(Outcome::done(self.time.enable_time_constrained(federate)?))
            },
            Request::DisableTimeConstrained => {
                Ok(Outcome::done(self.time.disable_time_constrained(federate)?))
            },
            Request::ModifyLookahead { lookahead } => {
                Ok(Outcome::done(self.time.modify_lookahead(federate, lookahead)?))
            },
            Request::TimeAdvance { kind, time } => {
                Ok(Outcome::done(self.time.request_advance(federate, kind, time)?))
            },
            Request::QueryGalt => Ok(Outcome::reply(Response::Galt(self.time.galt_for(federate)))),
            Request::QueryLits => Ok(Outcome::reply(Response::Lits(self.time.query_lits(federate)?))),
            Request::QueryLogicalTime => {
                Ok(Outcome::reply(Response::LogicalTime(self.time.query_logical_time(federate)?)))
            },
            Request::QueryLookahead => {
                Ok(Outcome::reply(Response::Lookahead(self.time.query_lookahead(federate)?)))
            },

            Request::SubscribeInteractionClass(class) => {
                self.object_model.require_interaction_class(class)?;
                self.registry.subscribe(federate, class);
                Ok(Outcome::done(Vec::new()))
            },
            Request::UnsubscribeInteractionClass(class) => {
                self.object_model.require_interaction_class(class)?;
                self.registry.unsubscribe(federate, class);
                Ok(Outcome::done(Vec::new()))
            },
            Request::SendInteraction { class, parameters, tag, time } => {
                self.object_model.require_interaction_class(class)?;
                if let Some(time) = time {
                    self.time.check_send_time(federate, time)?;
                }
                let receivers = self.registry.subscribers(class);
                let outgoing = OutgoingMessage {
                    message: QueuedMessage { class, parameters, tag, sender: federate },
                    time,
                };
                Ok(Outcome::done(self.time.route_message(federate, &receivers, outgoing)))
            },

            Request::RegisterObjectInstance { class } => {
                let attributes = self.object_model.instance_attributes(class)?;
                let object = self.ownership.register_object(federate, class, attributes)?;
                Ok(Outcome::reply(Response::ObjectRegistered(object)))
            },
            Request::DeleteObjectInstance { object, tag } => {
                let others = self.registry.others(federate);
                Ok(Outcome::done(self.ownership.delete_object(federate, object, tag, &others)?))
            },
            Request::QueryAttributeOwnership { object, attribute } => {
                Ok(Outcome::reply(Response::Owner(self.ownership.query_owner(object, attribute)?)))
            },
            Request::UnconditionalDivest { object, attributes } => Ok(Outcome::done(
                self.ownership.unconditional_divest(federate, object, &attributes)?,
            )),
            Request::NegotiatedDivest { object, attributes, tag } => {
                let others = self.registry.others(federate);
                Ok(Outcome::done(
                    self.ownership.negotiated_divest(federate, object, &attributes, tag, &others)?,
                ))
            },
            Request::ConfirmDivestiture { object, attributes } => Ok(Outcome::done(
                self.ownership.confirm_divestiture(federate, object, &attributes)?,
            )),
            Request::CancelNegotiatedDivestiture { object, attributes } => {
                self.ownership.cancel_negotiated_divestiture(federate, object, &attributes)?;
                Ok(Outcome::done(Vec::new()))
            },
            Request::Acquire { object, attributes, tag } => {
                let (result, deliveries) =
                    self.ownership.acquire(federate, object, &attributes, tag)?;
                Ok(Outcome {
                    response: Response::Acquisition {
                        acquired: result.acquired,
                        pending: result.pending,
                    },
                    deliveries,
                })
            },
            Request::AcquireIfAvailable { object, attributes } => {
                let (result, deliveries) =
                    self.ownership.acquire_if_available(federate, object, &attributes)?;
                Ok(Outcome {
                    response: Response::Acquisition {
                        acquired: result.acquired,
                        pending: result.pending,
                    },
                    deliveries,
                })
            },
            Request::CancelAcquisition { object, attributes } => Ok(Outcome::done(
                self.ownership.cancel_acquisition(federate, object, &attributes)?,
            )),

            Request::RegisterSynchronizationPoint { label, tag, participants } => {
                let joined = self.joined();
                Ok(Outcome::done(
                    self.sync_points.register(federate, label, tag, participants, &joined),
                ))
            },
            Request::SynchronizationPointAchieved { label, success } => {
                Ok(Outcome::done(self.sync_points.achieved(federate, &label, success)?))
            },

            Request::RequestFederationSave { label } => {
                let joined = self.joined();
                Ok(Outcome::done(self.save_restore.request_save(label, &joined)?))
            },
            Request::FederateSaveBegun => {
                self.save_restore.save_begun(federate)?;
                Ok(Outcome::done(Vec::new()))
            },
            Request::FederateSaveComplete => self.report_save(federate, true),
            Request::FederateSaveNotComplete => self.report_save(federate, false),
            Request::QueryFederationSaveStatus => {
                let joined = self.joined();
                Ok(Outcome::reply(Response::SaveStatus(self.save_restore.save_status(&joined))))
            },
            Request::RequestFederationRestore { label } => {
                Ok(Outcome::done(self.request_restore(federate, label)?))
            },
            Request::FederateRestoreBegun => {
                self.save_restore.restore_begun(federate)?;
                Ok(Outcome::done(Vec::new()))
            },
            Request::FederateRestoreComplete => self.report_restore(federate, true),
            Request::FederateRestoreNotComplete => self.report_restore(federate, false),
            Request::QueryFederationRestoreStatus => {
                let joined = self.joined();
                Ok(Outcome::reply(Response::RestoreStatus(
                    self.save_restore.restore_status(&joined),
                )))
            },
        }
    }

    /// `resignFederationExecution`.
    ///
    /// Fails with `FederateOwnsAttributes`, changing nothing, if `action`
    /// would leave the federate owning attributes.
    fn resign(
        &mut self,
        federate: FederateHandle,
        action: ResignAction,
    ) -> Result<Outcome<T>, RtiError> {
        let retains = if action.divests() {
            false
        } else if action.deletes_objects() {
            self.ownership.owns_undeletable(federate)
        } else {
            self.ownership.owns_any(federate)
        };
        if retains {
            return Err(RtiError::FederateOwnsAttributes);
        }

        let out = self.release(federate, action);
        tracing::info!(
            federation = %self.name,
            federate = %federate,
            ?action,
            "Federate resigned"
        );
        Ok(Outcome { response: Response::Resigned, deliveries: out })
    }

    /// Remove a federate that vanished without resigning, applying the
    /// configured automatic resign action and divesting whatever remains.
    pub fn disconnect(&mut self, federate: FederateHandle) -> Vec<Delivery<T>> {
        if !self.registry.contains(federate) {
            return Vec::new();
        }

        let action = self.config.automatic_resign_action;
        tracing::warn!(
            federation = %self.name,
            federate = %federate,
            ?action,
            "Federate disconnected without resigning"
        );

        let mut out = self.release(federate, action);
        out.extend(self.ownership.divest_all(federate));
        out
    }

    /// Dispose of the federate's attributes per `action`, then drop it from
    /// every pending set.
    fn release(&mut self, federate: FederateHandle, action: ResignAction) -> Vec<Delivery<T>> {
        let others = self.registry.others(federate);

        self.ownership.withdraw_acquisitions(federate);
        let mut out = Vec::new();
        if action.deletes_objects() {
            out.extend(self.ownership.delete_owned_objects(federate, &others));
        }
        if action.divests() {
            out.extend(self.ownership.divest_all(federate));
        }

        self.registry.unregister(federate);
        out.extend(self.sync_points.federate_resigned(federate));

        let (save, restore) = self.save_restore.federate_resigned(federate);
        if let Some(resolution) = save {
            out.extend(self.finish_save(resolution));
        }
        if let Some(resolution) = restore {
            out.extend(self.finish_restore(resolution));
        }

        out.extend(self.time.remove_federate(federate));
        out
    }

    fn report_save(&mut self, federate: FederateHandle, success: bool) -> Result<Outcome<T>, RtiError> {
        let resolution = self.save_restore.save_report(federate, success)?;
        Ok(Outcome::done(resolution.map(|r| self.finish_save(r)).unwrap_or_default()))
    }

    fn report_restore(
        &mut self,
        federate: FederateHandle,
        success: bool,
    ) -> Result<Outcome<T>, RtiError> {
        let resolution = self.save_restore.restore_report(federate, success)?;
        Ok(Outcome::done(resolution.map(|r| self.finish_restore(r)).unwrap_or_default()))
    }

    /// Persist the coordinator snapshot for a successful save and tell the
    /// participants how it went.
    fn finish_save(&mut self, resolution: Resolution) -> Vec<Delivery<T>> {
        let callback = match resolution.failure {
            Some(BarrierFailure::Reported) => {
                Callback::FederationNotSaved { reason: SaveFailureReason::FederateReportedFailure }
            },
            Some(BarrierFailure::Resigned) => {
                Callback::FederationNotSaved { reason: SaveFailureReason::FederateResigned }
            },
            None => match self.persist(&resolution.label) {
                Ok(()) => {
                    tracing::info!(federation = %self.name, label = %resolution.label, "Federation saved");
                    Callback::FederationSaved
                },
                Err(err) => {
                    tracing::warn!(
                        federation = %self.name,
                        label = %resolution.label,
                        error = %err,
                        "Failed to store federation snapshot"
                    );
                    Callback::FederationNotSaved { reason: SaveFailureReason::RtiUnableToSave }
                },
            },
        };

        if resolution.failure.is_some() {
            tracing::info!(federation = %self.name, label = %resolution.label, "Federation not saved");
        }
        broadcast(&resolution.participants, &callback)
    }

    fn persist(&self, label: &str) -> Result<(), crate::storage::StorageError> {
        let snapshot = FederationSnapshot {
            federation: self.name.clone(),
            time: self.time.snapshot(),
            ownership: self.ownership.snapshot(),
        };
        self.store.store_snapshot(&self.name, label, &snapshot.encode()?)
    }

    /// Validate a restore request against the stored snapshot. Rejections are
    /// callbacks to the requester.
    fn request_restore(
        &mut self,
        requester: FederateHandle,
        label: String,
    ) -> Result<Vec<Delivery<T>>, RtiError> {
        let rejected = |label: String| {
            vec![Delivery::new(requester, Callback::RequestFederationRestoreFailed { label })]
        };

        let snapshot = match self.store.load_snapshot(&self.name, &label) {
            Ok(Some(bytes)) => FederationSnapshot::decode(&bytes),
            Ok(None) => {
                tracing::debug!(federation = %self.name, label = %label, "No snapshot for restore");
                return Ok(rejected(label));
            },
            Err(err) => Err(err),
        };
        let snapshot = match snapshot {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(
                    federation = %self.name,
                    label = %label,
                    error = %err,
                    "Failed to load federation snapshot"
                );
                return Ok(rejected(label));
            },
        };

        if let Some(missing) =
            snapshot.time.iter().find(|entry| !self.registry.contains(entry.federate))
        {
            tracing::debug!(
                federation = %self.name,
                label = %label,
                federate = %missing.federate,
                "Saved federate not joined"
            );
            return Ok(rejected(label));
        }

        let joined = self.joined();
        let out = self.save_restore.request_restore(requester, label, &joined)?;
        self.pending_restore = Some(snapshot);
        Ok(out)
    }

    /// Apply the pending snapshot for a successful restore and tell the
    /// participants how it went.
    fn finish_restore(&mut self, resolution: Resolution) -> Vec<Delivery<T>> {
        let snapshot = self.pending_restore.take();

        let callback = match (resolution.failure, snapshot) {
            (Some(BarrierFailure::Reported), _) => Callback::FederationNotRestored {
                reason: RestoreFailureReason::FederateReportedFailure,
            },
            (Some(BarrierFailure::Resigned), _) => {
                Callback::FederationNotRestored { reason: RestoreFailureReason::FederateResigned }
            },
            (None, None) => Callback::FederationNotRestored {
                reason: RestoreFailureReason::RtiUnableToRestore,
            },
            (None, Some(snapshot)) => match self.time.restore(&snapshot.time) {
                Ok(()) => {
                    self.ownership.restore(&snapshot.ownership);
                    tracing::info!(
                        federation = %self.name,
                        label = %resolution.label,
                        "Federation restored"
                    );
                    Callback::FederationRestored
                },
                Err(err) => {
                    tracing::warn!(
                        federation = %self.name,
                        label = %resolution.label,
                        error = %err,
                        "Failed to apply federation snapshot"
                    );
                    Callback::FederationNotRestored {
                        reason: RestoreFailureReason::RtiUnableToRestore,
                    }
                },
            },
        };
        broadcast(&resolution.participants, &callback)
    }
}

fn broadcast<T: LogicalTime>(
    federates: &[FederateHandle],
    callback: &Callback<T>,
) -> Vec<Delivery<T>> {
    federates.iter().map(|federate| Delivery::new(*federate, callback.clone())).collect()
}

impl<T: LogicalTime, S: SaveStore> std::fmt::Debug for FederationExecution<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederationExecution")
            .field("name", &self.name)
            .field("federates", &self.registry.len())
            .field("objects", &self.ownership.objects().count())
            .field("save_in_progress", &self.save_restore.save_in_progress())
            .field("restore_in_progress", &self.save_restore.restore_in_progress())
            .finish_non_exhaustive()
    }
}
