//! Requests a joined federate can issue, and their synchronous responses.

use std::collections::BTreeSet;

use bytes::Bytes;
use meridian_core::{
    AttributeHandle, FederateHandle, InteractionClassHandle, LogicalTime, ObjectClassHandle,
    ObjectInstanceHandle,
};

use crate::{
    callback::Delivery,
    save_restore::{RestoreStatus, SaveStatus},
};

/// Attribute disposal when a federate resigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResignAction {
    /// Divest every owned attribute.
    UnconditionallyDivestAttributes,
    /// Delete every object whose privilege-to-delete the federate owns.
    DeleteObjects,
    /// Withdraw pending acquisitions only.
    CancelPendingOwnershipAcquisitions,
    /// Delete objects, then divest what remains.
    DeleteObjectsThenDivest,
    /// Withdraw acquisitions, delete objects, then divest what remains.
    #[default]
    CancelThenDeleteThenDivest,
    /// Leave ownership untouched.
    NoAction,
}

impl ResignAction {
    /// Whether the action deletes objects.
    pub fn deletes_objects(self) -> bool {
        matches!(
            self,
            Self::DeleteObjects | Self::DeleteObjectsThenDivest | Self::CancelThenDeleteThenDivest
        )
    }

    /// Whether the action divests remaining attributes.
    pub fn divests(self) -> bool {
        matches!(
            self,
            Self::UnconditionallyDivestAttributes
                | Self::DeleteObjectsThenDivest
                | Self::CancelThenDeleteThenDivest
        )
    }
}

/// Kind of outstanding time advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdvanceKind {
    /// No advance outstanding.
    #[default]
    None,
    /// `timeAdvanceRequest`
    TimeAdvance,
    /// `timeAdvanceRequestAvailable`
    TimeAdvanceAvailable,
    /// `nextMessageRequest`
    NextMessage,
    /// `nextMessageRequestAvailable`
    NextMessageAvailable,
    /// `flushQueueRequest`
    FlushQueue,
}

impl AdvanceKind {
    /// Available variants may still receive messages at the granted time.
    pub fn is_available(self) -> bool {
        matches!(self, Self::TimeAdvanceAvailable | Self::NextMessageAvailable)
    }

    /// Next-message variants advance only as far as the next queued message.
    pub fn is_next_message(self) -> bool {
        matches!(self, Self::NextMessage | Self::NextMessageAvailable)
    }
}

/// Request from a joined federate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<T: LogicalTime> {
    /// Leave the federation execution.
    Resign(ResignAction),

    /// Become time regulating with the given lookahead.
    EnableTimeRegulation {
        /// Lookahead interval
        lookahead: T::Interval,
    },
    /// Stop regulating.
    DisableTimeRegulation,
    /// Become time constrained (asynchronous).
    EnableTimeConstrained,
    /// Stop being constrained.
    DisableTimeConstrained,
    /// Change lookahead.
    ModifyLookahead {
        /// New lookahead interval
        lookahead: T::Interval,
    },
    /// Advance the clock for `kind` to `time`.
    TimeAdvance {
        /// Advance variant; never [`AdvanceKind::None`]
        kind: AdvanceKind,
        /// Requested time
        time: T,
    },
    /// Federate's GALT.
    QueryGalt,
    /// Federate's LITS, bounded by its GALT.
    QueryLits,
    /// Federate's logical time.
    QueryLogicalTime,
    /// Federate's lookahead.
    QueryLookahead,

    /// Receive interactions of `class`.
    SubscribeInteractionClass(InteractionClassHandle),
    /// Stop receiving interactions of `class`.
    UnsubscribeInteractionClass(InteractionClassHandle),
    /// Send an interaction to the other subscribers.
    SendInteraction {
        /// Interaction class
        class: InteractionClassHandle,
        /// Encoded parameter values
        parameters: Bytes,
        /// User-supplied tag
        tag: Bytes,
        /// Timestamp for timestamp-ordered delivery
        time: Option<T>,
    },

    /// Create an object instance owned by the caller.
    RegisterObjectInstance {
        /// Object class
        class: ObjectClassHandle,
    },
    /// Delete an object instance.
    DeleteObjectInstance {
        /// Instance to delete
        object: ObjectInstanceHandle,
        /// Tag forwarded to the other federates
        tag: Bytes,
    },
    /// Current owner of one attribute.
    QueryAttributeOwnership {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Attribute
        attribute: AttributeHandle,
    },
    /// Give up attributes immediately.
    UnconditionalDivest {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Attributes to divest
        attributes: BTreeSet<AttributeHandle>,
    },
    /// Offer attributes to other federates.
    NegotiatedDivest {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Attributes to divest
        attributes: BTreeSet<AttributeHandle>,
        /// Tag forwarded with the offer
        tag: Bytes,
    },
    /// Complete a negotiated divestiture.
    ConfirmDivestiture {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Attributes to release
        attributes: BTreeSet<AttributeHandle>,
    },
    /// Withdraw a negotiated divestiture.
    CancelNegotiatedDivestiture {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Attributes to keep
        attributes: BTreeSet<AttributeHandle>,
    },
    /// Acquire attributes, queueing behind current owners.
    Acquire {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Attributes to acquire
        attributes: BTreeSet<AttributeHandle>,
        /// Tag forwarded to owners
        tag: Bytes,
    },
    /// Acquire attributes only if nobody holds them.
    AcquireIfAvailable {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Attributes to acquire
        attributes: BTreeSet<AttributeHandle>,
    },
    /// Withdraw queued acquisitions.
    CancelAcquisition {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Attributes no longer wanted
        attributes: BTreeSet<AttributeHandle>,
    },

    /// Register a synchronization point.
    RegisterSynchronizationPoint {
        /// Unique label
        label: String,
        /// Tag forwarded in announcements
        tag: Bytes,
        /// Participants; all joined federates when `None`
        participants: Option<BTreeSet<FederateHandle>>,
    },
    /// Report having reached a synchronization point.
    SynchronizationPointAchieved {
        /// Point label
        label: String,
        /// `false` records the caller as failed
        success: bool,
    },

    /// Start a federation save.
    RequestFederationSave {
        /// Save label
        label: String,
    },
    /// Caller started saving.
    FederateSaveBegun,
    /// Caller finished saving.
    FederateSaveComplete,
    /// Caller failed to save.
    FederateSaveNotComplete,
    /// Per-federate save status.
    QueryFederationSaveStatus,
    /// Start a federation restore.
    RequestFederationRestore {
        /// Label of a completed save
        label: String,
    },
    /// Caller started restoring.
    FederateRestoreBegun,
    /// Caller finished restoring.
    FederateRestoreComplete,
    /// Caller failed to restore.
    FederateRestoreNotComplete,
    /// Per-federate restore status.
    QueryFederationRestoreStatus,
}

impl<T: LogicalTime> Request<T> {
    /// Short service name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resign(_) => "resignFederationExecution",
            Self::EnableTimeRegulation { .. } => "enableTimeRegulation",
            Self::DisableTimeRegulation => "disableTimeRegulation",
            Self::EnableTimeConstrained => "enableTimeConstrained",
            Self::DisableTimeConstrained => "disableTimeConstrained",
            Self::ModifyLookahead { .. } => "modifyLookahead",
            Self::TimeAdvance { kind, .. } => match kind {
                AdvanceKind::TimeAdvance | AdvanceKind::None => "timeAdvanceRequest",
                AdvanceKind::TimeAdvanceAvailable => "timeAdvanceRequestAvailable",
                AdvanceKind::NextMessage => "nextMessageRequest",
                AdvanceKind::NextMessageAvailable => "nextMessageRequestAvailable",
                AdvanceKind::FlushQueue => "flushQueueRequest",
            },
            Self::QueryGalt => "queryGALT",
            Self::QueryLits => "queryLITS",
            Self::QueryLogicalTime => "queryLogicalTime",
            Self::QueryLookahead => "queryLookahead",
            Self::SubscribeInteractionClass(_) => "subscribeInteractionClass",
            Self::UnsubscribeInteractionClass(_) => "unsubscribeInteractionClass",
            Self::SendInteraction { .. } => "sendInteraction",
            Self::RegisterObjectInstance { .. } => "registerObjectInstance",
            Self::DeleteObjectInstance { .. } => "deleteObjectInstance",
            Self::QueryAttributeOwnership { .. } => "queryAttributeOwnership",
            Self::UnconditionalDivest { .. } => "unconditionalAttributeOwnershipDivestiture",
            Self::NegotiatedDivest { .. } => "negotiatedAttributeOwnershipDivestiture",
            Self::ConfirmDivestiture { .. } => "confirmDivestiture",
            Self::CancelNegotiatedDivestiture { .. } => {
                "cancelNegotiatedAttributeOwnershipDivestiture"
            },
            Self::Acquire { .. } => "attributeOwnershipAcquisition",
            Self::AcquireIfAvailable { .. } => "attributeOwnershipAcquisitionIfAvailable",
            Self::CancelAcquisition { .. } => "cancelAttributeOwnershipAcquisition",
            Self::RegisterSynchronizationPoint { .. } => "registerFederationSynchronizationPoint",
            Self::SynchronizationPointAchieved { .. } => "synchronizationPointAchieved",
            Self::RequestFederationSave { .. } => "requestFederationSave",
            Self::FederateSaveBegun => "federateSaveBegun",
            Self::FederateSaveComplete => "federateSaveComplete",
            Self::FederateSaveNotComplete => "federateSaveNotComplete",
            Self::QueryFederationSaveStatus => "queryFederationSaveStatus",
            Self::RequestFederationRestore { .. } => "requestFederationRestore",
            Self::FederateRestoreBegun => "federateRestoreBegun",
            Self::FederateRestoreComplete => "federateRestoreComplete",
            Self::FederateRestoreNotComplete => "federateRestoreNotComplete",
            Self::QueryFederationRestoreStatus => "queryFederationRestoreStatus",
        }
    }

    /// Requests still accepted while a save or restore is in progress.
    pub(crate) fn allowed_during_save_or_restore(&self) -> bool {
        matches!(
            self,
            Self::Resign(_)
                | Self::QueryGalt
                | Self::QueryLits
                | Self::QueryLogicalTime
                | Self::QueryLookahead
                | Self::QueryAttributeOwnership { .. }
                | Self::FederateSaveBegun
                | Self::FederateSaveComplete
                | Self::FederateSaveNotComplete
                | Self::QueryFederationSaveStatus
                | Self::FederateRestoreBegun
                | Self::FederateRestoreComplete
                | Self::FederateRestoreNotComplete
                | Self::QueryFederationRestoreStatus
        )
    }
}

/// Synchronous result of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response<T: LogicalTime> {
    /// Request accepted; effects arrive as callbacks.
    Done,
    /// Federate left the federation execution.
    Resigned,
    /// GALT; `None` when undefined.
    Galt(Option<T>),
    /// LITS bounded by GALT; `None` when undefined.
    Lits(Option<T>),
    /// Logical time.
    LogicalTime(T),
    /// Lookahead.
    Lookahead(T::Interval),
    /// New object instance.
    ObjectRegistered(ObjectInstanceHandle),
    /// Attribute owner; `None` when unowned.
    Owner(Option<FederateHandle>),
    /// Outcome of an acquisition.
    Acquisition {
        /// Attributes now owned by the caller
        acquired: BTreeSet<AttributeHandle>,
        /// Attributes the caller is queued for, or could not take
        pending: BTreeSet<AttributeHandle>,
    },
    /// Per-federate save status in join order.
    SaveStatus(Vec<(FederateHandle, SaveStatus)>),
    /// Per-federate restore status in join order.
    RestoreStatus(Vec<(FederateHandle, RestoreStatus)>),
}

/// Response plus the callbacks the request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T: LogicalTime> {
    /// Synchronous response
    pub response: Response<T>,
    /// Callbacks, in delivery order
    pub deliveries: Vec<Delivery<T>>,
}

impl<T: LogicalTime> Outcome<T> {
    /// `Done` with the given callbacks.
    pub fn done(deliveries: Vec<Delivery<T>>) -> Self {
        Self { response: Response::Done, deliveries }
    }

    /// A response without callbacks.
    pub fn reply(response: Response<T>) -> Self {
        Self { response, deliveries: Vec::new() }
    }
}
