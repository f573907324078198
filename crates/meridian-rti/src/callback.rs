//! Callbacks delivered to federates.
//!
//! Every observable effect of a request on *other* federates (and every
//! asynchronous outcome for the requester) is a [`Callback`]. The coordinator
//! returns them as [`Delivery`] values; the runtime routes each one to the
//! addressed federate's outbox in the order produced.

use std::collections::BTreeSet;

use bytes::Bytes;
use meridian_core::{
    AttributeHandle, FederateHandle, InteractionClassHandle, LogicalTime, ObjectInstanceHandle,
};

/// How a received message was ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderType {
    /// Delivered in arrival order.
    Receive,
    /// Delivered in timestamp order, gated by the time advance protocol.
    Timestamp,
}

/// Why a synchronization point registration failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SynchronizationPointFailureReason {
    /// Label is already outstanding.
    LabelNotUnique,
    /// A named participant is not joined.
    SynchronizationSetMemberNotJoined,
}

/// Why a federation save failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveFailureReason {
    /// The coordinator could not persist its own state.
    RtiUnableToSave,
    /// A federate reported `federateSaveNotComplete`.
    FederateReportedFailure,
    /// A federate resigned while the save was in progress.
    FederateResigned,
}

/// Why a federation restore failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestoreFailureReason {
    /// The coordinator could not restore its own state.
    RtiUnableToRestore,
    /// A federate reported `federateRestoreNotComplete`.
    FederateReportedFailure,
    /// A federate resigned while the restore was in progress.
    FederateResigned,
}

/// Federate-facing callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback<T: LogicalTime> {
    /// Time regulation is enabled at `time`.
    TimeRegulationEnabled {
        /// Federate's logical time after enabling
        time: T,
    },
    /// Time constrained is enabled at `time`.
    TimeConstrainedEnabled {
        /// Federate's logical time
        time: T,
    },
    /// Outstanding time advance completed.
    TimeAdvanceGrant {
        /// Granted logical time
        time: T,
    },
    /// Interaction delivered to a subscriber.
    ReceiveInteraction {
        /// Interaction class
        class: InteractionClassHandle,
        /// Encoded parameter values
        parameters: Bytes,
        /// User-supplied tag
        tag: Bytes,
        /// Sending federate
        sender: FederateHandle,
        /// Timestamp, if sent with one
        time: Option<T>,
        /// Ordering the message was delivered under
        order: OrderType,
    },

    /// Attributes now owned by the recipient.
    AttributeOwnershipAcquisitionNotification {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Acquired attributes
        attributes: BTreeSet<AttributeHandle>,
        /// Tag supplied with the acquisition request
        tag: Bytes,
    },
    /// Negotiated divestiture completed; the recipient no longer owns these.
    AttributeOwnershipDivestitureNotification {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Divested attributes
        attributes: BTreeSet<AttributeHandle>,
    },
    /// Another federate wants attributes the recipient owns.
    RequestAttributeOwnershipRelease {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Requested attributes
        attributes: BTreeSet<AttributeHandle>,
        /// Requester's tag
        tag: Bytes,
    },
    /// An acquirer is waiting on attributes the recipient is divesting.
    RequestDivestitureConfirmation {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Attributes awaiting confirmation
        attributes: BTreeSet<AttributeHandle>,
    },
    /// Owner offers attributes for negotiated divestiture.
    RequestAttributeOwnershipAssumption {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Offered attributes
        attributes: BTreeSet<AttributeHandle>,
        /// Divesting owner's tag
        tag: Bytes,
    },
    /// `acquireIfAvailable` could not take these attributes.
    AttributeOwnershipUnavailable {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Unavailable attributes
        attributes: BTreeSet<AttributeHandle>,
    },
    /// Pending acquisitions withdrawn.
    ConfirmAttributeOwnershipAcquisitionCancellation {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Attributes no longer requested
        attributes: BTreeSet<AttributeHandle>,
    },
    /// Object instance deleted.
    RemoveObjectInstance {
        /// Deleted instance
        object: ObjectInstanceHandle,
        /// Deleting federate's tag
        tag: Bytes,
    },

    /// Registration accepted.
    SynchronizationPointRegistrationSucceeded {
        /// Point label
        label: String,
    },
    /// Registration rejected.
    SynchronizationPointRegistrationFailed {
        /// Point label
        label: String,
        /// Cause
        reason: SynchronizationPointFailureReason,
    },
    /// Recipient participates in a synchronization point.
    AnnounceSynchronizationPoint {
        /// Point label
        label: String,
        /// Registrant's tag
        tag: Bytes,
    },
    /// Every participant has achieved the point.
    FederationSynchronized {
        /// Point label
        label: String,
        /// Participants that reported failure or resigned
        failed: BTreeSet<FederateHandle>,
    },

    /// Recipient must save its state.
    InitiateFederateSave {
        /// Save label
        label: String,
    },
    /// Every instructed federate saved successfully.
    FederationSaved,
    /// The save failed.
    FederationNotSaved {
        /// Cause
        reason: SaveFailureReason,
    },
    /// The restore request was accepted.
    RequestFederationRestoreSucceeded {
        /// Restore label
        label: String,
    },
    /// The restore request was rejected.
    RequestFederationRestoreFailed {
        /// Restore label
        label: String,
    },
    /// A federation restore is starting.
    FederationRestoreBegun,
    /// Recipient must restore its state.
    InitiateFederateRestore {
        /// Restore label
        label: String,
        /// Handle the recipient had when the state was saved
        federate: FederateHandle,
    },
    /// Every instructed federate restored successfully.
    FederationRestored,
    /// The restore failed.
    FederationNotRestored {
        /// Cause
        reason: RestoreFailureReason,
    },
}

/// A callback addressed to one federate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery<T: LogicalTime> {
    /// Recipient
    pub federate: FederateHandle,
    /// Callback to deliver
    pub callback: Callback<T>,
}

impl<T: LogicalTime> Delivery<T> {
    /// Address `callback` to `federate`.
    pub fn new(federate: FederateHandle, callback: Callback<T>) -> Self {
        Self { federate, callback }
    }
}
