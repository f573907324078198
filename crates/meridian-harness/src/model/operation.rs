//! Operations for model-based testing.
//!
//! Operations represent requests federates can make. They are generated
//! randomly by proptest or decoded from fuzz input, then applied to a
//! [`SimFederation`](crate::SimFederation).

use arbitrary::Arbitrary;
use meridian_core::RtiError;
use meridian_rti::{AdvanceKind, ResignAction};

/// Federate slot (taken modulo [`FEDERATE_SLOTS`](crate::FEDERATE_SLOTS)).
pub type FederateSlot = u8;

/// Operations that can be applied to a simulated federation.
///
/// Object and attribute indices are taken modulo what exists, so every
/// generated value names something once any object is registered.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Join into an empty slot.
    Join {
        /// Slot to fill.
        federate: FederateSlot,
    },
    /// Resign with the given action.
    Resign {
        /// Resigning federate.
        federate: FederateSlot,
        /// Disposal of owned attributes.
        action: ResignChoice,
    },
    /// Vanish without resigning.
    Crash {
        /// Crashing federate.
        federate: FederateSlot,
    },

    /// Enable time regulation.
    EnableRegulation {
        /// Federate.
        federate: FederateSlot,
        /// Lookahead (kept small).
        lookahead: u8,
    },
    /// Disable time regulation.
    DisableRegulation {
        /// Federate.
        federate: FederateSlot,
    },
    /// Enable time constrained.
    EnableConstrained {
        /// Federate.
        federate: FederateSlot,
    },
    /// Disable time constrained.
    DisableConstrained {
        /// Federate.
        federate: FederateSlot,
    },
    /// Change lookahead.
    ModifyLookahead {
        /// Federate.
        federate: FederateSlot,
        /// New lookahead.
        lookahead: u8,
    },
    /// Request an advance relative to the current time.
    Advance {
        /// Federate.
        federate: FederateSlot,
        /// Advance service.
        kind: AdvanceChoice,
        /// Distance past the current time.
        delta: u8,
    },
    /// Subscribe to the simulation's interaction class.
    Subscribe {
        /// Federate.
        federate: FederateSlot,
    },
    /// Send an interaction, optionally timestamped relative to LOTS.
    Send {
        /// Sender.
        federate: FederateSlot,
        /// Distance past the sender's LOTS.
        delta: u8,
        /// Send with a timestamp.
        timestamped: bool,
    },

    /// Register an object instance.
    RegisterObject {
        /// Owner.
        federate: FederateSlot,
    },
    /// Delete an object instance.
    DeleteObject {
        /// Deleting federate.
        federate: FederateSlot,
        /// Object index.
        object: u8,
    },
    /// `attributeOwnershipAcquisition` of one attribute.
    Acquire {
        /// Acquirer.
        federate: FederateSlot,
        /// Object index.
        object: u8,
        /// Attribute index.
        attribute: u8,
    },
    /// `attributeOwnershipAcquisitionIfAvailable` of one attribute.
    AcquireIfAvailable {
        /// Acquirer.
        federate: FederateSlot,
        /// Object index.
        object: u8,
        /// Attribute index.
        attribute: u8,
    },
    /// Withdraw a pending acquisition.
    CancelAcquisition {
        /// Acquirer.
        federate: FederateSlot,
        /// Object index.
        object: u8,
        /// Attribute index.
        attribute: u8,
    },
    /// `unconditionalAttributeOwnershipDivestiture` of one attribute.
    Divest {
        /// Owner.
        federate: FederateSlot,
        /// Object index.
        object: u8,
        /// Attribute index.
        attribute: u8,
    },
    /// `negotiatedAttributeOwnershipDivestiture` of one attribute.
    NegotiatedDivest {
        /// Owner.
        federate: FederateSlot,
        /// Object index.
        object: u8,
        /// Attribute index.
        attribute: u8,
    },
    /// `confirmDivestiture` of one attribute.
    ConfirmDivestiture {
        /// Owner.
        federate: FederateSlot,
        /// Object index.
        object: u8,
        /// Attribute index.
        attribute: u8,
    },
    /// Withdraw a negotiated divestiture offer.
    CancelNegotiatedDivestiture {
        /// Owner.
        federate: FederateSlot,
        /// Object index.
        object: u8,
        /// Attribute index.
        attribute: u8,
    },

    /// Register a federation-wide synchronization point.
    RegisterSyncPoint {
        /// Registrant.
        federate: FederateSlot,
        /// Label index.
        label: u8,
    },
    /// Report a synchronization point achieved.
    AchieveSyncPoint {
        /// Federate.
        federate: FederateSlot,
        /// Label index.
        label: u8,
        /// Achieved successfully.
        success: bool,
    },

    /// Start a federation save.
    RequestSave {
        /// Requester.
        federate: FederateSlot,
        /// Label index.
        label: u8,
    },
    /// Report the local save outcome.
    ReportSave {
        /// Federate.
        federate: FederateSlot,
        /// Saved successfully.
        success: bool,
    },
    /// Start a federation restore.
    RequestRestore {
        /// Requester.
        federate: FederateSlot,
        /// Label index.
        label: u8,
    },
    /// Report the local restore outcome.
    ReportRestore {
        /// Federate.
        federate: FederateSlot,
        /// Restored successfully.
        success: bool,
    },
}

impl Operation {
    /// Slot of the federate performing the operation.
    pub fn federate(&self) -> FederateSlot {
        match *self {
            Self::Join { federate }
            | Self::Resign { federate, .. }
            | Self::Crash { federate }
            | Self::EnableRegulation { federate, .. }
            | Self::DisableRegulation { federate }
            | Self::EnableConstrained { federate }
            | Self::DisableConstrained { federate }
            | Self::ModifyLookahead { federate, .. }
            | Self::Advance { federate, .. }
            | Self::Subscribe { federate }
            | Self::Send { federate, .. }
            | Self::RegisterObject { federate }
            | Self::DeleteObject { federate, .. }
            | Self::Acquire { federate, .. }
            | Self::AcquireIfAvailable { federate, .. }
            | Self::CancelAcquisition { federate, .. }
            | Self::Divest { federate, .. }
            | Self::NegotiatedDivest { federate, .. }
            | Self::ConfirmDivestiture { federate, .. }
            | Self::CancelNegotiatedDivestiture { federate, .. }
            | Self::RegisterSyncPoint { federate, .. }
            | Self::AchieveSyncPoint { federate, .. }
            | Self::RequestSave { federate, .. }
            | Self::ReportSave { federate, .. }
            | Self::RequestRestore { federate, .. }
            | Self::ReportRestore { federate, .. } => federate,
        }
    }
}

/// Time advance service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum AdvanceChoice {
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

impl From<AdvanceChoice> for AdvanceKind {
    fn from(choice: AdvanceChoice) -> Self {
        match choice {
            AdvanceChoice::TimeAdvance => Self::TimeAdvance,
            AdvanceChoice::TimeAdvanceAvailable => Self::TimeAdvanceAvailable,
            AdvanceChoice::NextMessage => Self::NextMessage,
            AdvanceChoice::NextMessageAvailable => Self::NextMessageAvailable,
            AdvanceChoice::FlushQueue => Self::FlushQueue,
        }
    }
}

/// Resign action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum ResignChoice {
    /// Divest everything.
    Divest,
    /// Delete deletable objects.
    DeleteObjects,
    /// Withdraw pending acquisitions.
    CancelPending,
    /// Delete, then divest the rest.
    DeleteThenDivest,
    /// Withdraw, delete, then divest.
    CancelDeleteDivest,
    /// Dispose of nothing.
    NoAction,
}

impl From<ResignChoice> for ResignAction {
    fn from(choice: ResignChoice) -> Self {
        match choice {
            ResignChoice::Divest => Self::UnconditionallyDivestAttributes,
            ResignChoice::DeleteObjects => Self::DeleteObjects,
            ResignChoice::CancelPending => Self::CancelPendingOwnershipAcquisitions,
            ResignChoice::DeleteThenDivest => Self::DeleteObjectsThenDivest,
            ResignChoice::CancelDeleteDivest => Self::CancelThenDeleteThenDivest,
            ResignChoice::NoAction => Self::NoAction,
        }
    }
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// The coordinator accepted the request.
    Applied,
    /// The coordinator rejected the request.
    Rejected(RtiError),
    /// The operation named an empty slot or missing object.
    Skipped,
}

impl OperationResult {
    /// Whether the coordinator accepted the request.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}
