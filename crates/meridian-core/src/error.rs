//! Error taxonomy for federation services.
//!
//! Every synchronous service failure is an [`RtiError`]. Asynchronous
//! negative outcomes (registration failed, save not complete, ownership
//! unavailable) are delivered as callbacks and never appear here.
//!
//! Errors fall into three kinds (see [`ErrorKind`]):
//! - protocol-state violations: the request is illegal in the federate's
//!   current state; nothing changed and the caller may retry later
//! - referential errors: a handle or label does not resolve
//! - internal errors: the coordinator itself failed

use thiserror::Error;

use crate::{
    handle::{
        AttributeHandle, FederateHandle, InteractionClassHandle, ObjectClassHandle,
        ObjectInstanceHandle,
    },
    time::TimeError,
};

/// Broad classification of an [`RtiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Request is not legal in the current state. No state changed.
    ProtocolState,
    /// A handle, label or name does not resolve.
    Referential,
    /// The coordinator failed internally.
    Internal,
}

/// Errors returned synchronously by federation services.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RtiError {
    /// Caller is not joined to the federation execution.
    #[error("{0} is not a member of the federation execution")]
    FederateNotExecutionMember(FederateHandle),

    /// Another joined federate already uses this name.
    #[error("federate name already in use: {0}")]
    FederateNameAlreadyInUse(String),

    /// Join would exceed the configured federate limit.
    #[error("federation execution is full ({max} federates)")]
    FederationFull {
        /// Configured limit
        max: usize,
    },

    /// `enableTimeRegulation` on a regulating federate.
    #[error("time regulation already enabled")]
    TimeRegulationAlreadyEnabled,

    /// Service requires a regulating federate.
    #[error("time regulation is not enabled")]
    TimeRegulationIsNotEnabled,

    /// `enableTimeConstrained` on a constrained federate.
    #[error("time constrained already enabled")]
    TimeConstrainedAlreadyEnabled,

    /// Service requires a constrained federate.
    #[error("time constrained is not enabled")]
    TimeConstrainedIsNotEnabled,

    /// A constrained enable is still outstanding.
    #[error("request for time constrained pending")]
    RequestForTimeConstrainedPending,

    /// A time advance is outstanding.
    #[error("federate is in the time advancing state")]
    InTimeAdvancingState,

    /// Lookahead negative, or zero where positive lookahead is required.
    #[error("invalid lookahead: {0}")]
    InvalidLookahead(String),

    /// A time advance request is already outstanding.
    #[error("time advance already in progress")]
    TimeAdvanceAlreadyInProgress,

    /// Requested time is not after the federate's current time.
    #[error("logical time {requested} already passed (current {current})")]
    LogicalTimeAlreadyPassed {
        /// Requested time
        requested: String,
        /// Federate's current time
        current: String,
    },

    /// Time value illegal for the service (e.g. below the sender's LOTS).
    #[error("invalid logical time: {0}")]
    InvalidLogicalTime(String),

    /// Time arithmetic overflowed or underflowed.
    #[error("illegal time arithmetic: {0}")]
    IllegalTimeArithmetic(String),

    /// Object instance handle does not resolve.
    #[error("object instance not known: {0}")]
    ObjectInstanceNotKnown(ObjectInstanceHandle),

    /// Object class handle is not declared in the object model.
    #[error("object class not defined: {0}")]
    ObjectClassNotDefined(ObjectClassHandle),

    /// Attribute is not declared for the instance's class.
    #[error("{attribute} not defined for {object}")]
    AttributeNotDefined {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Offending attribute
        attribute: AttributeHandle,
    },

    /// Interaction class handle is not declared in the object model.
    #[error("interaction class not defined: {0}")]
    InteractionClassNotDefined(InteractionClassHandle),

    /// Caller does not own the attribute.
    #[error("{attribute} of {object} not owned by caller")]
    AttributeNotOwned {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Offending attribute
        attribute: AttributeHandle,
    },

    /// Caller already owns the attribute it tries to acquire.
    #[error("{attribute} of {object} already owned by caller")]
    AttributeAlreadyOwned {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Offending attribute
        attribute: AttributeHandle,
    },

    /// Negotiated divestiture already pending for the attribute.
    #[error("{attribute} of {object} already being divested")]
    AttributeAlreadyBeingDivested {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Offending attribute
        attribute: AttributeHandle,
    },

    /// Confirmation without a preceding negotiated divestiture.
    #[error("divestiture of {attribute} of {object} was not requested")]
    AttributeDivestitureWasNotRequested {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Offending attribute
        attribute: AttributeHandle,
    },

    /// Confirmation while nobody is acquiring the attribute.
    #[error("no acquisition pending for {attribute} of {object}")]
    NoAcquisitionPending {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Offending attribute
        attribute: AttributeHandle,
    },

    /// Caller is already queued for the attribute.
    #[error("{attribute} of {object} already being acquired by caller")]
    AttributeAlreadyBeingAcquired {
        /// Object instance
        object: ObjectInstanceHandle,
        /// Offending attribute
        attribute: AttributeHandle,
    },

    /// Deleting an instance requires owning its privilege-to-delete.
    #[error("delete privilege not held for {0}")]
    DeletePrivilegeNotHeld(ObjectInstanceHandle),

    /// Resign action would leave owned attributes behind.
    #[error("federate owns attributes")]
    FederateOwnsAttributes,

    /// Synchronization point is not announced to the caller.
    #[error("synchronization point label not announced: {0}")]
    SynchronizationPointLabelNotAnnounced(String),

    /// A federation save is in progress.
    #[error("save in progress")]
    SaveInProgress,

    /// A federation restore is in progress.
    #[error("restore in progress")]
    RestoreInProgress,

    /// No save is in progress for the caller.
    #[error("save not initiated")]
    SaveNotInitiated,

    /// No restore is in progress for the caller.
    #[error("restore not requested")]
    RestoreNotRequested,

    /// Destroy requested while federates are still joined.
    #[error("federates currently joined")]
    FederatesCurrentlyJoined,

    /// Federation execution name already taken.
    #[error("federation execution already exists: {0}")]
    FederationExecutionAlreadyExists(String),

    /// Federation execution name does not resolve.
    #[error("federation execution does not exist: {0}")]
    FederationExecutionDoesNotExist(String),

    /// The coordinator failed internally.
    #[error("RTI internal error: {0}")]
    RtiInternal(String),
}

impl RtiError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FederateNotExecutionMember(_)
            | Self::ObjectInstanceNotKnown(_)
            | Self::ObjectClassNotDefined(_)
            | Self::AttributeNotDefined { .. }
            | Self::InteractionClassNotDefined(_)
            | Self::AttributeNotOwned { .. }
            | Self::SynchronizationPointLabelNotAnnounced(_)
            | Self::FederationExecutionDoesNotExist(_) => ErrorKind::Referential,
            Self::RtiInternal(_) => ErrorKind::Internal,
            _ => ErrorKind::ProtocolState,
        }
    }

    /// Returns true if the same request may succeed once federation state
    /// changes (protocol-state violations only).
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::ProtocolState
    }
}

/// Time arithmetic failures surface as `IllegalTimeArithmetic`; codec and
/// range failures as `InvalidLogicalTime`.
impl From<TimeError> for RtiError {
    fn from(err: TimeError) -> Self {
        match err {
            TimeError::Overflow(_) | TimeError::Underflow(_) => {
                Self::IllegalTimeArithmetic(err.to_string())
            },
            TimeError::NonFinite(_)
            | TimeError::InvalidLength { .. }
            | TimeError::OutOfRange(_) => Self::InvalidLogicalTime(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_handles_are_referential() {
        let object = ObjectInstanceHandle::new(1);
        let attribute = AttributeHandle::new(2);

        assert_eq!(RtiError::ObjectInstanceNotKnown(object).kind(), ErrorKind::Referential);
        assert_eq!(
            RtiError::AttributeNotOwned { object, attribute }.kind(),
            ErrorKind::Referential
        );
        assert_eq!(
            RtiError::FederateNotExecutionMember(FederateHandle::new(9)).kind(),
            ErrorKind::Referential
        );
    }

    #[test]
    fn state_violations_are_transient() {
        assert!(RtiError::TimeAdvanceAlreadyInProgress.is_transient());
        assert!(RtiError::SaveInProgress.is_transient());
        assert!(!RtiError::RtiInternal("actor gone".into()).is_transient());
        assert_eq!(RtiError::RtiInternal("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn time_errors_convert_by_cause() {
        let overflow: RtiError = TimeError::Overflow("max + 1".into()).into();
        assert!(matches!(overflow, RtiError::IllegalTimeArithmetic(_)));

        let length: RtiError = TimeError::InvalidLength { expected: 8, actual: 2 }.into();
        assert!(matches!(length, RtiError::InvalidLogicalTime(_)));
    }

    #[test]
    fn messages_name_the_handles() {
        let err = RtiError::AttributeNotOwned {
            object: ObjectInstanceHandle::new(4),
            attribute: AttributeHandle::new(7),
        };
        assert_eq!(err.to_string(), "attribute#7 of object#4 not owned by caller");
    }
}
