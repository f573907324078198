//! Simulation harness for Meridian coordination testing.
//!
//! Drives a [`FederationExecution`](meridian_rti::FederationExecution) with
//! generated operation sequences and checks behavioral invariants after
//! every step.
//!
//! # Model-Based Testing
//!
//! The `model` module provides the [`Operation`] vocabulary and a reference
//! model of attribute ownership. Operations are applied to both the model and
//! the real coordinator, and their observable owners compared.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties that must hold across every
//! execution path. Use [`InvariantRegistry::standard()`] for the time and
//! ownership invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
pub mod sim_federation;

pub use invariants::{
    AttributeView, ConstrainedGrantWithinGalt, FederateView, GaltMonotonicity, GrantMonotonicity,
    Invariant, InvariantRegistry, InvariantResult, OwnershipExclusivity, SystemSnapshot,
    UnownedHasNoQueue, Violation,
};
pub use model::{
    AdvanceChoice, FederateSlot, ModelObject, Operation, OperationResult, OwnershipModel,
    ResignChoice,
};
pub use sim_federation::{FEDERATE_SLOTS, SimFederation};
