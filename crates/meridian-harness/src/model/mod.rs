//! Model-based testing support.
//!
//! [`Operation`] is the vocabulary shared by proptest strategies and the
//! fuzz target. [`OwnershipModel`] is a reference implementation of FIFO
//! ownership transfer, compared against the real coordinator.

mod operation;
mod ownership;

pub use operation::{AdvanceChoice, FederateSlot, Operation, OperationResult, ResignChoice};
pub use ownership::{ModelObject, OwnershipModel};
