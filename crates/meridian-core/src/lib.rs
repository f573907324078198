//! Meridian RTI core primitives.
//!
//! Shared vocabulary for the federation coordinator: opaque handles, the
//! logical time abstraction with its fixed-width codec, the object model the
//! coordinator consumes, and the error taxonomy returned to federates.
//!
//! Nothing in this crate performs I/O or holds federation state. The
//! coordinator itself lives in `meridian-rti`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod handle;
pub mod object_model;
pub mod time;

pub use error::{ErrorKind, RtiError};
pub use handle::{
    AttributeHandle, FederateHandle, InteractionClassHandle, ObjectClassHandle,
    ObjectInstanceHandle,
};
pub use object_model::{ObjectClassDef, ObjectModel, ObjectModelBuilder, PRIVILEGE_TO_DELETE};
pub use time::{
    Float64Interval, Float64Time, Integer64Interval, Integer64Time, LogicalTime,
    LogicalTimeInterval, TimeError,
};
