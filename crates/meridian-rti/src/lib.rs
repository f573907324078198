//! Meridian federation execution coordinator.
//!
//! Runs the coordination protocols of a distributed simulation federation:
//! logical time management, attribute ownership transfer, synchronization
//! points and federation-wide save/restore.
//!
//! # Architecture
//!
//! - [`FederationExecution`]: Sans-IO core. One request in, a response and a
//!   list of [`Delivery`] callbacks out. Deterministic and synchronous.
//! - Component managers ([`TimeManager`], [`OwnershipManager`],
//!   [`SyncPointCoordinator`], [`SaveRestoreCoordinator`]) own their slice
//!   of federation state and park requests that cannot complete yet.
//! - [`Executive`]: tokio runtime. One actor task per federation execution,
//!   callbacks pushed to per-federate [`FederateSession`] outboxes.
//! - [`SaveStore`]: synchronous persistence for save snapshots.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod callback;
pub mod config;
pub mod executive;
pub mod federation;
pub mod ownership;
pub mod registry;
pub mod request;
pub mod save_restore;
pub mod storage;
pub mod sync_point;
pub mod time_manager;

pub use callback::{
    Callback, Delivery, OrderType, RestoreFailureReason, SaveFailureReason,
    SynchronizationPointFailureReason,
};
pub use config::{ExecutiveConfig, FederationConfig};
pub use executive::{Executive, FederateSession};
pub use federation::FederationExecution;
pub use ownership::{AcquisitionResult, OwnershipManager};
pub use registry::{FederateInfo, FederateRegistry};
pub use request::{AdvanceKind, Outcome, Request, ResignAction, Response};
pub use save_restore::{FederationSnapshot, RestoreStatus, SaveRestoreCoordinator, SaveStatus};
pub use storage::{ChaoticSaveStore, MemorySaveStore, SaveStore, StorageError};
pub use sync_point::{SyncPointCoordinator, SyncPointState, SynchronizationPoint};
pub use time_manager::{FederateTimeState, TimeManager};
