//! Opaque handles.
//!
//! Handles are small copyable identifiers. Only the registry that issues a
//! handle gives it meaning; everything else compares and stores them.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $repr:ty, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($repr);

        impl $name {
            /// Wrap a raw handle value.
            pub const fn new(value: $repr) -> Self {
                Self(value)
            }

            /// Raw handle value.
            pub const fn value(self) -> $repr {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }

        impl From<$repr> for $name {
            fn from(value: $repr) -> Self {
                Self(value)
            }
        }
    };
}

define_handle!(
    /// Federate identifier, assigned on join and never reused within a
    /// federation execution.
    ///
    /// Handles are issued in increasing order, so ordering by handle is
    /// ordering by join time.
    FederateHandle,
    u32,
    "federate"
);

define_handle!(
    /// Registered object instance.
    ObjectInstanceHandle,
    u64,
    "object"
);

define_handle!(
    /// Attribute of an object class.
    AttributeHandle,
    u32,
    "attribute"
);

define_handle!(
    /// Object class declared by the object model.
    ObjectClassHandle,
    u32,
    "object-class"
);

define_handle!(
    /// Interaction class declared by the object model.
    InteractionClassHandle,
    u32,
    "interaction-class"
);
