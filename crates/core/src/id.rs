//! Identifier newtypes shared across the workspace.
//!
//! Everything is a UUIDv7 underneath: time-ordered, so freshly minted ids
//! sort roughly by creation. Domain crates wrap [`AggregateId`] in their
//! own newtypes (product, supplier, purchase order ids) rather than pass
//! bare UUIDs around.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $t:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Mints a fresh time-ordered id.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s).map(Self).map_err(|e| {
                    DomainError::invalid_id(format!("{}: {e}", stringify!($t)))
                })
            }
        }
    };
}

uuid_id! {
    /// The store a piece of state belongs to. Every stream, directory
    /// entry and read model is keyed by store first; nothing crosses
    /// this line.
    StoreId
}

uuid_id! {
    /// The acting user behind a command.
    UserId
}

uuid_id! {
    /// Raw stream identifier. Domain crates wrap it in typed ids.
    AggregateId
}
