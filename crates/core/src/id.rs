//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a business (the tenant boundary).
///
/// Every stored row carries one and every engine call is scoped to one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessId(Uuid);

/// Identifier of a user (actor identity, resolved by the auth collaborator).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

/// Identifier of an aggregate or entity row.
///
/// Domain crates wrap this in their own newtypes (`ProductId`, `LotId`, ...).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered), so ids sort by creation time.
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

        impl Default for $t {
            fn default() -> Self {
                Self::new()
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
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(BusinessId, "BusinessId");
impl_uuid_newtype!(UserId, "UserId");
impl_uuid_newtype!(AggregateId, "AggregateId");

/// Declare a domain identifier wrapping [`AggregateId`].
///
/// ```ignore
/// stockflow_core::domain_id!(ProductId, "Product identifier.");
/// ```
#[macro_export]
macro_rules! domain_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug,
            Copy,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $crate::AggregateId);

        impl $name {
            pub fn new(id: $crate::AggregateId) -> Self {
                Self(id)
            }

            /// Fresh time-ordered identifier.
            pub fn generate() -> Self {
                Self($crate::AggregateId::new())
            }

            pub fn as_uuid(&self) -> &::uuid::Uuid {
                self.0.as_uuid()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<::uuid::Uuid> for $name {
            fn from(value: ::uuid::Uuid) -> Self {
                Self($crate::AggregateId::from_uuid(value))
            }
        }

        impl core::str::FromStr for $name {
            type Err = $crate::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<$crate::AggregateId>().map(Self)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_garbage_with_type_name() {
        let err = "not-a-uuid".parse::<BusinessId>().unwrap_err();
        match err {
            DomainError::InvalidId(msg) => assert!(msg.starts_with("BusinessId")),
            other => panic!("expected InvalidId, got {other:?}"),
        }
    }

    #[test]
    fn display_round_trips_through_from_str() {
        let id = AggregateId::new();
        let parsed: AggregateId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
