//! Strongly-typed identifiers used across the domain.
//!
//! Every entity has exactly one canonical identifier type. Textual forms are only
//! parsed at the system boundary (`FromStr`).

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of an actor (already authenticated by the caller).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

/// Identifier of an event-sourced stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

/// Identifier of a raw material in the catalog.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(Uuid);

/// Identifier of an operational section (kitchen, bar, storage...).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(Uuid);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(Uuid);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeId(Uuid);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(Uuid);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BudgetId(Uuid);

/// Identifier of a single stock receipt.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

/// Identifier of a single ledger movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(Uuid);

/// Identifier of a section consumption record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsumptionId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
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

impl_uuid_newtype!(UserId, "UserId");
impl_uuid_newtype!(AggregateId, "AggregateId");
impl_uuid_newtype!(MaterialId, "MaterialId");
impl_uuid_newtype!(SectionId, "SectionId");
impl_uuid_newtype!(SupplierId, "SupplierId");
impl_uuid_newtype!(RecipeId, "RecipeId");
impl_uuid_newtype!(PurchaseOrderId, "PurchaseOrderId");
impl_uuid_newtype!(BudgetId, "BudgetId");
impl_uuid_newtype!(EntryId, "EntryId");
impl_uuid_newtype!(MovementId, "MovementId");
impl_uuid_newtype!(ConsumptionId, "ConsumptionId");

/// Namespace for deterministic (v5) stream identifiers.
const STREAM_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_3c2e_9b7d_4e51_a0c8_52d3_f4e6_b719);

impl AggregateId {
    /// Deterministic stream id for an aggregate keyed by several identifiers.
    ///
    /// The same `scope` and `parts` always yield the same id, so composite keys
    /// (section + material) map onto exactly one stream without a lookup table.
    pub fn derived(scope: &str, parts: &[&Uuid]) -> Self {
        let mut name = Vec::with_capacity(scope.len() + parts.len() * 16);
        name.extend_from_slice(scope.as_bytes());
        for part in parts {
            name.extend_from_slice(part.as_bytes());
        }
        Self(Uuid::new_v5(&STREAM_NAMESPACE, &name))
    }
}

macro_rules! impl_stream_id {
    ($t:ty) => {
        impl From<$t> for AggregateId {
            fn from(value: $t) -> Self {
                AggregateId(value.0)
            }
        }
    };
}

// Materials and purchase orders own exactly one stream each.
impl_stream_id!(MaterialId);
impl_stream_id!(PurchaseOrderId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_text() {
        let id = MaterialId::new();
        let parsed: MaterialId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn malformed_id_is_rejected_with_type_name() {
        let err = "not-a-uuid".parse::<SectionId>().unwrap_err();
        match err {
            DomainError::InvalidId(msg) => assert!(msg.starts_with("SectionId")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn derived_ids_are_stable_and_scoped() {
        let section = SectionId::new();
        let material = MaterialId::new();

        let a = AggregateId::derived("section_stock", &[section.as_uuid(), material.as_uuid()]);
        let b = AggregateId::derived("section_stock", &[section.as_uuid(), material.as_uuid()]);
        let other_scope = AggregateId::derived("other", &[section.as_uuid(), material.as_uuid()]);
        let swapped = AggregateId::derived("section_stock", &[material.as_uuid(), section.as_uuid()]);

        assert_eq!(a, b);
        assert_ne!(a, other_scope);
        assert_ne!(a, swapped);
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
