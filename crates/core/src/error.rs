//! Domain error model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::MaterialId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// One balance that cannot cover a requested debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortfall {
    pub material_id: MaterialId,
    /// Display name of the material, when the caller knows it.
    pub material_name: Option<String>,
    pub requested: Decimal,
    pub available: Decimal,
    /// Unit both quantities are expressed in.
    pub unit: String,
}

impl core::fmt::Display for StockShortfall {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = self
            .material_name
            .clone()
            .unwrap_or_else(|| self.material_id.to_string());
        write!(
            f,
            "{name}: requested {} {}, available {} {}",
            self.requested, self.unit, self.available, self.unit
        )
    }
}

/// Domain-level error.
///
/// Every variant is a deterministic, permanent rejection: retrying the same
/// request against the same state fails the same way. Storage contention is an
/// infrastructure concern and is not modelled here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-range input (non-positive quantity, missing unit fields).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Two units cannot be converted into each other.
    #[error("cannot convert {from} to {to}")]
    UnitMismatch { from: String, to: String },

    /// A debit would drive a balance negative.
    #[error("insufficient stock: {0}")]
    InsufficientStock(StockShortfall),

    /// A multi-ingredient debit failed; carries every failing ingredient.
    #[error("insufficient stock for {} ingredient(s)", .0.len())]
    AggregateInsufficientStock(Vec<StockShortfall>),

    /// A lifecycle operation was invoked from a state that does not allow it.
    #[error("cannot {action} from status {from}")]
    InvalidStateTransition { from: String, action: String },

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced resource does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A conflict occurred (e.g. creating something that already exists).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn unit_mismatch(from: impl core::fmt::Display, to: impl core::fmt::Display) -> Self {
        Self::UnitMismatch {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn invalid_transition(from: impl core::fmt::Display, action: impl Into<String>) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            action: action.into(),
        }
    }

    /// Shortfalls carried by this error, if it is a stock error.
    pub fn shortfalls(&self) -> &[StockShortfall] {
        match self {
            DomainError::InsufficientStock(s) => core::slice::from_ref(s),
            DomainError::AggregateInsufficientStock(all) => all,
            _ => &[],
        }
    }

    /// Fill in missing material names on stock shortfalls.
    pub fn with_material_names(self, name_of: impl Fn(MaterialId) -> Option<String>) -> Self {
        let fill = |mut s: StockShortfall| {
            if s.material_name.is_none() {
                s.material_name = name_of(s.material_id);
            }
            s
        };
        match self {
            DomainError::InsufficientStock(s) => DomainError::InsufficientStock(fill(s)),
            DomainError::AggregateInsufficientStock(all) => {
                DomainError::AggregateInsufficientStock(all.into_iter().map(fill).collect())
            }
            other => other,
        }
    }
}
