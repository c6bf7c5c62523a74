use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use galley_core::{DomainError, PurchaseOrderId, SectionId};

/// Kind of ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
    TransferIn,
    TransferOut,
    /// Signed correction; the only type whose quantity may be negative.
    Adjustment,
    Expired,
    Damaged,
}

impl MovementType {
    /// Effect of a movement of `quantity` on the available balance.
    pub fn signed_delta(self, quantity: Decimal) -> Decimal {
        match self {
            MovementType::In | MovementType::TransferIn | MovementType::Adjustment => quantity,
            MovementType::Out
            | MovementType::TransferOut
            | MovementType::Expired
            | MovementType::Damaged => -quantity,
        }
    }

    pub fn is_reducing(self, quantity: Decimal) -> bool {
        self.signed_delta(quantity) < Decimal::ZERO
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::In => write!(f, "IN"),
            Self::Out => write!(f, "OUT"),
            Self::TransferIn => write!(f, "TRANSFER_IN"),
            Self::TransferOut => write!(f, "TRANSFER_OUT"),
            Self::Adjustment => write!(f, "ADJUSTMENT"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Damaged => write!(f, "DAMAGED"),
        }
    }
}

impl std::str::FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            "transfer_in" => Ok(Self::TransferIn),
            "transfer_out" => Ok(Self::TransferOut),
            "adjustment" => Ok(Self::Adjustment),
            "expired" => Ok(Self::Expired),
            "damaged" => Ok(Self::Damaged),
            _ => Err(DomainError::validation(format!("unknown movement type: {s}"))),
        }
    }
}

/// What a movement was made for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MovementReference {
    /// Stock assigned to (or returned from) a section.
    Section(SectionId),
    PurchaseOrder(PurchaseOrderId),
    /// An order in an external sales system.
    Order(String),
}
