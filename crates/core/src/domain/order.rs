use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::actor::ActorId;
use crate::domain::approval::{AdminLevel, ApprovalSlot, SlotDecision};
use crate::errors::DomainError;

pub const MAX_ORDER_NUMBER_LEN: usize = 50;
pub const MAX_DESCRIPTION_LEN: usize = 500;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            other => {
                Err(DomainError::InvariantViolation(format!("unknown order status `{other}`")))
            }
        }
    }
}

/// Workflow position of an order. The awaiting level is carried as data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "level", rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    AwaitingLevel(AdminLevel),
    FinallyApproved,
    Rejected,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::FinallyApproved | Self::Rejected)
    }

    /// Storage discriminator; the awaiting level travels separately.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AwaitingLevel(_) => "awaiting",
            Self::FinallyApproved => "finally_approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn awaiting_level(&self) -> Option<AdminLevel> {
        match self {
            Self::AwaitingLevel(level) => Some(*level),
            _ => None,
        }
    }

    pub fn from_parts(kind: &str, level: Option<AdminLevel>) -> Result<Self, DomainError> {
        match (kind, level) {
            ("pending", None) => Ok(Self::Pending),
            ("awaiting", Some(level)) => Ok(Self::AwaitingLevel(level)),
            ("finally_approved", None) => Ok(Self::FinallyApproved),
            ("rejected", None) => Ok(Self::Rejected),
            (kind, level) => Err(DomainError::InvariantViolation(format!(
                "approval status `{kind}` is inconsistent with awaiting level {level:?}"
            ))),
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("Pending"),
            Self::AwaitingLevel(level) => write!(f, "AwaitingLevel{}", level.number()),
            Self::FinallyApproved => f.write_str("FinallyApproved"),
            Self::Rejected => f.write_str("Rejected"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub description: String,
    pub created_by: ActorId,
    pub amount: Decimal,
    pub status: OrderStatus,
    pub approval_status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl Order {
    /// A freshly submitted order, before any approval plan exists.
    pub fn submitted(
        id: OrderId,
        order_number: impl Into<String>,
        description: impl Into<String>,
        created_by: ActorId,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_number: order_number.into(),
            description: description.into(),
            created_by,
            amount,
            status: OrderStatus::Pending,
            approval_status: ApprovalStatus::Pending,
            created_at,
            updated_at: None,
            approved_at: None,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let number = self.order_number.trim();
        if number.is_empty() {
            return Err(DomainError::InvariantViolation("order number is required".to_owned()));
        }
        if number.chars().count() > MAX_ORDER_NUMBER_LEN {
            return Err(DomainError::InvariantViolation(format!(
                "order number exceeds {MAX_ORDER_NUMBER_LEN} characters"
            )));
        }
        if self.description.trim().is_empty() {
            return Err(DomainError::InvariantViolation("description is required".to_owned()));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(DomainError::InvariantViolation(format!(
                "description exceeds {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        if self.amount < Decimal::ZERO {
            return Err(DomainError::InvariantViolation(format!(
                "order amount must not be negative (got {})",
                self.amount
            )));
        }
        Ok(())
    }
}

/// An order together with its approval slots, read as one unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order: Order,
    pub slots: Vec<ApprovalSlot>,
}

impl OrderSnapshot {
    pub fn new(order: Order, slots: Vec<ApprovalSlot>) -> Self {
        Self { order, slots }
    }

    pub fn slot_for(&self, level: AdminLevel) -> Option<&ApprovalSlot> {
        self.slots.iter().find(|slot| slot.level == level)
    }

    pub fn approved_levels(&self) -> BTreeSet<AdminLevel> {
        self.slots
            .iter()
            .filter(|slot| slot.decision == SlotDecision::Approved)
            .map(|slot| slot.level)
            .collect()
    }

    pub fn has_decisions(&self) -> bool {
        self.slots.iter().any(|slot| !slot.decision.is_pending())
    }
}
