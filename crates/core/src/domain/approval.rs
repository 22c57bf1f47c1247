use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::actor::ActorId;
use crate::domain::order::OrderId;
use crate::errors::DomainError;

/// Tier of administrative authority. Ordering follows the numeric level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AdminLevel {
    One,
    Two,
    Three,
}

impl AdminLevel {
    pub const ALL: [AdminLevel; 3] = [AdminLevel::One, AdminLevel::Two, AdminLevel::Three];

    pub fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

impl TryFrom<u8> for AdminLevel {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            other => Err(DomainError::InvalidAdminLevel(i64::from(other))),
        }
    }
}

impl TryFrom<i64> for AdminLevel {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| DomainError::InvalidAdminLevel(value))
            .and_then(AdminLevel::try_from)
    }
}

impl From<AdminLevel> for u8 {
    fn from(value: AdminLevel) -> Self {
        value.number()
    }
}

impl fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Level {}", self.number())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotDecision {
    Pending,
    Approved,
    Rejected,
}

impl SlotDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for SlotDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SlotDecision {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => {
                Err(DomainError::InvariantViolation(format!("unknown slot decision `{other}`")))
            }
        }
    }
}

/// A terminal verdict submitted by an approver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl From<Decision> for SlotDecision {
    fn from(value: Decision) -> Self {
        match value {
            Decision::Approved => SlotDecision::Approved,
            Decision::Rejected => SlotDecision::Rejected,
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Ok(Self::Approved),
            "reject" | "rejected" => Ok(Self::Rejected),
            other => Err(format!("unsupported decision `{other}` (expected approve|reject)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalSlotId(pub String);

impl ApprovalSlotId {
    pub fn for_level(order_id: &OrderId, level: AdminLevel) -> Self {
        Self(format!("{}-L{}", order_id.0, level.number()))
    }
}

/// One level's sign-off on an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSlot {
    pub id: ApprovalSlotId,
    pub order_id: OrderId,
    pub level: AdminLevel,
    pub decision: SlotDecision,
    pub approver: Option<ActorId>,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl ApprovalSlot {
    pub fn pending(order_id: &OrderId, level: AdminLevel, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ApprovalSlotId::for_level(order_id, level),
            order_id: order_id.clone(),
            level,
            decision: SlotDecision::Pending,
            approver: None,
            comments: None,
            created_at,
            decided_at: None,
        }
    }
}
