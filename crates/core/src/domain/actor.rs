use serde::{Deserialize, Serialize};

use crate::domain::approval::AdminLevel;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Standard,
    Admin,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Admin => "admin",
        }
    }
}

impl std::str::FromStr for ActorRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" | "user" => Ok(Self::Standard),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unsupported actor role `{other}` (expected standard|admin)")),
        }
    }
}

/// An identity that acts on orders. Owned by the host; the workflow only reads it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: ActorRole,
    pub admin_level: Option<AdminLevel>,
}

impl Actor {
    pub fn standard(id: impl Into<String>) -> Self {
        Self { id: ActorId(id.into()), role: ActorRole::Standard, admin_level: None }
    }

    pub fn admin(id: impl Into<String>, level: AdminLevel) -> Self {
        Self { id: ActorId(id.into()), role: ActorRole::Admin, admin_level: Some(level) }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}
