use serde::{Deserialize, Serialize};

use crate::approvals::threshold::ThresholdPolicy;
use crate::domain::actor::{Actor, ActorRole};
use crate::domain::approval::AdminLevel;
use crate::domain::order::Order;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenialReason {
    NotAdmin { role: ActorRole },
    MissingAdminLevel,
    LevelNotRequired { level: AdminLevel, required: Vec<AdminLevel> },
}

impl DenialReason {
    pub fn describe(&self) -> String {
        match self {
            Self::NotAdmin { role } => {
                format!("actor role `{}` cannot decide approvals", role.as_str())
            }
            Self::MissingAdminLevel => "admin actor has no assigned level".to_owned(),
            Self::LevelNotRequired { level, required } => {
                let required =
                    required.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
                format!("{level} is not among the required levels ({required})")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub allowed: bool,
    pub reason: String,
    pub denial: Option<DenialReason>,
}

impl Authorization {
    fn allow(reason: impl Into<String>) -> Self {
        Self { allowed: true, reason: reason.into(), denial: None }
    }

    fn deny(denial: DenialReason) -> Self {
        Self { allowed: false, reason: denial.describe(), denial: Some(denial) }
    }
}

/// Decides whether an actor may submit a decision on an order.
///
/// Membership only: the actor's level must be required for the order's amount. It does not
/// have to be the level the order is currently awaiting.
#[derive(Clone, Copy, Debug, Default)]
pub struct AuthorizationGuard {
    policy: ThresholdPolicy,
}

impl AuthorizationGuard {
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self { policy }
    }

    pub fn evaluate(&self, order: &Order, actor: &Actor) -> Authorization {
        if !actor.is_admin() {
            return Authorization::deny(DenialReason::NotAdmin { role: actor.role });
        }

        let Some(level) = actor.admin_level else {
            return Authorization::deny(DenialReason::MissingAdminLevel);
        };

        if !self.policy.requires(order.amount, level) {
            let required = self.policy.required_levels(order.amount);
            return Authorization::deny(DenialReason::LevelNotRequired { level, required });
        }

        Authorization::allow(format!(
            "actor `{}` at {level} may decide order `{}`",
            actor.id.0, order.id
        ))
    }

    pub fn can_decide(&self, order: &Order, actor: &Actor) -> bool {
        self.evaluate(order, actor).allowed
    }
}
