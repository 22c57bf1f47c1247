use serde::{Deserialize, Serialize};

use crate::domain::actor::Actor;
use crate::domain::approval::{AdminLevel, ApprovalSlot, Decision, SlotDecision};
use crate::domain::order::{ApprovalStatus, Order, OrderSnapshot};

/// The approval status implied by a set of slot decisions.
///
/// Any rejection wins. Otherwise the order awaits the smallest required level without an
/// approved slot, and is finally approved once every required level has one.
pub fn derive_approval_status(slots: &[ApprovalSlot], required: &[AdminLevel]) -> ApprovalStatus {
    if slots.iter().any(|slot| slot.decision == SlotDecision::Rejected) {
        return ApprovalStatus::Rejected;
    }
    if required.is_empty() {
        return ApprovalStatus::Pending;
    }

    let approved = |level: &AdminLevel| {
        slots.iter().any(|slot| slot.level == *level && slot.decision == SlotDecision::Approved)
    };
    match required.iter().find(|level| !approved(level)) {
        Some(level) => ApprovalStatus::AwaitingLevel(*level),
        None => ApprovalStatus::FinallyApproved,
    }
}

/// A decision submitted by an actor. The slot is chosen by the actor's own admin level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub actor: Actor,
    pub decision: Decision,
    pub comments: Option<String>,
}

impl DecisionRequest {
    pub fn new(actor: Actor, decision: Decision) -> Self {
        Self { actor, decision, comments: None }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }
}

/// The order and the single slot changed by a decision. Both must be persisted together.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub order: Order,
    pub slot: ApprovalSlot,
}

impl DecisionOutcome {
    /// Folds the outcome back into the snapshot it was computed from.
    pub fn apply_to(&self, snapshot: &OrderSnapshot) -> OrderSnapshot {
        let slots = snapshot
            .slots
            .iter()
            .map(|slot| if slot.id == self.slot.id { self.slot.clone() } else { slot.clone() })
            .collect();
        OrderSnapshot { order: self.order.clone(), slots }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::derive_approval_status;
    use crate::domain::approval::{AdminLevel, ApprovalSlot, SlotDecision};
    use crate::domain::order::{ApprovalStatus, OrderId};

    const ALL: [AdminLevel; 3] = [AdminLevel::One, AdminLevel::Two, AdminLevel::Three];

    fn slots(decisions: [SlotDecision; 3]) -> Vec<ApprovalSlot> {
        let order_id = OrderId("ord-1".to_owned());
        ALL.iter()
            .zip(decisions)
            .map(|(level, decision)| {
                let mut slot = ApprovalSlot::pending(&order_id, *level, Utc::now());
                slot.decision = decision;
                slot
            })
            .collect()
    }

    #[test]
    fn untouched_plan_awaits_the_first_level() {
        use SlotDecision::Pending;
        assert_eq!(
            derive_approval_status(&slots([Pending, Pending, Pending]), &ALL),
            ApprovalStatus::AwaitingLevel(AdminLevel::One)
        );
    }

    #[test]
    fn awaits_smallest_unapproved_level_regardless_of_arrival_order() {
        use SlotDecision::{Approved, Pending};
        assert_eq!(
            derive_approval_status(&slots([Pending, Approved, Approved]), &ALL),
            ApprovalStatus::AwaitingLevel(AdminLevel::One)
        );
        assert_eq!(
            derive_approval_status(&slots([Approved, Pending, Approved]), &ALL),
            ApprovalStatus::AwaitingLevel(AdminLevel::Two)
        );
        assert_eq!(
            derive_approval_status(&slots([Approved, Approved, Approved]), &ALL),
            ApprovalStatus::FinallyApproved
        );
    }

    #[test]
    fn any_rejection_wins() {
        use SlotDecision::{Approved, Pending, Rejected};
        assert_eq!(
            derive_approval_status(&slots([Approved, Approved, Rejected]), &ALL),
            ApprovalStatus::Rejected
        );
        assert_eq!(
            derive_approval_status(&slots([Pending, Rejected, Pending]), &ALL),
            ApprovalStatus::Rejected
        );
    }
}
