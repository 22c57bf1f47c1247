use serde::{Deserialize, Serialize};

use crate::approvals::threshold::ThresholdPolicy;
use crate::domain::approval::AdminLevel;
use crate::domain::order::{ApprovalStatus, OrderId, OrderSnapshot};

pub const FULLY_APPROVED_MESSAGE: &str = "Order is fully approved";
pub const REJECTED_MESSAGE: &str = "Order has been rejected";
pub const PENDING_MESSAGE: &str = "Pending approval";

/// Renders human-readable approval progress from an order snapshot.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatusReporter {
    policy: ThresholdPolicy,
}

impl StatusReporter {
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self { policy }
    }

    pub fn pending_levels(&self, snapshot: &OrderSnapshot) -> Vec<AdminLevel> {
        let approved = snapshot.approved_levels();
        self.policy
            .required_levels(snapshot.order.amount)
            .into_iter()
            .filter(|level| !approved.contains(level))
            .collect()
    }

    pub fn message(&self, snapshot: &OrderSnapshot) -> String {
        match snapshot.order.approval_status {
            ApprovalStatus::FinallyApproved => FULLY_APPROVED_MESSAGE.to_owned(),
            ApprovalStatus::Rejected => REJECTED_MESSAGE.to_owned(),
            ApprovalStatus::Pending | ApprovalStatus::AwaitingLevel(_) => {
                let pending = self.pending_levels(snapshot);
                if pending.is_empty() {
                    return PENDING_MESSAGE.to_owned();
                }
                let labels = pending.iter().map(ToString::to_string).collect::<Vec<_>>();
                format!("Awaiting approval from: {}", labels.join(", "))
            }
        }
    }

    pub fn summarize(&self, snapshot: &OrderSnapshot) -> ApprovalSummary {
        ApprovalSummary {
            order_id: snapshot.order.id.clone(),
            status: snapshot.order.approval_status,
            message: self.message(snapshot),
            required_levels: self.policy.required_levels(snapshot.order.amount),
            approved_levels: snapshot.approved_levels().into_iter().collect(),
            pending_levels: self.pending_levels(snapshot),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSummary {
    pub order_id: OrderId,
    pub status: ApprovalStatus,
    pub message: String,
    pub required_levels: Vec<AdminLevel>,
    pub approved_levels: Vec<AdminLevel>,
    pub pending_levels: Vec<AdminLevel>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::StatusReporter;
    use crate::domain::actor::{Actor, ActorId};
    use crate::domain::approval::{AdminLevel, Decision};
    use crate::domain::order::{ApprovalStatus, Order, OrderId, OrderSnapshot};
    use crate::flows::{ApprovalWorkflow, DecisionRequest};

    fn planned(amount: i64) -> OrderSnapshot {
        let order = Order::submitted(
            OrderId("ord-s".to_owned()),
            "PO-S",
            "monitors",
            ActorId("u-1".to_owned()),
            Decimal::new(amount, 0),
            Utc::now(),
        );
        ApprovalWorkflow::default().create_plan(order, Utc::now())
    }

    fn approve(snapshot: &OrderSnapshot, level: AdminLevel) -> OrderSnapshot {
        ApprovalWorkflow::default()
            .apply_decision(
                snapshot,
                &DecisionRequest::new(Actor::admin("admin", level), Decision::Approved),
                Utc::now(),
            )
            .expect("approval applies")
            .apply_to(snapshot)
    }

    #[test]
    fn new_order_lists_every_required_level() {
        let reporter = StatusReporter::default();
        assert_eq!(
            reporter.message(&planned(8_000)),
            "Awaiting approval from: Level 1, Level 2, Level 3"
        );
        assert_eq!(reporter.message(&planned(100)), "Awaiting approval from: Level 1");
    }

    #[test]
    fn out_of_sequence_approval_lists_remaining_levels_ascending() {
        let snapshot = approve(&planned(8_000), AdminLevel::Two);
        assert_eq!(
            StatusReporter::default().message(&snapshot),
            "Awaiting approval from: Level 1, Level 3"
        );
    }

    #[test]
    fn terminal_statuses_have_fixed_messages() {
        let reporter = StatusReporter::default();
        let approved = approve(&planned(250), AdminLevel::One);
        assert_eq!(reporter.message(&approved), "Order is fully approved");

        let mut rejected = planned(250);
        rejected.order.approval_status = ApprovalStatus::Rejected;
        assert_eq!(reporter.message(&rejected), "Order has been rejected");
    }

    #[test]
    fn non_terminal_status_with_everything_approved_falls_back_to_pending_message() {
        let mut snapshot = approve(&planned(250), AdminLevel::One);
        snapshot.order.approval_status = ApprovalStatus::AwaitingLevel(AdminLevel::One);
        assert_eq!(StatusReporter::default().message(&snapshot), "Pending approval");
    }

    #[test]
    fn summary_partitions_required_levels() {
        let snapshot = approve(&planned(1_500), AdminLevel::One);
        let summary = StatusReporter::default().summarize(&snapshot);

        assert_eq!(summary.status, ApprovalStatus::AwaitingLevel(AdminLevel::Two));
        assert_eq!(summary.required_levels, vec![AdminLevel::One, AdminLevel::Two]);
        assert_eq!(summary.approved_levels, vec![AdminLevel::One]);
        assert_eq!(summary.pending_levels, vec![AdminLevel::Two]);
        assert_eq!(summary.message, "Awaiting approval from: Level 2");
    }
}
