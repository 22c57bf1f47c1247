use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::approvals::guard::{AuthorizationGuard, DenialReason};
use crate::approvals::threshold::ThresholdPolicy;
use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::approval::{AdminLevel, ApprovalSlot, SlotDecision};
use crate::domain::order::{ApprovalStatus, Order, OrderId, OrderSnapshot, OrderStatus};
use crate::flows::states::{derive_approval_status, DecisionOutcome, DecisionRequest};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("order has no approval slot for {level} (required: {required:?})")]
    InvalidLevel { level: AdminLevel, required: Vec<AdminLevel> },
    #[error("{level} has already been decided: {decision}")]
    AlreadyDecided { level: AdminLevel, decision: SlotDecision },
    #[error("actor is not authorized to decide this order: {reason}")]
    Unauthorized { reason: String },
    #[error("order is closed for decisions (status {status:?}, approval status {approval_status})")]
    OrderClosed { status: OrderStatus, approval_status: ApprovalStatus },
    #[error("approval plan for order `{order_id}` is corrupt: {detail}")]
    PlanIntegrity { order_id: OrderId, detail: String },
}

impl WorkflowError {
    /// Broken invariants are not business errors and must not be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::PlanIntegrity { .. })
    }
}

/// The multi-level approval state machine.
///
/// Stateless: every operation takes a snapshot by reference and returns new values.
/// The caller persists the result as one atomic unit per order.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApprovalWorkflow {
    policy: ThresholdPolicy,
    guard: AuthorizationGuard,
}

impl ApprovalWorkflow {
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self { policy, guard: AuthorizationGuard::new(policy) }
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    /// Builds one pending slot per required level and moves the order to its first
    /// awaiting level.
    pub fn create_plan(&self, mut order: Order, now: DateTime<Utc>) -> OrderSnapshot {
        let levels = self.policy.required_levels(order.amount);
        let slots =
            levels.iter().map(|level| ApprovalSlot::pending(&order.id, *level, now)).collect();

        order.status = OrderStatus::Pending;
        order.approval_status = match levels.first() {
            Some(level) => ApprovalStatus::AwaitingLevel(*level),
            None => ApprovalStatus::Pending,
        };

        OrderSnapshot::new(order, slots)
    }

    pub fn apply_decision(
        &self,
        snapshot: &OrderSnapshot,
        request: &DecisionRequest,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, WorkflowError> {
        let order = &snapshot.order;
        let required = self.policy.required_levels(order.amount);
        verify_plan(snapshot, &required)?;

        let Some(level) = request.actor.admin_level else {
            return Err(WorkflowError::Unauthorized {
                reason: DenialReason::MissingAdminLevel.describe(),
            });
        };

        let Some(existing) = snapshot.slot_for(level) else {
            return Err(WorkflowError::InvalidLevel { level, required });
        };

        if !existing.decision.is_pending() {
            return Err(WorkflowError::AlreadyDecided { level, decision: existing.decision });
        }

        if order.approval_status.is_terminal() || order.status != OrderStatus::Pending {
            return Err(WorkflowError::OrderClosed {
                status: order.status,
                approval_status: order.approval_status,
            });
        }

        let authorization = self.guard.evaluate(order, &request.actor);
        if !authorization.allowed {
            return Err(WorkflowError::Unauthorized { reason: authorization.reason });
        }

        let mut slot = existing.clone();
        slot.decision = request.decision.into();
        slot.approver = Some(request.actor.id.clone());
        slot.comments = request.comments.clone();
        slot.decided_at = Some(now);

        let mut order = order.clone();
        order.updated_at = Some(now);

        let slots_after: Vec<ApprovalSlot> = snapshot
            .slots
            .iter()
            .map(|existing| if existing.id == slot.id { slot.clone() } else { existing.clone() })
            .collect();
        order.approval_status = derive_approval_status(&slots_after, &required);
        match order.approval_status {
            ApprovalStatus::Rejected => order.status = OrderStatus::Rejected,
            ApprovalStatus::FinallyApproved => {
                order.status = OrderStatus::Approved;
                order.approved_at = Some(now);
            }
            ApprovalStatus::AwaitingLevel(_) => {}
            ApprovalStatus::Pending => {
                return Err(WorkflowError::PlanIntegrity {
                    order_id: order.id.clone(),
                    detail: "no required levels for a planned order".to_owned(),
                });
            }
        }

        Ok(DecisionOutcome { order, slot })
    }

    pub fn apply_decision_with_audit<S>(
        &self,
        snapshot: &OrderSnapshot,
        request: &DecisionRequest,
        now: DateTime<Utc>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<DecisionOutcome, WorkflowError>
    where
        S: AuditSink,
    {
        let result = self.apply_decision(snapshot, request, now);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "approval.decision_applied",
                        AuditCategory::Workflow,
                        AuditOutcome::Success,
                    )
                    .with_metadata("level", outcome.slot.level.number().to_string())
                    .with_metadata("decision", outcome.slot.decision.as_str())
                    .with_metadata("from", snapshot.order.approval_status.to_string())
                    .with_metadata("to", outcome.order.approval_status.to_string()),
                );
            }
            Err(error) => {
                let (category, outcome) = match error {
                    WorkflowError::Unauthorized { .. } => {
                        (AuditCategory::Authorization, AuditOutcome::Rejected)
                    }
                    WorkflowError::PlanIntegrity { .. } => {
                        (AuditCategory::Workflow, AuditOutcome::Failed)
                    }
                    _ => (AuditCategory::Workflow, AuditOutcome::Rejected),
                };
                sink.emit(
                    AuditEvent::new(audit, "approval.decision_rejected", category, outcome)
                        .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }

    /// [`Self::create_plan`] stamped with the current time.
    pub fn plan(&self, order: Order) -> OrderSnapshot {
        self.create_plan(order, Utc::now())
    }

    /// [`Self::apply_decision`] stamped with the current time.
    pub fn decide(
        &self,
        snapshot: &OrderSnapshot,
        request: &DecisionRequest,
    ) -> Result<DecisionOutcome, WorkflowError> {
        self.apply_decision(snapshot, request, Utc::now())
    }

    /// An order may be removed only before anyone has decided on it.
    pub fn can_delete(&self, snapshot: &OrderSnapshot) -> bool {
        snapshot.order.status == OrderStatus::Pending
            && !snapshot.order.approval_status.is_terminal()
            && !snapshot.has_decisions()
    }
}

fn verify_plan(snapshot: &OrderSnapshot, required: &[AdminLevel]) -> Result<(), WorkflowError> {
    let order_id = &snapshot.order.id;
    let corrupt =
        |detail: String| WorkflowError::PlanIntegrity { order_id: order_id.clone(), detail };

    if let Some(foreign) = snapshot.slots.iter().find(|slot| &slot.order_id != order_id) {
        return Err(corrupt(format!(
            "slot `{}` belongs to order `{}`",
            foreign.id.0, foreign.order_id
        )));
    }

    let mut seen = BTreeSet::new();
    for slot in &snapshot.slots {
        if !seen.insert(slot.level) {
            return Err(corrupt(format!("duplicate slot for {}", slot.level)));
        }
        if !required.contains(&slot.level) {
            return Err(corrupt(format!("unexpected slot for {}", slot.level)));
        }
    }

    if let Some(missing) = required.iter().find(|level| !seen.contains(*level)) {
        return Err(corrupt(format!("missing slot for {missing}")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use crate::audit::{AuditCategory, AuditContext, AuditOutcome, InMemoryAuditSink};
    use crate::domain::actor::{Actor, ActorId, ActorRole};
    use crate::domain::approval::{AdminLevel, Decision, SlotDecision};
    use crate::domain::order::{ApprovalStatus, Order, OrderId, OrderSnapshot, OrderStatus};
    use crate::flows::engine::{ApprovalWorkflow, WorkflowError};
    use crate::flows::states::DecisionRequest;

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid timestamp")
    }

    fn planned(amount: i64) -> OrderSnapshot {
        let order = Order::submitted(
            OrderId(format!("ord-{amount}")),
            format!("PO-{amount}"),
            "test order",
            ActorId("u-requester".to_owned()),
            Decimal::new(amount, 0),
            t0(),
        );
        ApprovalWorkflow::default().create_plan(order, t0())
    }

    fn admin(level: AdminLevel) -> Actor {
        Actor::admin(format!("admin-{}", level.number()), level)
    }

    fn decide(
        snapshot: &OrderSnapshot,
        level: AdminLevel,
        decision: Decision,
    ) -> Result<OrderSnapshot, WorkflowError> {
        let outcome = ApprovalWorkflow::default().apply_decision(
            snapshot,
            &DecisionRequest::new(admin(level), decision),
            t0() + Duration::minutes(5),
        )?;
        Ok(outcome.apply_to(snapshot))
    }

    #[test]
    fn plan_creates_one_pending_slot_per_required_level() {
        let snapshot = planned(8_000);

        let levels: Vec<AdminLevel> = snapshot.slots.iter().map(|slot| slot.level).collect();
        assert_eq!(levels, vec![AdminLevel::One, AdminLevel::Two, AdminLevel::Three]);
        assert!(snapshot.slots.iter().all(|slot| slot.decision == SlotDecision::Pending));
        assert!(snapshot.slots.iter().all(|slot| slot.approver.is_none()));
        assert_eq!(snapshot.order.approval_status, ApprovalStatus::AwaitingLevel(AdminLevel::One));
        assert_eq!(snapshot.order.status, OrderStatus::Pending);
    }

    #[test]
    fn single_level_order_is_finally_approved_by_level_one() {
        let snapshot = decide(&planned(300), AdminLevel::One, Decision::Approved)
            .expect("level 1 approves");

        assert_eq!(snapshot.order.approval_status, ApprovalStatus::FinallyApproved);
        assert_eq!(snapshot.order.status, OrderStatus::Approved);
        assert_eq!(snapshot.order.approved_at, Some(t0() + Duration::minutes(5)));
    }

    #[test]
    fn two_level_order_waits_for_level_two() {
        let after_first = decide(&planned(1_500), AdminLevel::One, Decision::Approved)
            .expect("level 1 approves");
        assert_eq!(
            after_first.order.approval_status,
            ApprovalStatus::AwaitingLevel(AdminLevel::Two)
        );
        assert_eq!(after_first.order.status, OrderStatus::Pending);
        assert!(after_first.order.approved_at.is_none());

        let after_second =
            decide(&after_first, AdminLevel::Two, Decision::Approved).expect("level 2 approves");
        assert_eq!(after_second.order.approval_status, ApprovalStatus::FinallyApproved);
        assert_eq!(after_second.order.status, OrderStatus::Approved);
    }

    #[test]
    fn out_of_sequence_approval_reports_smallest_unapproved_level() {
        let after_top = decide(&planned(8_000), AdminLevel::Three, Decision::Approved)
            .expect("level 3 may approve first");

        assert_eq!(after_top.order.approval_status, ApprovalStatus::AwaitingLevel(AdminLevel::One));
        assert_ne!(after_top.order.approval_status, ApprovalStatus::AwaitingLevel(AdminLevel::Two));

        let after_first =
            decide(&after_top, AdminLevel::One, Decision::Approved).expect("level 1 approves");
        assert_eq!(
            after_first.order.approval_status,
            ApprovalStatus::AwaitingLevel(AdminLevel::Two)
        );

        let done = decide(&after_first, AdminLevel::Two, Decision::Approved).expect("level 2");
        assert_eq!(done.order.approval_status, ApprovalStatus::FinallyApproved);
    }

    #[test]
    fn late_lower_level_approval_moves_to_next_gap() {
        let after_two = decide(&planned(8_000), AdminLevel::Two, Decision::Approved)
            .expect("level 2 approves");
        assert_eq!(after_two.order.approval_status, ApprovalStatus::AwaitingLevel(AdminLevel::One));

        let after_one =
            decide(&after_two, AdminLevel::One, Decision::Approved).expect("level 1 approves");
        assert_eq!(
            after_one.order.approval_status,
            ApprovalStatus::AwaitingLevel(AdminLevel::Three)
        );
    }

    #[test]
    fn rejection_is_terminal_and_freezes_the_order() {
        let rejected = decide(&planned(1_500), AdminLevel::One, Decision::Rejected)
            .expect("level 1 rejects");
        assert_eq!(rejected.order.approval_status, ApprovalStatus::Rejected);
        assert_eq!(rejected.order.status, OrderStatus::Rejected);
        assert!(rejected.order.approved_at.is_none());

        let error = decide(&rejected, AdminLevel::Two, Decision::Approved)
            .expect_err("order is frozen after rejection");
        assert!(matches!(error, WorkflowError::OrderClosed { .. }));

        let error = decide(&rejected, AdminLevel::One, Decision::Approved)
            .expect_err("rejected slot cannot be re-decided");
        assert_eq!(
            error,
            WorkflowError::AlreadyDecided {
                level: AdminLevel::One,
                decision: SlotDecision::Rejected
            }
        );
    }

    #[test]
    fn rejection_by_higher_level_leaves_other_slots_untouched() {
        let snapshot = planned(8_000);
        let rejected =
            decide(&snapshot, AdminLevel::Three, Decision::Rejected).expect("level 3 rejects");

        assert_eq!(rejected.order.approval_status, ApprovalStatus::Rejected);
        assert_eq!(rejected.slots[0], snapshot.slots[0]);
        assert_eq!(rejected.slots[1], snapshot.slots[1]);
    }

    #[test]
    fn redeciding_a_slot_fails_and_leaves_state_unchanged() {
        let approved = decide(&planned(1_500), AdminLevel::One, Decision::Approved)
            .expect("level 1 approves");
        let before = approved.clone();

        let error = ApprovalWorkflow::default()
            .apply_decision(
                &approved,
                &DecisionRequest::new(admin(AdminLevel::One), Decision::Rejected),
                t0() + Duration::hours(1),
            )
            .expect_err("second decision must fail");

        assert_eq!(
            error,
            WorkflowError::AlreadyDecided {
                level: AdminLevel::One,
                decision: SlotDecision::Approved
            }
        );
        assert_eq!(approved, before);
    }

    #[test]
    fn finally_approved_order_reports_already_decided() {
        let done =
            decide(&planned(200), AdminLevel::One, Decision::Approved).expect("level 1 approves");
        let error =
            decide(&done, AdminLevel::One, Decision::Approved).expect_err("already approved");
        assert!(matches!(error, WorkflowError::AlreadyDecided { .. }));
    }

    #[test]
    fn level_two_admin_cannot_decide_single_level_order() {
        let error = decide(&planned(300), AdminLevel::Two, Decision::Approved)
            .expect_err("no level 2 slot exists");

        assert_eq!(
            error,
            WorkflowError::InvalidLevel { level: AdminLevel::Two, required: vec![AdminLevel::One] }
        );
    }

    #[test]
    fn level_two_admin_only_touches_level_two_slot() {
        let snapshot = planned(1_500);
        let outcome = ApprovalWorkflow::default()
            .apply_decision(
                &snapshot,
                &DecisionRequest::new(admin(AdminLevel::Two), Decision::Approved)
                    .with_comments("budget confirmed"),
                t0(),
            )
            .expect("level 2 decides its own slot");

        assert_eq!(outcome.slot.level, AdminLevel::Two);
        assert_eq!(outcome.slot.approver, Some(ActorId("admin-2".to_owned())));
        assert_eq!(outcome.slot.comments.as_deref(), Some("budget confirmed"));
        assert_eq!(outcome.slot.decided_at, Some(t0()));
        assert_eq!(outcome.order.approval_status, ApprovalStatus::AwaitingLevel(AdminLevel::One));
    }

    #[test]
    fn standard_actor_is_unauthorized() {
        let actor = Actor {
            id: ActorId("u-std".to_owned()),
            role: ActorRole::Standard,
            admin_level: Some(AdminLevel::One),
        };
        let snapshot = planned(100);
        let error = ApprovalWorkflow::default()
            .apply_decision(&snapshot, &DecisionRequest::new(actor, Decision::Approved), t0())
            .expect_err("standard users cannot decide");

        assert!(matches!(error, WorkflowError::Unauthorized { .. }));
    }

    #[test]
    fn actor_without_level_is_unauthorized() {
        let snapshot = planned(100);
        let error = ApprovalWorkflow::default()
            .apply_decision(
                &snapshot,
                &DecisionRequest::new(Actor::standard("u-plain"), Decision::Approved),
                t0(),
            )
            .expect_err("no level to act with");

        assert!(matches!(error, WorkflowError::Unauthorized { .. }));
    }

    #[test]
    fn missing_slot_is_a_fatal_plan_integrity_error() {
        let mut snapshot = planned(1_500);
        snapshot.slots.retain(|slot| slot.level == AdminLevel::One);

        let error = decide(&snapshot, AdminLevel::One, Decision::Approved)
            .expect_err("plan is missing level 2");

        assert!(error.is_fatal());
        assert!(error.to_string().contains("missing slot for Level 2"));
    }

    #[test]
    fn duplicate_slot_is_a_plan_integrity_error() {
        let mut snapshot = planned(300);
        let duplicate = snapshot.slots[0].clone();
        snapshot.slots.push(duplicate);

        let error = decide(&snapshot, AdminLevel::One, Decision::Approved)
            .expect_err("duplicate slot");
        assert!(matches!(error, WorkflowError::PlanIntegrity { .. }));
    }

    #[test]
    fn only_undecided_pending_orders_can_be_deleted() {
        let workflow = ApprovalWorkflow::default();
        let snapshot = planned(1_500);
        assert!(workflow.can_delete(&snapshot));

        let partially =
            decide(&snapshot, AdminLevel::One, Decision::Approved).expect("level 1 approves");
        assert!(!workflow.can_delete(&partially));
    }

    #[test]
    fn audited_decisions_emit_success_and_rejection_events() {
        let workflow = ApprovalWorkflow::default();
        let sink = InMemoryAuditSink::default();
        let snapshot = planned(300);
        let context = AuditContext::new(Some(snapshot.order.id.clone()), "req-7", "admin-1");

        let outcome = workflow
            .apply_decision_with_audit(
                &snapshot,
                &DecisionRequest::new(admin(AdminLevel::One), Decision::Approved),
                t0(),
                &sink,
                &context,
            )
            .expect("approve");
        let _ = workflow.apply_decision_with_audit(
            &outcome.apply_to(&snapshot),
            &DecisionRequest::new(admin(AdminLevel::Three), Decision::Approved),
            t0(),
            &sink,
            &context,
        );

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "approval.decision_applied");
        assert_eq!(events[0].metadata.get("to").map(String::as_str), Some("FinallyApproved"));
        assert_eq!(events[1].event_type, "approval.decision_rejected");
        assert_eq!(events[1].outcome, AuditOutcome::Rejected);
        assert_eq!(events[1].category, AuditCategory::Workflow);
    }

    #[test]
    fn clock_stamped_wrappers_record_decision_time() {
        let workflow = ApprovalWorkflow::default();
        let order = Order::submitted(
            OrderId("ord-now".to_owned()),
            "PO-now",
            "",
            ActorId("u-requester".to_owned()),
            Decimal::new(900, 0),
            t0(),
        );
        let snapshot = workflow.plan(order);
        let outcome = workflow
            .decide(&snapshot, &DecisionRequest::new(admin(AdminLevel::One), Decision::Approved))
            .expect("approve level one");

        assert!(outcome.slot.decided_at.is_some_and(|at| at > t0()));
        assert_eq!(outcome.order.approval_status, ApprovalStatus::AwaitingLevel(AdminLevel::Two));
    }
}
