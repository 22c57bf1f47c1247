use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use orderflow_core::audit::{AuditContext, AuditSink, InMemoryAuditSink, NoopAuditSink};
use orderflow_core::config::WorkflowConfig;
use orderflow_core::domain::actor::{Actor, ActorId, ActorRole};
use orderflow_core::domain::approval::{AdminLevel, ApprovalSlot, Decision};
use orderflow_core::domain::order::{Order, OrderId, OrderSnapshot};
use orderflow_core::errors::ApplicationError;
use orderflow_core::flows::{ApprovalWorkflow, DecisionRequest};
use orderflow_core::status::{ApprovalSummary, StatusReporter};

use crate::repositories::{
    ActorRepository, OrderFilter, OrderRepository, RepositoryError, Versioned,
};

pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Input for a new purchase order. The id and timestamps are assigned by the service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: String,
    pub description: String,
    pub amount: Decimal,
    pub requested_by: ActorId,
}

/// Everything a caller needs to render one order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
    pub order: Order,
    pub version: i64,
    pub slots: Vec<ApprovalSlot>,
    pub summary: ApprovalSummary,
}

/// Runs the approval workflow against storage, one atomic read-modify-write per order.
pub struct OrderApprovalService<O, A> {
    orders: O,
    actors: A,
    workflow: ApprovalWorkflow,
    reporter: StatusReporter,
    audit: Arc<dyn AuditSink>,
    max_conflict_retries: u32,
}

impl<O, A> OrderApprovalService<O, A>
where
    O: OrderRepository,
    A: ActorRepository,
{
    pub fn new(orders: O, actors: A) -> Self {
        Self {
            orders,
            actors,
            workflow: ApprovalWorkflow::default(),
            reporter: StatusReporter::default(),
            audit: Arc::new(NoopAuditSink),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    pub fn with_workflow_config(mut self, config: &WorkflowConfig) -> Self {
        self.max_conflict_retries = config.max_conflict_retries;
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn required_levels(&self, amount: Decimal) -> Vec<AdminLevel> {
        self.workflow.policy().required_levels(amount)
    }

    pub async fn register_actor(&self, actor: Actor) -> Result<(), ApplicationError> {
        if actor.id.0.trim().is_empty() {
            return Err(ApplicationError::Validation("actor id is required".to_owned()));
        }
        match (actor.role, actor.admin_level) {
            (ActorRole::Admin, None) => {
                return Err(ApplicationError::Validation(format!(
                    "admin actor `{}` requires an admin level",
                    actor.id.0
                )));
            }
            (ActorRole::Standard, Some(level)) => {
                return Err(ApplicationError::Validation(format!(
                    "standard actor `{}` cannot hold {level}",
                    actor.id.0
                )));
            }
            _ => {}
        }

        let actor_id = actor.id.0.clone();
        self.actors.save(actor).await?;
        info!(event_name = "actor.registered", actor_id = %actor_id, "actor registered");
        Ok(())
    }

    pub async fn create_order(&self, new_order: NewOrder) -> Result<OrderView, ApplicationError> {
        self.require_actor(&new_order.requested_by).await?;

        let order = Order::submitted(
            OrderId(Uuid::new_v4().to_string()),
            new_order.order_number.trim(),
            new_order.description,
            new_order.requested_by,
            new_order.amount,
            Utc::now(),
        );
        order.validate().map_err(|e| ApplicationError::Validation(e.to_string()))?;

        let snapshot = self.workflow.create_plan(order, Utc::now());
        let stored = self.orders.insert_plan(&snapshot).await?;

        info!(
            event_name = "order.created",
            order_id = %stored.value.order.id,
            amount = %stored.value.order.amount,
            approval_status = %stored.value.order.approval_status,
            required_levels = stored.value.slots.len(),
            "purchase order created with approval plan"
        );
        Ok(self.view(stored))
    }

    /// Applies one decision. A version conflict reloads the order and re-runs the whole
    /// validation, up to `max_conflict_retries` extra attempts.
    pub async fn submit_decision(
        &self,
        order_id: &OrderId,
        actor_id: &ActorId,
        decision: Decision,
        comments: Option<String>,
    ) -> Result<OrderView, ApplicationError> {
        let actor = self.require_actor(actor_id).await?;
        let correlation_id = Uuid::new_v4().to_string();
        let context = AuditContext::new(Some(order_id.clone()), &correlation_id, &actor_id.0);
        let mut request = DecisionRequest::new(actor, decision);
        request.comments = comments;

        let attempts = self.max_conflict_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let stored = self.load(order_id).await?;

            // Events are held back until the attempt is final so a lost race logs nothing.
            let attempt_sink = InMemoryAuditSink::default();
            let outcome = self.workflow.apply_decision_with_audit(
                &stored.value,
                &request,
                Utc::now(),
                &attempt_sink,
                &context,
            );
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(workflow_error) => {
                    self.forward(&attempt_sink);
                    if workflow_error.is_fatal() {
                        error!(
                            event_name = "order.decision.plan_corrupt",
                            correlation_id = %correlation_id,
                            order_id = %order_id,
                            error = %workflow_error,
                            "approval plan failed integrity check"
                        );
                    } else {
                        warn!(
                            event_name = "order.decision.refused",
                            correlation_id = %correlation_id,
                            order_id = %order_id,
                            actor_id = %actor_id.0,
                            error = %workflow_error,
                            "decision refused"
                        );
                    }
                    return Err(workflow_error.into());
                }
            };

            match self.orders.commit_decision(&outcome, stored.version).await {
                Ok(version) => {
                    self.forward(&attempt_sink);
                    info!(
                        event_name = "order.decision.applied",
                        correlation_id = %correlation_id,
                        order_id = %order_id,
                        actor_id = %actor_id.0,
                        level = %outcome.slot.level,
                        decision = %outcome.slot.decision,
                        from = %stored.value.order.approval_status,
                        to = %outcome.order.approval_status,
                        version,
                        attempt,
                        "decision applied"
                    );
                    let snapshot = outcome.apply_to(&stored.value);
                    return Ok(self.view(Versioned { value: snapshot, version }));
                }
                Err(RepositoryError::Conflict { .. }) => {
                    warn!(
                        event_name = "order.decision.conflict",
                        correlation_id = %correlation_id,
                        order_id = %order_id,
                        attempt,
                        max_attempts = attempts,
                        "order changed concurrently; retrying"
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(ApplicationError::Conflict { order_id: order_id.0.clone(), attempts })
    }

    pub async fn approval_summary(
        &self,
        order_id: &OrderId,
    ) -> Result<ApprovalSummary, ApplicationError> {
        let stored = self.load(order_id).await?;
        Ok(self.reporter.summarize(&stored.value))
    }

    pub async fn order_view(&self, order_id: &OrderId) -> Result<OrderView, ApplicationError> {
        let stored = self.load(order_id).await?;
        Ok(self.view(stored))
    }

    pub async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, ApplicationError> {
        Ok(self.orders.list(filter).await?)
    }

    /// Replaces the order's description. Workflow state is left alone, so this is allowed at
    /// any status. Concurrent changes are retried like decisions.
    pub async fn update_order(
        &self,
        order_id: &OrderId,
        description: impl Into<String>,
    ) -> Result<OrderView, ApplicationError> {
        let description = description.into();
        let attempts = self.max_conflict_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let stored = self.load(order_id).await?;

            let mut order = stored.value.order.clone();
            order.description = description.clone();
            order.updated_at = Some(Utc::now());
            order.validate().map_err(|e| ApplicationError::Validation(e.to_string()))?;

            match self.orders.update_description(&order, stored.version).await {
                Ok(version) => {
                    info!(
                        event_name = "order.updated",
                        order_id = %order_id,
                        version,
                        attempt,
                        "purchase order description updated"
                    );
                    let snapshot = OrderSnapshot::new(order, stored.value.slots);
                    return Ok(self.view(Versioned { value: snapshot, version }));
                }
                Err(RepositoryError::Conflict { .. }) => {
                    warn!(
                        event_name = "order.update.conflict",
                        order_id = %order_id,
                        attempt,
                        max_attempts = attempts,
                        "order changed concurrently; retrying"
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(ApplicationError::Conflict { order_id: order_id.0.clone(), attempts })
    }

    /// Deletes an order nobody has decided on yet.
    pub async fn delete_order(&self, order_id: &OrderId) -> Result<(), ApplicationError> {
        let stored = self.load(order_id).await?;
        if !self.workflow.can_delete(&stored.value) {
            return Err(ApplicationError::Validation(format!(
                "order `{order_id}` can only be deleted while pending and undecided"
            )));
        }

        match self.orders.delete(order_id, stored.version).await {
            Ok(()) => {
                info!(event_name = "order.deleted", order_id = %order_id, "purchase order deleted");
                Ok(())
            }
            Err(RepositoryError::Conflict { .. }) => {
                Err(ApplicationError::Conflict { order_id: order_id.0.clone(), attempts: 1 })
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn load(
        &self,
        order_id: &OrderId,
    ) -> Result<Versioned<OrderSnapshot>, ApplicationError> {
        self.orders
            .load(order_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("order", order_id.0.clone()))
    }

    async fn require_actor(&self, actor_id: &ActorId) -> Result<Actor, ApplicationError> {
        self.actors
            .find_by_id(actor_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("actor", actor_id.0.clone()))
    }

    fn view(&self, stored: Versioned<OrderSnapshot>) -> OrderView {
        let summary = self.reporter.summarize(&stored.value);
        let OrderSnapshot { order, slots } = stored.value;
        OrderView { order, version: stored.version, slots, summary }
    }

    fn forward(&self, attempt_sink: &InMemoryAuditSink) {
        for event in attempt_sink.events() {
            self.audit.emit(event);
        }
    }
}
