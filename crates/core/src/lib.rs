pub mod approvals;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod status;

pub use approvals::{
    required_levels, AmountBand, Authorization, AuthorizationGuard, ThresholdPolicy,
};
pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, NoopAuditSink};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::actor::{Actor, ActorId, ActorRole};
pub use domain::approval::{AdminLevel, ApprovalSlot, ApprovalSlotId, Decision, SlotDecision};
pub use domain::order::{ApprovalStatus, Order, OrderId, OrderSnapshot, OrderStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{
    derive_approval_status, ApprovalWorkflow, DecisionOutcome, DecisionRequest, WorkflowError,
};
pub use status::{ApprovalSummary, StatusReporter};
