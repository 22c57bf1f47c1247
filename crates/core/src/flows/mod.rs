pub mod engine;
pub mod states;

pub use engine::{ApprovalWorkflow, WorkflowError};
pub use states::{derive_approval_status, DecisionOutcome, DecisionRequest};
