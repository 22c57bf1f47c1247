use thiserror::Error;

use crate::flows::WorkflowError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid admin level {0} (expected 1, 2 or 3)")]
    InvalidAdminLevel(i64),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("concurrent modification of order `{order_id}` after {attempts} attempts")]
    Conflict { order_id: String, attempts: u32 },
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl ApplicationError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "You are not authorized to act on this order.",
            Self::NotFound { .. } => "The requested record does not exist.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

const UNASSIGNED: &str = "unassigned";

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let message = value.to_string();
        let correlation_id = UNASSIGNED.to_owned();
        match value {
            ApplicationError::NotFound { .. } => Self::NotFound { message, correlation_id },
            ApplicationError::Workflow(WorkflowError::Unauthorized { .. }) => {
                Self::Forbidden { message, correlation_id }
            }
            ApplicationError::Workflow(WorkflowError::PlanIntegrity { .. })
            | ApplicationError::Domain(DomainError::InvariantViolation(_)) => {
                Self::Internal { message, correlation_id }
            }
            ApplicationError::Validation(_)
            | ApplicationError::Workflow(_)
            | ApplicationError::Domain(DomainError::InvalidAdminLevel(_)) => {
                Self::BadRequest { message, correlation_id }
            }
            ApplicationError::Conflict { .. } | ApplicationError::Persistence(_) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::approval::{AdminLevel, SlotDecision};
    use crate::domain::order::OrderId;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::flows::WorkflowError;

    #[test]
    fn missing_order_maps_to_not_found() {
        let interface = ApplicationError::not_found("order", "ord-9").into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::NotFound { ref correlation_id, ref message }
                if correlation_id == "req-1" && message.contains("ord-9")
        ));
    }

    #[test]
    fn already_decided_is_a_bad_request() {
        let interface = ApplicationError::from(WorkflowError::AlreadyDecided {
            level: AdminLevel::One,
            decision: SlotDecision::Approved,
        })
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn unauthorized_maps_to_forbidden() {
        let interface = ApplicationError::from(WorkflowError::Unauthorized {
            reason: "actor is not an admin".to_owned(),
        })
        .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::Forbidden { .. }));
    }

    #[test]
    fn broken_plan_maps_to_internal() {
        let interface = ApplicationError::from(WorkflowError::PlanIntegrity {
            order_id: OrderId("ord-1".to_owned()),
            detail: "missing slot for Level 2".to_owned(),
        })
        .into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn conflict_maps_to_service_unavailable() {
        let interface =
            ApplicationError::Conflict { order_id: "ord-1".to_owned(), attempts: 4 }
                .into_interface("req-5");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
    }

    #[test]
    fn invalid_admin_level_is_a_bad_request() {
        let interface =
            ApplicationError::from(DomainError::InvalidAdminLevel(7)).into_interface("req-6");
        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
    }
}
