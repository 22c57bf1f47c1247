pub mod actor;
pub mod config;
pub mod levels;
pub mod migrate;
pub mod order;

use std::future::Future;

use orderflow_core::config::LoadOptions;
use orderflow_core::errors::{ApplicationError, InterfaceError};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;
use uuid::Uuid;

use crate::bootstrap::{bootstrap, Application};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::ok(command, message.into(), None)
    }

    pub fn success_with_data<T: Serialize>(
        command: &str,
        message: impl Into<String>,
        data: &T,
    ) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self::ok(command, message.into(), Some(value)),
            Err(error) => Self::failure(command, "serialization", error.to_string(), 1),
        }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Maps a service error onto the interface taxonomy. The correlation id ties the
    /// printed payload to the structured log lines of the same invocation.
    pub fn from_application_error(command: &str, error: ApplicationError) -> Self {
        let correlation_id = Uuid::new_v4().to_string();
        let interface = error.into_interface(correlation_id.clone());
        let (error_class, exit_code) = match &interface {
            InterfaceError::BadRequest { .. } => ("bad_request", 6),
            InterfaceError::Forbidden { .. } => ("forbidden", 7),
            InterfaceError::NotFound { .. } => ("not_found", 8),
            InterfaceError::ServiceUnavailable { .. } => ("service_unavailable", 9),
            InterfaceError::Internal { .. } => ("internal", 10),
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: interface.to_string(),
            data: Some(serde_json::json!({
                "correlation_id": correlation_id,
                "hint": interface.user_message(),
            })),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn ok(command: &str, message: String, data: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message,
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }
}

/// A booted application plus the runtime that drives it, for one command invocation.
pub struct Session {
    runtime: Runtime,
    pub app: Application,
}

impl Session {
    pub fn open(command: &str, options: &LoadOptions) -> Result<Self, CommandResult> {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(error) => {
                return Err(CommandResult::failure(
                    command,
                    "runtime_init",
                    format!("failed to initialize async runtime: {error}"),
                    3,
                ));
            }
        };

        match runtime.block_on(bootstrap(options.clone())) {
            Ok(app) => Ok(Self { runtime, app }),
            Err(error) => {
                let (error_class, exit_code) = error.classify();
                Err(CommandResult::failure(command, error_class, error.to_string(), exit_code))
            }
        }
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn close(self) {
        self.runtime.block_on(self.app.db_pool.close());
    }
}

/// Opens a session, runs `action` against it, and closes the pool afterwards.
pub fn with_session<F>(command: &str, options: &LoadOptions, action: F) -> CommandResult
where
    F: FnOnce(&Session) -> CommandResult,
{
    let session = match Session::open(command, options) {
        Ok(session) => session,
        Err(result) => return result,
    };
    let result = action(&session);
    session.close();
    result
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            concat!(
                "{{\"command\":\"unknown\",\"status\":\"error\",",
                "\"error_class\":\"serialization\",\"message\":\"{}\"}}"
            ),
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

#[cfg(test)]
mod tests {
    use orderflow_core::errors::ApplicationError;
    use serde_json::Value;

    use super::CommandResult;

    fn parse(result: &CommandResult) -> Value {
        serde_json::from_str(&result.output).expect("command output should be valid JSON")
    }

    #[test]
    fn success_payload_omits_data_when_absent() {
        let result = CommandResult::success("migrate", "applied pending migrations");
        let payload = parse(&result);

        assert_eq!(result.exit_code, 0);
        assert_eq!(payload["status"], "ok");
        assert!(payload["error_class"].is_null());
        assert!(payload.get("data").is_none());
    }

    #[test]
    fn not_found_maps_to_its_own_exit_code() {
        let result = CommandResult::from_application_error(
            "order.status",
            ApplicationError::not_found("order", "ord-404"),
        );
        let payload = parse(&result);

        assert_eq!(result.exit_code, 8);
        assert_eq!(payload["error_class"], "not_found");
        assert_eq!(payload["data"]["hint"], "The requested record does not exist.");
        assert!(payload["message"].as_str().is_some_and(|m| m.contains("ord-404")));
    }

    #[test]
    fn conflict_is_reported_as_service_unavailable() {
        let result = CommandResult::from_application_error(
            "order.decide",
            ApplicationError::Conflict { order_id: "ord-1".to_owned(), attempts: 4 },
        );

        assert_eq!(result.exit_code, 9);
        assert_eq!(parse(&result)["error_class"], "service_unavailable");
    }
}
