use orderflow_core::config::LoadOptions;
use orderflow_core::domain::actor::{Actor, ActorId, ActorRole};
use orderflow_core::domain::approval::AdminLevel;

use crate::commands::{with_session, CommandResult};

pub fn add(options: &LoadOptions, id: &str, role: &str, level: Option<u8>) -> CommandResult {
    const COMMAND: &str = "actor.add";

    let role = match role.parse::<ActorRole>() {
        Ok(role) => role,
        Err(message) => return CommandResult::failure(COMMAND, "bad_request", message, 6),
    };
    let admin_level = match level.map(AdminLevel::try_from).transpose() {
        Ok(level) => level,
        Err(error) => {
            return CommandResult::failure(COMMAND, "bad_request", error.to_string(), 6);
        }
    };
    let actor = Actor { id: ActorId(id.trim().to_owned()), role, admin_level };

    with_session(COMMAND, options, |session| {
        match session.block_on(session.app.service.register_actor(actor.clone())) {
            Ok(()) => CommandResult::success_with_data(
                COMMAND,
                format!("registered actor `{}`", actor.id.0),
                &actor,
            ),
            Err(error) => CommandResult::from_application_error(COMMAND, error),
        }
    })
}
