use orderflow_core::config::LoadOptions;
use orderflow_db::migrations;
use serde::Serialize;

use crate::commands::{with_session, CommandResult};

#[derive(Debug, Serialize)]
struct MigrationReport {
    database_url: String,
    applied_versions: Vec<i64>,
}

/// Bootstrapping already applies pending migrations; this reports what the database holds.
pub fn run(options: &LoadOptions) -> CommandResult {
    with_session("migrate", options, |session| {
        let versions = session.block_on(migrations::applied_versions(&session.app.db_pool));
        match versions {
            Ok(applied_versions) => CommandResult::success_with_data(
                "migrate",
                "applied pending migrations",
                &MigrationReport {
                    database_url: session.app.config.database.url.clone(),
                    applied_versions,
                },
            ),
            Err(error) => CommandResult::failure("migrate", "migration", error.to_string(), 5),
        }
    })
}
