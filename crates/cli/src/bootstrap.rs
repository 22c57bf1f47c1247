use orderflow_core::config::{AppConfig, ConfigError, LoadOptions};
use orderflow_db::repositories::{SqlActorRepository, SqlOrderRepository};
use orderflow_db::{connect_with_config, migrations, DbPool, OrderApprovalService};
use thiserror::Error;
use tracing::info;

pub type SqlApprovalService = OrderApprovalService<SqlOrderRepository, SqlActorRepository>;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: SqlApprovalService,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

impl BootstrapError {
    /// Error class and process exit code reported by every command.
    pub fn classify(&self) -> (&'static str, u8) {
        match self {
            Self::Config(_) => ("config_validation", 2),
            Self::DatabaseConnect(_) => ("db_connectivity", 4),
            Self::Migration(_) => ("migration", 5),
        }
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        max_connections = config.database.max_connections,
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let service = OrderApprovalService::new(
        SqlOrderRepository::new(db_pool.clone()),
        SqlActorRepository::new(db_pool.clone()),
    )
    .with_workflow_config(&config.workflow);

    Ok(Application { config, db_pool, service })
}
