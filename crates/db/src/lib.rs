pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod service;

pub use connection::{connect_with_config, connect_with_settings, DbPool};
pub use repositories::{OrderFilter, RepositoryError, Versioned};
pub use service::{NewOrder, OrderApprovalService, OrderView};
