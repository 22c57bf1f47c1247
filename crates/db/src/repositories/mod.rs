use async_trait::async_trait;
use thiserror::Error;

use orderflow_core::domain::actor::{Actor, ActorId};
use orderflow_core::domain::order::{Order, OrderId, OrderSnapshot, OrderStatus};
use orderflow_core::errors::ApplicationError;
use orderflow_core::flows::DecisionOutcome;

pub mod actor;
pub mod memory;
pub mod order;

pub use actor::SqlActorRepository;
pub use memory::{InMemoryActorRepository, InMemoryOrderRepository};
pub use order::SqlOrderRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("order `{order_id}` changed since version {expected_version}")]
    Conflict { order_id: OrderId, expected_version: i64 },
    #[error("{entity} `{id}` already exists")]
    AlreadyExists { entity: &'static str, id: String },
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict { order_id, .. } => {
                ApplicationError::Conflict { order_id: order_id.0, attempts: 1 }
            }
            other => ApplicationError::Persistence(other.to_string()),
        }
    }
}

/// A stored value with the optimistic-lock version it was read at.
#[derive(Clone, Debug, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub limit: Option<u32>,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Stores a freshly planned order and all of its slots. The stored version starts at 1.
    async fn insert_plan(
        &self,
        snapshot: &OrderSnapshot,
    ) -> Result<Versioned<OrderSnapshot>, RepositoryError>;

    async fn load(
        &self,
        id: &OrderId,
    ) -> Result<Option<Versioned<OrderSnapshot>>, RepositoryError>;

    /// Newest first.
    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError>;

    /// Writes the changed order row and slot in one transaction, provided the order is still at
    /// `expected_version`. Returns the new version.
    async fn commit_decision(
        &self,
        outcome: &DecisionOutcome,
        expected_version: i64,
    ) -> Result<i64, RepositoryError>;

    /// Writes `order.description` and `order.updated_at`, provided the order is still at
    /// `expected_version`. Slots and workflow state are untouched. Returns the new version.
    async fn update_description(
        &self,
        order: &Order,
        expected_version: i64,
    ) -> Result<i64, RepositoryError>;

    /// Removes the order and its slots, provided it is still at `expected_version`.
    async fn delete(&self, id: &OrderId, expected_version: i64) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ActorRepository: Send + Sync {
    async fn find_by_id(&self, id: &ActorId) -> Result<Option<Actor>, RepositoryError>;
    async fn save(&self, actor: Actor) -> Result<(), RepositoryError>;
}
