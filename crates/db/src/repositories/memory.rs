use std::collections::HashMap;

use tokio::sync::RwLock;

use orderflow_core::domain::actor::{Actor, ActorId};
use orderflow_core::domain::order::{Order, OrderId, OrderSnapshot};
use orderflow_core::flows::DecisionOutcome;

use super::{ActorRepository, OrderFilter, OrderRepository, RepositoryError, Versioned};

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Versioned<OrderSnapshot>>>,
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert_plan(
        &self,
        snapshot: &OrderSnapshot,
    ) -> Result<Versioned<OrderSnapshot>, RepositoryError> {
        let mut orders = self.orders.write().await;
        let key = snapshot.order.id.0.clone();
        if orders.contains_key(&key) {
            return Err(RepositoryError::AlreadyExists { entity: "order", id: key });
        }
        let stored = Versioned { value: snapshot.clone(), version: 1 };
        orders.insert(key, stored.clone());
        Ok(stored)
    }

    async fn load(
        &self,
        id: &OrderId,
    ) -> Result<Option<Versioned<OrderSnapshot>>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut listed: Vec<Order> = orders
            .values()
            .map(|stored| stored.value.order.clone())
            .filter(|order| filter.status.map_or(true, |status| order.status == status))
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            listed.truncate(limit as usize);
        }
        Ok(listed)
    }

    async fn commit_decision(
        &self,
        outcome: &DecisionOutcome,
        expected_version: i64,
    ) -> Result<i64, RepositoryError> {
        let mut orders = self.orders.write().await;
        let conflict =
            || RepositoryError::Conflict { order_id: outcome.order.id.clone(), expected_version };

        let Some(stored) = orders.get_mut(&outcome.order.id.0) else {
            return Err(conflict());
        };
        if stored.version != expected_version {
            return Err(conflict());
        }
        let slot_is_pending = stored
            .value
            .slots
            .iter()
            .any(|slot| slot.id == outcome.slot.id && slot.decision.is_pending());
        if !slot_is_pending {
            return Err(conflict());
        }

        stored.value = outcome.apply_to(&stored.value);
        stored.version += 1;
        Ok(stored.version)
    }

    async fn update_description(
        &self,
        order: &Order,
        expected_version: i64,
    ) -> Result<i64, RepositoryError> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&order.id.0) {
            Some(stored) if stored.version == expected_version => {
                stored.value.order.description = order.description.clone();
                stored.value.order.updated_at = order.updated_at;
                stored.version += 1;
                Ok(stored.version)
            }
            _ => Err(RepositoryError::Conflict { order_id: order.id.clone(), expected_version }),
        }
    }

    async fn delete(&self, id: &OrderId, expected_version: i64) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        match orders.get(&id.0) {
            Some(stored) if stored.version == expected_version => {
                orders.remove(&id.0);
                Ok(())
            }
            _ => Err(RepositoryError::Conflict { order_id: id.clone(), expected_version }),
        }
    }
}

#[derive(Default)]
pub struct InMemoryActorRepository {
    actors: RwLock<HashMap<String, Actor>>,
}

#[async_trait::async_trait]
impl ActorRepository for InMemoryActorRepository {
    async fn find_by_id(&self, id: &ActorId) -> Result<Option<Actor>, RepositoryError> {
        let actors = self.actors.read().await;
        Ok(actors.get(&id.0).cloned())
    }

    async fn save(&self, actor: Actor) -> Result<(), RepositoryError> {
        let mut actors = self.actors.write().await;
        actors.insert(actor.id.0.clone(), actor);
        Ok(())
    }
}
