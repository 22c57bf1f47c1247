use std::str::FromStr;

use chrono::Utc;
use sqlx::Row;

use orderflow_core::domain::actor::{Actor, ActorId, ActorRole};
use orderflow_core::domain::approval::AdminLevel;

use super::{ActorRepository, RepositoryError};
use crate::DbPool;

pub struct SqlActorRepository {
    pool: DbPool,
}

impl SqlActorRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_actor(row: &sqlx::sqlite::SqliteRow) -> Result<Actor, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let role_str: String =
        row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let admin_level: Option<i64> =
        row.try_get("admin_level").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let role = ActorRole::from_str(&role_str).map_err(RepositoryError::Decode)?;
    let admin_level = admin_level
        .map(AdminLevel::try_from)
        .transpose()
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Actor { id: ActorId(id), role, admin_level })
}

#[async_trait::async_trait]
impl ActorRepository for SqlActorRepository {
    async fn find_by_id(&self, id: &ActorId) -> Result<Option<Actor>, RepositoryError> {
        let row = sqlx::query("SELECT id, role, admin_level FROM actor WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_actor(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, actor: Actor) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO actor (id, role, admin_level, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 role = excluded.role,
                 admin_level = excluded.admin_level",
        )
        .bind(&actor.id.0)
        .bind(actor.role.as_str())
        .bind(actor.admin_level.map(|level| i64::from(level.number())))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
