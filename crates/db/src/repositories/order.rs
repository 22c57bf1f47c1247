use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use orderflow_core::domain::actor::ActorId;
use orderflow_core::domain::approval::{AdminLevel, ApprovalSlot, ApprovalSlotId, SlotDecision};
use orderflow_core::domain::order::{ApprovalStatus, Order, OrderId, OrderSnapshot, OrderStatus};
use orderflow_core::flows::DecisionOutcome;

use super::{OrderFilter, OrderRepository, RepositoryError, Versioned};
use crate::DbPool;

const ORDER_COLUMNS: &str = "id, order_number, description, created_by, amount, status,
        approval_status, awaiting_level, version, created_at, updated_at, approved_at";

const SLOT_COLUMNS: &str =
    "id, order_id, admin_level, decision, approver_id, comments, created_at, decided_at";

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode<E: std::fmt::Display>(error: E) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|raw| parse_timestamp(column, &raw)).transpose()
}

fn parse_level(value: i64) -> Result<AdminLevel, RepositoryError> {
    AdminLevel::try_from(value).map_err(decode)
}

fn row_to_order(row: &sqlx::sqlite::SqliteRow) -> Result<(Order, i64), RepositoryError> {
    let id: String = row.try_get("id").map_err(decode)?;
    let order_number: String = row.try_get("order_number").map_err(decode)?;
    let description: String = row.try_get("description").map_err(decode)?;
    let created_by: String = row.try_get("created_by").map_err(decode)?;
    let amount_str: String = row.try_get("amount").map_err(decode)?;
    let status_str: String = row.try_get("status").map_err(decode)?;
    let approval_kind: String = row.try_get("approval_status").map_err(decode)?;
    let awaiting_level: Option<i64> = row.try_get("awaiting_level").map_err(decode)?;
    let version: i64 = row.try_get("version").map_err(decode)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode)?;
    let updated_at_str: Option<String> = row.try_get("updated_at").map_err(decode)?;
    let approved_at_str: Option<String> = row.try_get("approved_at").map_err(decode)?;

    let amount = Decimal::from_str(&amount_str)
        .map_err(|e| RepositoryError::Decode(format!("amount `{amount_str}`: {e}")))?;
    let awaiting_level = awaiting_level.map(parse_level).transpose()?;
    let approval_status =
        ApprovalStatus::from_parts(&approval_kind, awaiting_level).map_err(decode)?;

    let order = Order {
        id: OrderId(id),
        order_number,
        description,
        created_by: ActorId(created_by),
        amount,
        status: OrderStatus::from_str(&status_str).map_err(decode)?,
        approval_status,
        created_at: parse_timestamp("created_at", &created_at_str)?,
        updated_at: parse_optional_timestamp("updated_at", updated_at_str)?,
        approved_at: parse_optional_timestamp("approved_at", approved_at_str)?,
    };
    Ok((order, version))
}

fn row_to_slot(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalSlot, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode)?;
    let order_id: String = row.try_get("order_id").map_err(decode)?;
    let level: i64 = row.try_get("admin_level").map_err(decode)?;
    let decision_str: String = row.try_get("decision").map_err(decode)?;
    let approver_id: Option<String> = row.try_get("approver_id").map_err(decode)?;
    let comments: Option<String> = row.try_get("comments").map_err(decode)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode)?;
    let decided_at_str: Option<String> = row.try_get("decided_at").map_err(decode)?;

    Ok(ApprovalSlot {
        id: ApprovalSlotId(id),
        order_id: OrderId(order_id),
        level: parse_level(level)?,
        decision: SlotDecision::from_str(&decision_str).map_err(decode)?,
        approver: approver_id.map(ActorId),
        comments,
        created_at: parse_timestamp("created_at", &created_at_str)?,
        decided_at: parse_optional_timestamp("decided_at", decided_at_str)?,
    })
}

fn awaiting_level_column(status: &ApprovalStatus) -> Option<i64> {
    status.awaiting_level().map(|level| i64::from(level.number()))
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn insert_plan(
        &self,
        snapshot: &OrderSnapshot,
    ) -> Result<Versioned<OrderSnapshot>, RepositoryError> {
        let order = &snapshot.order;
        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchase_order WHERE id = ?")
            .bind(&order.id.0)
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Err(RepositoryError::AlreadyExists { entity: "order", id: order.id.0.clone() });
        }

        sqlx::query(
            "INSERT INTO purchase_order (id, order_number, description, created_by, amount, status,
                                         approval_status, awaiting_level, version, created_at,
                                         updated_at, approved_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?)",
        )
        .bind(&order.id.0)
        .bind(&order.order_number)
        .bind(&order.description)
        .bind(&order.created_by.0)
        .bind(order.amount.to_string())
        .bind(order.status.as_str())
        .bind(order.approval_status.kind())
        .bind(awaiting_level_column(&order.approval_status))
        .bind(order.created_at.to_rfc3339())
        .bind(order.updated_at.map(|dt| dt.to_rfc3339()))
        .bind(order.approved_at.map(|dt| dt.to_rfc3339()))
        .execute(&mut *tx)
        .await?;

        for slot in &snapshot.slots {
            sqlx::query(
                "INSERT INTO approval_slot (id, order_id, admin_level, decision, approver_id,
                                            comments, created_at, decided_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&slot.id.0)
            .bind(&slot.order_id.0)
            .bind(i64::from(slot.level.number()))
            .bind(slot.decision.as_str())
            .bind(slot.approver.as_ref().map(|actor| actor.0.as_str()))
            .bind(slot.comments.as_deref())
            .bind(slot.created_at.to_rfc3339())
            .bind(slot.decided_at.map(|dt| dt.to_rfc3339()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Versioned { value: snapshot.clone(), version: 1 })
    }

    async fn load(
        &self,
        id: &OrderId,
    ) -> Result<Option<Versioned<OrderSnapshot>>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM purchase_order WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let (order, version) = row_to_order(&row)?;

        let slot_rows = sqlx::query(&format!(
            "SELECT {SLOT_COLUMNS} FROM approval_slot WHERE order_id = ? ORDER BY admin_level ASC"
        ))
        .bind(&id.0)
        .fetch_all(&mut *tx)
        .await?;
        let slots = slot_rows.iter().map(row_to_slot).collect::<Result<Vec<_>, _>>()?;

        tx.commit().await?;
        Ok(Some(Versioned { value: OrderSnapshot::new(order, slots), version }))
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = filter.limit.map(i64::from).unwrap_or(-1);

        let rows: Vec<sqlx::sqlite::SqliteRow> = if let Some(status) = filter.status {
            sqlx::query(&format!(
                "SELECT {ORDER_COLUMNS} FROM purchase_order
                 WHERE status = ?
                 ORDER BY created_at DESC, id ASC
                 LIMIT ?"
            ))
            .bind(status.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {ORDER_COLUMNS} FROM purchase_order
                 ORDER BY created_at DESC, id ASC
                 LIMIT ?"
            ))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(|row| row_to_order(row).map(|(order, _)| order)).collect()
    }

    async fn commit_decision(
        &self,
        outcome: &DecisionOutcome,
        expected_version: i64,
    ) -> Result<i64, RepositoryError> {
        let order = &outcome.order;
        let slot = &outcome.slot;
        let conflict =
            || RepositoryError::Conflict { order_id: order.id.clone(), expected_version };

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE purchase_order
             SET status = ?, approval_status = ?, awaiting_level = ?, updated_at = ?,
                 approved_at = ?, version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(order.status.as_str())
        .bind(order.approval_status.kind())
        .bind(awaiting_level_column(&order.approval_status))
        .bind(order.updated_at.map(|dt| dt.to_rfc3339()))
        .bind(order.approved_at.map(|dt| dt.to_rfc3339()))
        .bind(&order.id.0)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(conflict());
        }

        let decided = sqlx::query(
            "UPDATE approval_slot
             SET decision = ?, approver_id = ?, comments = ?, decided_at = ?
             WHERE id = ? AND order_id = ? AND decision = 'pending'",
        )
        .bind(slot.decision.as_str())
        .bind(slot.approver.as_ref().map(|actor| actor.0.as_str()))
        .bind(slot.comments.as_deref())
        .bind(slot.decided_at.map(|dt| dt.to_rfc3339()))
        .bind(&slot.id.0)
        .bind(&order.id.0)
        .execute(&mut *tx)
        .await?;
        if decided.rows_affected() == 0 {
            return Err(conflict());
        }

        tx.commit().await?;
        Ok(expected_version + 1)
    }

    async fn update_description(
        &self,
        order: &Order,
        expected_version: i64,
    ) -> Result<i64, RepositoryError> {
        let updated = sqlx::query(
            "UPDATE purchase_order
             SET description = ?, updated_at = ?, version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(&order.description)
        .bind(order.updated_at.map(|dt| dt.to_rfc3339()))
        .bind(&order.id.0)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::Conflict { order_id: order.id.clone(), expected_version });
        }
        Ok(expected_version + 1)
    }

    async fn delete(&self, id: &OrderId, expected_version: i64) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM approval_slot
             WHERE order_id = (SELECT id FROM purchase_order WHERE id = ? AND version = ?)",
        )
        .bind(&id.0)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query("DELETE FROM purchase_order WHERE id = ? AND version = ?")
            .bind(&id.0)
            .bind(expected_version)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::Conflict { order_id: id.clone(), expected_version });
        }

        tx.commit().await?;
        Ok(())
    }
}
