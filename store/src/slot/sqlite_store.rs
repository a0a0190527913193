//! SQLite-backed `SlotStore`.
//!
//! Every mutation is a single `UPDATE`/`DELETE` whose `WHERE` clause carries
//! the full precondition, so the check and the write are one atomic step in
//! the engine. No method reads a row and then writes it back.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use common::logger::warn_if_slow;
use common::time::now_ms;
use corelib::{Slot, SlotDetails, SlotId, SlotStatus, UserId};

use super::{LinkCondition, SlotStore, SlotTransition};
use crate::row::{get_id, get_opt_id, get_time, map_rows};

const SLOT_COLUMNS: &str = "id, owner_id, title, start_ms, end_ms, status, swap_request_id, \
                            created_at_ms, updated_at_ms";

pub struct SqliteSlotStore {
    pool: SqlitePool,
}

impl SqliteSlotStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_where(&self, clause: &str, binds: &[String]) -> anyhow::Result<Vec<Slot>> {
        let sql = format!("SELECT {SLOT_COLUMNS} FROM slots WHERE {clause} ORDER BY start_ms, id");
        let mut q = sqlx::query(&sql);
        for b in binds {
            q = q.bind(b.as_str());
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(map_rows(rows, "slot", row_to_slot))
    }
}

#[async_trait]
impl SlotStore for SqliteSlotStore {
    async fn insert(&self, slot: &Slot) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO slots (
  id, owner_id, title, start_ms, end_ms, status, swap_request_id,
  created_at_ms, updated_at_ms
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(slot.id.to_string())
        .bind(slot.owner_id.to_string())
        .bind(&slot.title)
        .bind(slot.start_time.timestamp_millis())
        .bind(slot.end_time.timestamp_millis())
        .bind(slot.status.as_str())
        .bind(slot.swap_request_id.map(|r| r.to_string()))
        .bind(slot.created_at_ms)
        .bind(slot.updated_at_ms)
        .execute(&self.pool)
        .await
        .with_context(|| format!("insert slot {}", slot.id))?;

        Ok(())
    }

    async fn get(&self, slot_id: SlotId) -> anyhow::Result<Option<Slot>> {
        let sql = format!("SELECT {SLOT_COLUMNS} FROM slots WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(slot_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_slot).transpose()
    }

    async fn get_many(&self, slot_ids: &[SlotId]) -> anyhow::Result<Vec<Slot>> {
        if slot_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {SLOT_COLUMNS} FROM slots WHERE id IN ("));
        let mut ids = qb.separated(", ");
        for id in slot_ids {
            ids.push_bind(id.to_string());
        }
        ids.push_unseparated(")");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(map_rows(rows, "slot", row_to_slot))
    }

    async fn list_for_owner(&self, owner_id: UserId) -> anyhow::Result<Vec<Slot>> {
        self.fetch_where("owner_id = ?", &[owner_id.to_string()]).await
    }

    async fn list_by_status(&self, status: SlotStatus) -> anyhow::Result<Vec<Slot>> {
        self.fetch_where("status = ?", &[status.as_str().to_string()]).await
    }

    async fn swappable_excluding(&self, user_id: UserId) -> anyhow::Result<Vec<Slot>> {
        warn_if_slow("db_swappable_excluding", Duration::from_millis(200), async {
            self.fetch_where(
                "status = ? AND owner_id <> ?",
                &[
                    SlotStatus::Swappable.as_str().to_string(),
                    user_id.to_string(),
                ],
            )
            .await
        })
        .await
    }

    async fn find_owned(
        &self,
        slot_id: SlotId,
        owner_id: UserId,
        status: SlotStatus,
    ) -> anyhow::Result<Option<Slot>> {
        let sql = format!(
            "SELECT {SLOT_COLUMNS} FROM slots WHERE id = ? AND owner_id = ? AND status = ?"
        );
        let row = sqlx::query(&sql)
            .bind(slot_id.to_string())
            .bind(owner_id.to_string())
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_slot).transpose()
    }

    async fn transition(&self, slot_id: SlotId, t: &SlotTransition) -> anyhow::Result<bool> {
        anyhow::ensure!(
            t.is_well_formed(),
            "malformed slot transition: {:?} with link {:?}",
            t.status,
            t.link
        );

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE slots SET status = ");
        qb.push_bind(t.status.as_str());
        if let Some(owner) = t.owner {
            qb.push(", owner_id = ").push_bind(owner.to_string());
        }
        qb.push(", swap_request_id = ")
            .push_bind(t.link.map(|r| r.to_string()));
        qb.push(", updated_at_ms = ").push_bind(now_ms());

        qb.push(" WHERE id = ").push_bind(slot_id.to_string());
        qb.push(" AND status = ").push_bind(t.expect_status.as_str());
        if let Some(owner) = t.expect_owner {
            qb.push(" AND owner_id = ").push_bind(owner.to_string());
        }
        match t.expect_link {
            LinkCondition::Unlinked => {
                qb.push(" AND swap_request_id IS NULL");
            }
            LinkCondition::Held(r) => {
                qb.push(" AND swap_request_id = ").push_bind(r.to_string());
            }
        }

        let res = warn_if_slow("db_slot_transition", Duration::from_millis(50), async {
            qb.build().execute(&self.pool).await
        })
        .await
        .with_context(|| format!("slot transition {slot_id}"))?;

        Ok(res.rows_affected() == 1)
    }

    async fn update_details(
        &self,
        slot_id: SlotId,
        owner_id: UserId,
        details: &SlotDetails,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
UPDATE slots
SET title = ?, start_ms = ?, end_ms = ?, updated_at_ms = ?
WHERE id = ? AND owner_id = ? AND status <> 'SWAP_PENDING';
"#,
        )
        .bind(&details.title)
        .bind(details.start_time.timestamp_millis())
        .bind(details.end_time.timestamp_millis())
        .bind(now_ms())
        .bind(slot_id.to_string())
        .bind(owner_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() == 1)
    }

    async fn delete(&self, slot_id: SlotId, owner_id: UserId) -> anyhow::Result<bool> {
        let res = sqlx::query(
            "DELETE FROM slots WHERE id = ? AND owner_id = ? AND status <> 'SWAP_PENDING'",
        )
        .bind(slot_id.to_string())
        .bind(owner_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() == 1)
    }
}

fn row_to_slot(r: &SqliteRow) -> anyhow::Result<Slot> {
    use sqlx::Row;

    let status_str: String = r.try_get("status")?;
    let status = status_str.parse::<SlotStatus>()?;

    Ok(Slot {
        id: get_id(r, "id")?,
        owner_id: get_id(r, "owner_id")?,
        title: r.try_get("title")?,
        start_time: get_time(r, "start_ms")?,
        end_time: get_time(r, "end_ms")?,
        status,
        swap_request_id: get_opt_id(r, "swap_request_id")?,
        created_at_ms: r.try_get("created_at_ms")?,
        updated_at_ms: r.try_get("updated_at_ms")?,
    })
}
