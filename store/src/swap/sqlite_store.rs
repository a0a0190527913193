use anyhow::Context;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use common::time::now_ms;
use corelib::{NewSwapRequest, RequestId, SwapRequest, SwapStatus, UserId};

use super::{SwapRequestStore, UserRequests};
use crate::row::{get_id, map_rows};

const SWAP_COLUMNS: &str = "id, requester_id, target_id, requester_slot_id, target_slot_id, \
                            status, created_at_ms, updated_at_ms";

/// SQLite-backed persistence for swap requests.
/// Responsible only for persistence and row mapping.
pub struct SqliteSwapStore {
    pool: SqlitePool,
}

impl SqliteSwapStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        binds: &[&str],
    ) -> anyhow::Result<Option<SwapRequest>> {
        let sql = format!("SELECT {SWAP_COLUMNS} FROM swap_requests WHERE {clause}");
        let mut q = sqlx::query(&sql);
        for b in binds {
            q = q.bind(*b);
        }
        let row = q.fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_request).transpose()
    }

    async fn fetch_all_where(&self, clause: &str, bind: &str) -> anyhow::Result<Vec<SwapRequest>> {
        let sql = format!(
            "SELECT {SWAP_COLUMNS} FROM swap_requests WHERE {clause} \
             ORDER BY created_at_ms DESC, id"
        );
        let rows = sqlx::query(&sql).bind(bind).fetch_all(&self.pool).await?;
        Ok(map_rows(rows, "swap_request", row_to_request))
    }
}

#[async_trait]
impl SwapRequestStore for SqliteSwapStore {
    async fn create(&self, request: &NewSwapRequest) -> anyhow::Result<SwapRequest> {
        let record = request.clone().into_pending(now_ms());

        sqlx::query(
            r#"
INSERT INTO swap_requests (
  id, requester_id, target_id, requester_slot_id, target_slot_id,
  status, created_at_ms, updated_at_ms
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(record.id.to_string())
        .bind(record.requester_id.to_string())
        .bind(record.target_id.to_string())
        .bind(record.requester_slot_id.to_string())
        .bind(record.target_slot_id.to_string())
        .bind(record.status.as_str())
        .bind(record.created_at_ms)
        .bind(record.updated_at_ms)
        .execute(&self.pool)
        .await
        .with_context(|| format!("insert swap request {}", record.id))?;

        Ok(record)
    }

    async fn get(&self, request_id: RequestId) -> anyhow::Result<Option<SwapRequest>> {
        self.fetch_one_where("id = ?", &[&request_id.to_string()]).await
    }

    async fn find_for_target(
        &self,
        request_id: RequestId,
        target_id: UserId,
    ) -> anyhow::Result<Option<SwapRequest>> {
        self.fetch_one_where(
            "id = ? AND target_id = ?",
            &[&request_id.to_string(), &target_id.to_string()],
        )
        .await
    }

    async fn find_pending_for_target(
        &self,
        request_id: RequestId,
        target_id: UserId,
    ) -> anyhow::Result<Option<SwapRequest>> {
        self.fetch_one_where(
            "id = ? AND target_id = ? AND status = ?",
            &[
                &request_id.to_string(),
                &target_id.to_string(),
                SwapStatus::Pending.as_str(),
            ],
        )
        .await
    }

    async fn set_status(&self, request_id: RequestId, status: SwapStatus) -> anyhow::Result<bool> {
        anyhow::ensure!(
            status.is_terminal(),
            "swap request {request_id} can only move to a terminal status, got {status}"
        );

        let res = sqlx::query(
            r#"
UPDATE swap_requests
SET status = ?, updated_at_ms = ?
WHERE id = ? AND status = 'PENDING';
"#,
        )
        .bind(status.as_str())
        .bind(now_ms())
        .bind(request_id.to_string())
        .execute(&self.pool)
        .await
        .with_context(|| format!("set status of swap request {request_id}"))?;

        Ok(res.rows_affected() == 1)
    }

    async fn list_for_user(&self, user_id: UserId) -> anyhow::Result<UserRequests> {
        let uid = user_id.to_string();
        let (incoming, outgoing) = tokio::try_join!(
            self.fetch_all_where("target_id = ?", &uid),
            self.fetch_all_where("requester_id = ?", &uid),
        )?;

        Ok(UserRequests { incoming, outgoing })
    }
}

fn row_to_request(r: &SqliteRow) -> anyhow::Result<SwapRequest> {
    let status_str: String = r.try_get("status")?;

    Ok(SwapRequest {
        id: get_id(r, "id")?,
        requester_id: get_id(r, "requester_id")?,
        target_id: get_id(r, "target_id")?,
        requester_slot_id: get_id(r, "requester_slot_id")?,
        target_slot_id: get_id(r, "target_slot_id")?,
        status: status_str.parse()?,
        created_at_ms: r.try_get("created_at_ms")?,
        updated_at_ms: r.try_get("updated_at_ms")?,
    })
}
