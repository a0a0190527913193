use anyhow::Context;
use sqlx::SqlitePool;

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    // Users
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS users (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  email TEXT NOT NULL,
  created_at_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await
    .context("create users")?;

    // Slots
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS slots (
  id TEXT PRIMARY KEY,
  owner_id TEXT NOT NULL,
  title TEXT NOT NULL,
  start_ms BIGINT NOT NULL,
  end_ms BIGINT NOT NULL,
  status TEXT NOT NULL CHECK (status IN ('BUSY', 'SWAPPABLE', 'SWAP_PENDING')),
  swap_request_id TEXT,
  created_at_ms BIGINT NOT NULL,
  updated_at_ms BIGINT NOT NULL,
  CHECK ((status = 'SWAP_PENDING') = (swap_request_id IS NOT NULL))
);
"#,
    )
    .execute(pool)
    .await
    .context("create slots")?;

    // Swap requests
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS swap_requests (
  id TEXT PRIMARY KEY,
  requester_id TEXT NOT NULL,
  target_id TEXT NOT NULL,
  requester_slot_id TEXT NOT NULL,
  target_slot_id TEXT NOT NULL,
  status TEXT NOT NULL CHECK (status IN ('PENDING', 'ACCEPTED', 'REJECTED')),
  created_at_ms BIGINT NOT NULL,
  updated_at_ms BIGINT NOT NULL,
  CHECK (requester_id <> target_id)
);
"#,
    )
    .execute(pool)
    .await
    .context("create swap_requests")?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_slots_owner ON slots(owner_id);"#)
        .execute(pool)
        .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_slots_status ON slots(status);"#)
        .execute(pool)
        .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_swaps_target ON swap_requests(target_id);"#)
        .execute(pool)
        .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_swaps_requester ON swap_requests(requester_id);"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
