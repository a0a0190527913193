use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use common::time::now_ms;
use corelib::{UserId, UserProfile};

use super::UserDirectory;
use crate::row::{get_id, map_rows};

pub struct SqliteUserDirectory {
    pool: SqlitePool,
}

impl SqliteUserDirectory {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    /// INSERT OR UPDATE: new users are inserted, known ids get their public
    /// fields refreshed.
    async fn upsert(&self, profile: &UserProfile) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO users (id, name, email, created_at_ms)
VALUES (?, ?, ?, ?)
ON CONFLICT(id) DO UPDATE SET
  name = excluded.name,
  email = excluded.email;
"#,
        )
        .bind(profile.id.to_string())
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, user_id: UserId) -> anyhow::Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT id, name, email FROM users WHERE id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_profile).transpose()
    }

    async fn profiles(&self, user_ids: &[UserId]) -> anyhow::Result<HashMap<UserId, UserProfile>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, name, email FROM users WHERE id IN (");
        let mut ids = qb.separated(", ");
        for id in user_ids {
            ids.push_bind(id.to_string());
        }
        ids.push_unseparated(")");

        let rows = qb.build().fetch_all(&self.pool).await?;

        Ok(map_rows(rows, "user", row_to_profile)
            .into_iter()
            .map(|p| (p.id, p))
            .collect())
    }
}

fn row_to_profile(r: &SqliteRow) -> anyhow::Result<UserProfile> {
    Ok(UserProfile {
        id: get_id(r, "id")?,
        name: r.try_get("name")?,
        email: r.try_get("email")?,
    })
}
