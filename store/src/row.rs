/* =========================
Row mapping helpers
========================= */

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

pub(crate) fn get_id(r: &SqliteRow, col: &str) -> anyhow::Result<Uuid> {
    let raw: String = r.try_get(col)?;
    Uuid::parse_str(&raw).with_context(|| format!("invalid {col}: {raw}"))
}

pub(crate) fn get_opt_id(r: &SqliteRow, col: &str) -> anyhow::Result<Option<Uuid>> {
    let raw: Option<String> = r.try_get(col)?;
    raw.map(|s| Uuid::parse_str(&s).with_context(|| format!("invalid {col}: {s}")))
        .transpose()
}

pub(crate) fn get_time(r: &SqliteRow, col: &str) -> anyhow::Result<DateTime<Utc>> {
    let ms: i64 = r.try_get(col)?;
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("{col} out of range: {ms}"))
}

/// Maps a list of rows, skipping (and logging) rows that fail to decode so a
/// single poisoned row cannot hide every other record from a listing.
pub(crate) fn map_rows<T>(
    rows: Vec<SqliteRow>,
    kind: &'static str,
    f: impl Fn(&SqliteRow) -> anyhow::Result<T>,
) -> Vec<T> {
    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        match f(&r) {
            Ok(v) => out.push(v),
            Err(e) => {
                tracing::warn!(error = %e, kind, "skipping malformed row");
            }
        }
    }
    out
}
