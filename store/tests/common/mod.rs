#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use corelib::{NewSlot, Slot, SlotDetails, SlotStatus, UserId};
use store::Db;

/// Fresh, private in-memory database with the schema applied.
pub async fn setup_db() -> Db {
    let db = Db::connect_in_memory().await.unwrap();
    db.migrate().await.unwrap();
    db
}

/// Database file under the temp dir behind a real multi-connection pool.
/// The file and its WAL side files are removed on drop.
pub struct FileDb {
    pub db: Db,
    path: PathBuf,
}

impl Drop for FileDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut p = self.path.clone().into_os_string();
            p.push(suffix);
            let _ = std::fs::remove_file(p);
        }
    }
}

pub async fn setup_file_db(max_connections: u32) -> FileDb {
    let path = std::env::temp_dir().join(format!("slotswap-{}.db", Uuid::new_v4()));
    let db = Db::connect(&format!("sqlite://{}", path.display()), max_connections)
        .await
        .unwrap();
    db.migrate().await.unwrap();
    FileDb { db, path }
}

pub fn details(title: &str, hour: u32) -> SlotDetails {
    let start = Utc.with_ymd_and_hms(2025, 6, 2, hour, 0, 0).unwrap();
    SlotDetails {
        title: title.to_string(),
        start_time: start,
        end_time: start + Duration::hours(1),
    }
}

pub fn mk_slot(owner: UserId, status: SlotStatus, hour: u32) -> Slot {
    let mut slot = Slot::create(
        Uuid::new_v4(),
        NewSlot {
            owner_id: owner,
            details: details("Shift", hour),
        },
        1_000,
    );
    slot.status = status;
    if status == SlotStatus::SwapPending {
        slot.swap_request_id = Some(Uuid::new_v4());
    }
    slot
}
