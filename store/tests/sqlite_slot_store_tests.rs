mod common;

use std::sync::Arc;

use sqlx::Row;
use tokio::task::JoinSet;
use uuid::Uuid;

use common::{details, mk_slot, setup_db, setup_file_db};
use corelib::SlotStatus;
use store::{SlotStore, SlotTransition, SqliteSlotStore};

#[tokio::test]
async fn insert_and_get_round_trip() {
    let db = setup_db().await;
    let store = SqliteSlotStore::from_pool(db.pool.clone());

    let owner = Uuid::new_v4();
    let slot = mk_slot(owner, SlotStatus::Busy, 9);
    store.insert(&slot).await.unwrap();

    let loaded = store.get(slot.id).await.unwrap().unwrap();
    assert_eq!(loaded, slot);

    assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn swappable_excluding_hides_own_and_non_swappable() {
    let db = setup_db().await;
    let store = SqliteSlotStore::from_pool(db.pool.clone());

    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let a_swappable = mk_slot(a, SlotStatus::Swappable, 8);
    let b_swappable = mk_slot(b, SlotStatus::Swappable, 9);
    let b_busy = mk_slot(b, SlotStatus::Busy, 10);
    let b_pending = mk_slot(b, SlotStatus::SwapPending, 11);

    for s in [&a_swappable, &b_swappable, &b_busy, &b_pending] {
        store.insert(s).await.unwrap();
    }

    let visible = store.swappable_excluding(a).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, b_swappable.id);

    let for_b = store.swappable_excluding(b).await.unwrap();
    assert_eq!(for_b.len(), 1);
    assert_eq!(for_b[0].id, a_swappable.id);
}

#[tokio::test]
async fn find_owned_checks_owner_and_status() {
    let db = setup_db().await;
    let store = SqliteSlotStore::from_pool(db.pool.clone());

    let owner = Uuid::new_v4();
    let slot = mk_slot(owner, SlotStatus::Swappable, 9);
    store.insert(&slot).await.unwrap();

    assert!(store
        .find_owned(slot.id, owner, SlotStatus::Swappable)
        .await
        .unwrap()
        .is_some());
    assert!(store
        .find_owned(slot.id, Uuid::new_v4(), SlotStatus::Swappable)
        .await
        .unwrap()
        .is_none());
    assert!(store
        .find_owned(slot.id, owner, SlotStatus::Busy)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn reserve_then_transfer_moves_ownership() {
    let db = setup_db().await;
    let store = SqliteSlotStore::from_pool(db.pool.clone());

    let (a, b, r) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let slot = mk_slot(a, SlotStatus::Swappable, 9);
    store.insert(&slot).await.unwrap();

    assert!(store
        .transition(slot.id, &SlotTransition::reserve(a, r))
        .await
        .unwrap());
    let pending = store.get(slot.id).await.unwrap().unwrap();
    assert!(pending.is_reserved_by(r));

    assert!(store
        .transition(slot.id, &SlotTransition::transfer(r, a, b))
        .await
        .unwrap());
    let moved = store.get(slot.id).await.unwrap().unwrap();
    assert_eq!(moved.owner_id, b);
    assert_eq!(moved.status, SlotStatus::Busy);
    assert!(moved.swap_request_id.is_none());

    // Keyed by the request id: a replay finds nothing to do.
    assert!(!store
        .transition(slot.id, &SlotTransition::transfer(r, a, b))
        .await
        .unwrap());
    assert_eq!(store.get(slot.id).await.unwrap().unwrap().owner_id, b);
}

#[tokio::test]
async fn transition_on_missing_slot_is_not_applied() {
    let db = setup_db().await;
    let store = SqliteSlotStore::from_pool(db.pool.clone());

    let applied = store
        .transition(Uuid::new_v4(), &SlotTransition::release(Uuid::new_v4()))
        .await
        .unwrap();
    assert!(!applied);
}

#[tokio::test]
async fn release_requires_matching_link() {
    let db = setup_db().await;
    let store = SqliteSlotStore::from_pool(db.pool.clone());

    let owner = Uuid::new_v4();
    let slot = mk_slot(owner, SlotStatus::SwapPending, 9);
    let link = slot.swap_request_id.unwrap();
    store.insert(&slot).await.unwrap();

    assert!(!store
        .transition(slot.id, &SlotTransition::release(Uuid::new_v4()))
        .await
        .unwrap());
    assert!(store
        .transition(slot.id, &SlotTransition::release(link))
        .await
        .unwrap());

    let released = store.get(slot.id).await.unwrap().unwrap();
    assert_eq!(released.status, SlotStatus::Swappable);
    assert_eq!(released.owner_id, owner);
}

#[tokio::test]
async fn schema_rejects_pending_without_link() {
    let db = setup_db().await;
    let store = SqliteSlotStore::from_pool(db.pool.clone());

    let mut slot = mk_slot(Uuid::new_v4(), SlotStatus::SwapPending, 9);
    slot.swap_request_id = None;

    assert!(store.insert(&slot).await.is_err());
}

#[tokio::test]
async fn crud_refuses_swap_pending_rows() {
    let db = setup_db().await;
    let store = SqliteSlotStore::from_pool(db.pool.clone());

    let owner = Uuid::new_v4();
    let pending = mk_slot(owner, SlotStatus::SwapPending, 9);
    let busy = mk_slot(owner, SlotStatus::Busy, 10);
    store.insert(&pending).await.unwrap();
    store.insert(&busy).await.unwrap();

    let new_details = details("Renamed", 12);
    assert!(!store
        .update_details(pending.id, owner, &new_details)
        .await
        .unwrap());
    assert!(!store.delete(pending.id, owner).await.unwrap());

    assert!(store
        .update_details(busy.id, owner, &new_details)
        .await
        .unwrap());
    assert_eq!(
        store.get(busy.id).await.unwrap().unwrap().title,
        "Renamed"
    );

    assert!(!store.delete(busy.id, Uuid::new_v4()).await.unwrap());
    assert!(store.delete(busy.id, owner).await.unwrap());
    assert!(store.get(busy.id).await.unwrap().is_none());
    assert!(store.get(pending.id).await.unwrap().is_some());
}

#[tokio::test]
async fn get_many_and_listings() {
    let db = setup_db().await;
    let store = SqliteSlotStore::from_pool(db.pool.clone());

    let owner = Uuid::new_v4();
    let s1 = mk_slot(owner, SlotStatus::Busy, 9);
    let s2 = mk_slot(owner, SlotStatus::SwapPending, 8);
    let s3 = mk_slot(Uuid::new_v4(), SlotStatus::SwapPending, 7);
    for s in [&s1, &s2, &s3] {
        store.insert(s).await.unwrap();
    }

    let many = store
        .get_many(&[s1.id, s3.id, Uuid::new_v4()])
        .await
        .unwrap();
    assert_eq!(many.len(), 2);
    assert!(store.get_many(&[]).await.unwrap().is_empty());

    let mine = store.list_for_owner(owner).await.unwrap();
    assert_eq!(
        mine.iter().map(|s| s.id).collect::<Vec<_>>(),
        vec![s2.id, s1.id],
        "ordered by start time"
    );

    let pending = store.list_by_status(SlotStatus::SwapPending).await.unwrap();
    assert_eq!(pending.len(), 2);
}

#[tokio::test]
async fn poison_rows_are_skipped_in_listings() {
    let db = setup_db().await;
    let store = SqliteSlotStore::from_pool(db.pool.clone());

    let owner = Uuid::new_v4();
    let good = mk_slot(owner, SlotStatus::Busy, 9);
    store.insert(&good).await.unwrap();

    sqlx::query(
        r#"INSERT INTO slots VALUES ('bad-uuid', ?, 'x', 0, 1, 'BUSY', NULL, 0, 0)"#,
    )
    .bind(owner.to_string())
    .execute(&db.pool)
    .await
    .unwrap();

    let mine = store.list_for_owner(owner).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, good.id);

    let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM slots")
        .fetch_one(&db.pool)
        .await
        .unwrap()
        .get("n");
    assert_eq!(count, 2);
}

#[tokio::test]
async fn concurrent_reservations_have_one_winner() {
    let db = setup_db().await;
    let store = Arc::new(SqliteSlotStore::from_pool(db.pool.clone()));

    let owner = Uuid::new_v4();
    let slot = mk_slot(owner, SlotStatus::Swappable, 9);
    store.insert(&slot).await.unwrap();

    let mut set = JoinSet::new();
    for _ in 0..16 {
        let s = Arc::clone(&store);
        let id = slot.id;
        set.spawn(async move {
            s.transition(id, &SlotTransition::reserve(owner, Uuid::new_v4()))
                .await
        });
    }

    let mut winners = 0;
    while let Some(res) = set.join_next().await {
        if res.expect("task panicked").expect("transition failed") {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(
        store.get(slot.id).await.unwrap().unwrap().status,
        SlotStatus::SwapPending
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reservations_race_across_pooled_connections() {
    let file = setup_file_db(8).await;
    let store = Arc::new(SqliteSlotStore::from_pool(file.db.pool.clone()));

    let owner = Uuid::new_v4();
    let slot = mk_slot(owner, SlotStatus::Swappable, 9);
    store.insert(&slot).await.unwrap();

    let mut set = JoinSet::new();
    for _ in 0..16 {
        let s = Arc::clone(&store);
        let id = slot.id;
        let request_id = Uuid::new_v4();
        set.spawn(async move {
            let won = s
                .transition(id, &SlotTransition::reserve(owner, request_id))
                .await?;
            anyhow::Ok((won, request_id))
        });
    }

    let mut winners = Vec::new();
    while let Some(res) = set.join_next().await {
        let (won, request_id) = res.expect("task panicked").expect("transition failed");
        if won {
            winners.push(request_id);
        }
    }

    assert_eq!(winners.len(), 1);
    let stored = store.get(slot.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SlotStatus::SwapPending);
    assert_eq!(stored.swap_request_id, Some(winners[0]));
}
