use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use sqlx::Row;
use tokio::task::JoinSet;

use corelib::{Decision, SlotDetails, SlotId, SlotStatus, SwapStatus, UserId};
use exchange::{ExchangeCoordinator, ExchangeError, ReleaseOutcome, SlotCatalog, StuckReason};
use store::{Db, SqliteSlotStore, SqliteSwapStore, SqliteUserDirectory};

struct Env {
    db: Db,
    coordinator: Arc<ExchangeCoordinator>,
    catalog: SlotCatalog,
}

async fn env() -> Env {
    let db = Db::connect_in_memory().await.unwrap();
    db.migrate().await.unwrap();

    let slots = Arc::new(SqliteSlotStore::from_pool(db.pool.clone()));
    let swaps = Arc::new(SqliteSwapStore::from_pool(db.pool.clone()));
    let users = Arc::new(SqliteUserDirectory::from_pool(db.pool.clone()));

    Env {
        coordinator: Arc::new(ExchangeCoordinator::new(
            slots.clone(),
            swaps,
            users.clone(),
        )),
        catalog: SlotCatalog::new(slots, users),
        db,
    }
}

fn details(hour: u32) -> SlotDetails {
    let start = Utc.with_ymd_and_hms(2025, 6, 2, hour, 0, 0).unwrap();
    SlotDetails {
        title: format!("Shift {hour}"),
        start_time: start,
        end_time: start + Duration::hours(1),
    }
}

async fn open_slot(env: &Env, owner: UserId, hour: u32) -> SlotId {
    let slot = env.catalog.create_slot(owner, details(hour)).await.unwrap();
    env.catalog.set_swappable(owner, slot.id, true).await.unwrap();
    slot.id
}

#[tokio::test]
async fn accept_scenario_end_to_end() {
    let env = env().await;
    let a = env.catalog.register_user("Alice", "alice@example.com").await.unwrap().id;
    let b = env.catalog.register_user("Bob", "bob@example.com").await.unwrap().id;
    let s1 = open_slot(&env, a, 9).await;
    let s2 = open_slot(&env, b, 14).await;

    let offers = env.coordinator.discover(a).await.unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].slot.id, s2);
    assert_eq!(offers[0].owner.as_ref().unwrap().name, "Bob");

    let req = env.coordinator.propose(a, s1, s2).await.unwrap();
    assert!(env.coordinator.discover(a).await.unwrap().is_empty());

    let board = env.coordinator.list_requests(b).await.unwrap();
    assert_eq!(board.incoming[0].request.id, req.id);
    assert_eq!(board.incoming[0].counterpart.as_ref().unwrap().name, "Alice");

    let res = env
        .coordinator
        .resolve(b, req.id, Decision::Accept)
        .await
        .unwrap();
    assert_eq!(res.request.status, SwapStatus::Accepted);
    assert!(!res.replayed);

    let alice: Vec<_> = env.catalog.my_slots(a).await.unwrap();
    let bob: Vec<_> = env.catalog.my_slots(b).await.unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(bob.len(), 1);
    assert_eq!((alice[0].id, alice[0].status), (s2, SlotStatus::Busy));
    assert_eq!((bob[0].id, bob[0].status), (s1, SlotStatus::Busy));

    let again = env
        .coordinator
        .resolve(b, req.id, Decision::Accept)
        .await
        .unwrap();
    assert!(again.replayed);
    assert_eq!(env.catalog.my_slots(a).await.unwrap(), alice);
}

#[tokio::test]
async fn concurrent_proposals_for_one_slot_have_a_single_winner() {
    let env = env().await;
    let owner = env.catalog.register_user("Bob", "bob@example.com").await.unwrap().id;
    let wanted = open_slot(&env, owner, 12).await;

    let mut set = JoinSet::new();
    for i in 0..6 {
        let user = env
            .catalog
            .register_user(&format!("User{i}"), &format!("u{i}@example.com"))
            .await
            .unwrap()
            .id;
        let offered = open_slot(&env, user, 8).await;
        let coordinator = Arc::clone(&env.coordinator);
        set.spawn(async move { coordinator.propose(user, offered, wanted).await });
    }

    let mut ok = 0;
    while let Some(res) = set.join_next().await {
        match res.unwrap() {
            Ok(_) => ok += 1,
            Err(ExchangeError::InvalidSlotState(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);

    let pending: i64 = sqlx::query("SELECT COUNT(*) AS n FROM slots WHERE status = 'SWAP_PENDING'")
        .fetch_one(&env.db.pool)
        .await
        .unwrap()
        .get("n");
    assert_eq!(pending, 2);
}

#[tokio::test]
async fn crash_window_orphan_is_found_and_released() {
    let env = env().await;
    let a = env.catalog.register_user("Alice", "alice@example.com").await.unwrap().id;
    let s1 = open_slot(&env, a, 9).await;

    // Reservation written, request insert never happened.
    sqlx::query("UPDATE slots SET status = 'SWAP_PENDING', swap_request_id = ? WHERE id = ?")
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(s1.to_string())
        .execute(&env.db.pool)
        .await
        .unwrap();

    let stuck = env.coordinator.stuck_slots().await.unwrap();
    assert_eq!(stuck.len(), 1);
    assert!(matches!(stuck[0].reason, StuckReason::RequestMissing { .. }));

    assert_eq!(
        env.coordinator.force_release(s1).await.unwrap(),
        ReleaseOutcome::Released
    );
    let mine = env.catalog.my_slots(a).await.unwrap();
    assert_eq!((mine[0].status, mine[0].swap_request_id), (SlotStatus::Swappable, None));
}

#[tokio::test]
async fn reject_then_edit_and_delete() {
    let env = env().await;
    let a = env.catalog.register_user("Alice", "alice@example.com").await.unwrap().id;
    let b = env.catalog.register_user("Bob", "bob@example.com").await.unwrap().id;
    let s1 = open_slot(&env, a, 9).await;
    let s2 = open_slot(&env, b, 10).await;
    let req = env.coordinator.propose(a, s1, s2).await.unwrap();

    let err = env.catalog.delete_slot(a, s1).await.unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidSlotState(_)));

    env.coordinator
        .resolve(b, req.id, Decision::Reject)
        .await
        .unwrap();

    let edited = env.catalog.update_slot(a, s1, details(11)).await.unwrap();
    assert_eq!(edited.status, SlotStatus::Swappable);
    env.catalog.delete_slot(a, s1).await.unwrap();
    assert!(env.catalog.my_slots(a).await.unwrap().is_empty());
}
