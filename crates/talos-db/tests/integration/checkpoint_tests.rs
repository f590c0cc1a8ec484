use talos_core::checkpoint::CheckpointStore;
use talos_core::work::{WorkStatus, WorkUnit};
use talos_db::SqliteCheckpointRepository;

use crate::common::setup_test_db;

fn test_unit() -> WorkUnit {
    WorkUnit::new("shop.example.de", "110478")
}

#[tokio::test]
async fn claim_new_unit_sets_in_progress() {
    let pool = setup_test_db().await;
    let repo = SqliteCheckpointRepository::new(pool);

    assert!(repo.claim(&test_unit()).await.unwrap());

    let records = repo.load().await.unwrap();
    let record = &records["shop.example.de_110478"];
    assert_eq!(record.status, WorkStatus::InProgress);
    assert_eq!(record.attempt_count, 1);
    assert_eq!(record.domain, "shop.example.de");
    assert_eq!(record.product_id, "110478");
}

#[tokio::test]
async fn claim_is_exclusive_while_in_progress() {
    let pool = setup_test_db().await;
    let repo = SqliteCheckpointRepository::new(pool);

    assert!(repo.claim(&test_unit()).await.unwrap());
    assert!(!repo.claim(&test_unit()).await.unwrap());
}

#[tokio::test]
async fn concurrent_claims_have_exactly_one_winner() {
    let pool = setup_test_db().await;
    let repo = SqliteCheckpointRepository::new(pool);
    repo.seed(&[test_unit()]).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let repo = repo.clone();
        handles.push(tokio::spawn(
            async move { repo.claim(&test_unit()).await },
        ));
    }

    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
}

#[tokio::test]
async fn claim_skips_done_units() {
    let pool = setup_test_db().await;
    let repo = SqliteCheckpointRepository::new(pool);

    let unit = test_unit();
    assert!(repo.claim(&unit).await.unwrap());
    repo.mark_done(&unit.id()).await.unwrap();

    assert!(!repo.claim(&unit).await.unwrap());
}

#[tokio::test]
async fn failed_units_are_reclaimable() {
    let pool = setup_test_db().await;
    let repo = SqliteCheckpointRepository::new(pool);

    let unit = test_unit();
    assert!(repo.claim(&unit).await.unwrap());
    repo.mark_failed(&unit.id(), "retries exhausted").await.unwrap();

    assert!(repo.claim(&unit).await.unwrap());

    let records = repo.load().await.unwrap();
    let record = &records[&unit.id()];
    assert_eq!(record.status, WorkStatus::InProgress);
    assert_eq!(record.attempt_count, 2);
    assert!(record.last_error.is_none());
}

#[tokio::test]
async fn mark_done_is_idempotent_and_final() {
    let pool = setup_test_db().await;
    let repo = SqliteCheckpointRepository::new(pool);

    let unit = test_unit();
    repo.claim(&unit).await.unwrap();
    repo.mark_done(&unit.id()).await.unwrap();
    repo.mark_done(&unit.id()).await.unwrap();
    // A later mark_failed must not demote a Done record.
    repo.mark_failed(&unit.id(), "late error").await.unwrap();

    let records = repo.load().await.unwrap();
    let record = &records[&unit.id()];
    assert_eq!(record.status, WorkStatus::Done);
    assert!(record.last_error.is_none());
}

#[tokio::test]
async fn mark_failed_records_last_error() {
    let pool = setup_test_db().await;
    let repo = SqliteCheckpointRepository::new(pool);

    let unit = test_unit();
    repo.claim(&unit).await.unwrap();
    repo.mark_failed(&unit.id(), "HTTP 429 for page").await.unwrap();

    let failed = repo.failed_records().await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].unit_id, unit.id());
    assert_eq!(failed[0].last_error.as_deref(), Some("HTTP 429 for page"));
}

#[tokio::test]
async fn seed_creates_pending_without_touching_existing() {
    let pool = setup_test_db().await;
    let repo = SqliteCheckpointRepository::new(pool);

    let first = WorkUnit::new("a.com", "1");
    let second = WorkUnit::new("a.com", "2");
    repo.claim(&first).await.unwrap();
    repo.mark_done(&first.id()).await.unwrap();

    repo.seed(&[first.clone(), second.clone()]).await.unwrap();

    let records = repo.load().await.unwrap();
    assert_eq!(records[&first.id()].status, WorkStatus::Done);
    assert_eq!(records[&second.id()].status, WorkStatus::Pending);
    assert_eq!(records[&second.id()].attempt_count, 0);
}

#[tokio::test]
async fn recover_stale_resets_in_progress_to_pending() {
    let pool = setup_test_db().await;
    let repo = SqliteCheckpointRepository::new(pool);

    // Simulate a crash: a unit is claimed but never reaches a terminal state.
    let unit = test_unit();
    repo.claim(&unit).await.unwrap();

    let recovered = repo.recover_stale().await.unwrap();
    assert_eq!(recovered, 1);

    let records = repo.load().await.unwrap();
    assert_eq!(records[&unit.id()].status, WorkStatus::Pending);

    // The unit is claimable again and keeps its attempt history.
    assert!(repo.claim(&unit).await.unwrap());
    let records = repo.load().await.unwrap();
    assert_eq!(records[&unit.id()].attempt_count, 2);
}

#[tokio::test]
async fn is_complete_and_reset_lifecycle() {
    let pool = setup_test_db().await;
    let repo = SqliteCheckpointRepository::new(pool);

    let first = WorkUnit::new("a.com", "1");
    let second = WorkUnit::new("a.com", "2");
    repo.seed(&[first.clone(), second.clone()]).await.unwrap();
    assert!(!repo.is_complete().await.unwrap());

    repo.claim(&first).await.unwrap();
    assert!(!repo.is_complete().await.unwrap());

    repo.mark_done(&first.id()).await.unwrap();
    repo.claim(&second).await.unwrap();
    repo.mark_failed(&second.id(), "not found").await.unwrap();
    assert!(repo.is_complete().await.unwrap());

    repo.reset().await.unwrap();
    assert!(repo.load().await.unwrap().is_empty());
    assert!(repo.is_complete().await.unwrap());
}

#[tokio::test]
async fn empty_store_loads_empty_mapping() {
    let pool = setup_test_db().await;
    let repo = SqliteCheckpointRepository::new(pool);

    assert!(repo.load().await.unwrap().is_empty());
    assert!(repo.failed_records().await.unwrap().is_empty());
    assert_eq!(repo.recover_stale().await.unwrap(), 0);
}

#[tokio::test]
async fn status_counts_group_by_status() {
    let pool = setup_test_db().await;
    let repo = SqliteCheckpointRepository::new(pool);

    let units: Vec<WorkUnit> = (1..=4)
        .map(|i| WorkUnit::new("a.com", i.to_string()))
        .collect();
    repo.seed(&units).await.unwrap();

    repo.claim(&units[0]).await.unwrap();
    repo.mark_done(&units[0].id()).await.unwrap();
    repo.claim(&units[1]).await.unwrap();
    repo.mark_failed(&units[1].id(), "boom").await.unwrap();
    repo.claim(&units[2]).await.unwrap();

    let counts: std::collections::HashMap<WorkStatus, i64> =
        repo.status_counts().await.unwrap().into_iter().collect();

    assert_eq!(counts.get(&WorkStatus::Done), Some(&1));
    assert_eq!(counts.get(&WorkStatus::Failed), Some(&1));
    assert_eq!(counts.get(&WorkStatus::InProgress), Some(&1));
    assert_eq!(counts.get(&WorkStatus::Pending), Some(&1));
}
