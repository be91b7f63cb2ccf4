mod common;

use std::time::Duration;

use common::{harness, key};
use portfolio_sync::models::{CourseSelection, PortfolioKey};
use portfolio_sync::store::StructureStore;

const DEBOUNCE: Duration = Duration::from_millis(100);
const STARTER_GRACE: Duration = Duration::from_secs(60);

#[tokio::test]
async fn test_open_runs_initial_reconciliation() {
    let h = harness(DEBOUNCE, STARTER_GRACE).await;
    let key = key();
    h.selection
        .inner
        .set(&key, CourseSelection::new().with_subject("math", &["MAT1010"]));

    h.state.sessions.open(key.clone()).await.expect("open session");

    assert_eq!(h.selection.reads(), 1);
    assert_eq!(h.store.list_curriculum(&key).await.unwrap().len(), 1);
    assert_eq!(h.state.sessions.active_key().await, Some(key));
}

#[tokio::test]
async fn test_burst_of_changes_coalesces_into_one_pass() {
    let h = harness(DEBOUNCE, STARTER_GRACE).await;
    let key = key();
    h.state.sessions.open(key.clone()).await.unwrap();
    assert_eq!(h.selection.reads(), 1);

    h.selection
        .inner
        .set(&key, CourseSelection::new().with_subject("math", &["MAT1010"]));
    h.selection.inner.set(
        &key,
        CourseSelection::new().with_subject("math", &["MAT1010", "SCI1010"]),
    );
    h.selection.inner.set(
        &key,
        CourseSelection::new().with_subject("math", &["MAT1010", "SCI1010", "ELA1105"]),
    );

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(h.selection.reads(), 2);
    let live = h.store.list_live("stu-1").await.unwrap();
    assert_eq!(live.len(), 3);
}

#[tokio::test]
async fn test_unchanged_notifications_run_at_most_one_pass() {
    let h = harness(DEBOUNCE, STARTER_GRACE).await;
    let key = key();
    h.selection
        .inner
        .set(&key, CourseSelection::new().with_subject("math", &["MAT1010"]));
    h.state.sessions.open(key.clone()).await.unwrap();
    let before = h.store.list_live("stu-1").await.unwrap();

    h.selection.inner.notify(&key);
    h.selection.inner.notify(&key);
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(h.selection.reads(), 2);
    assert_eq!(h.store.list_live("stu-1").await.unwrap(), before);
}

#[tokio::test]
async fn test_reopening_same_key_is_a_no_op() {
    let h = harness(DEBOUNCE, STARTER_GRACE).await;
    let key = key();

    h.state.sessions.open(key.clone()).await.unwrap();
    h.state.sessions.open(key.clone()).await.unwrap();

    assert_eq!(h.selection.reads(), 1);
}

#[tokio::test]
async fn test_switching_portfolio_replaces_session() {
    let h = harness(DEBOUNCE, STARTER_GRACE).await;
    let first = key();
    let second = PortfolioKey::new("fam-1", "stu-2", "2024-2025");

    h.state.sessions.open(first.clone()).await.unwrap();
    h.state.sessions.open(second.clone()).await.unwrap();
    assert_eq!(h.state.sessions.active_key().await, Some(second));

    // The old watcher is gone, so changes to the first key no longer trigger passes.
    let reads = h.selection.reads();
    h.selection
        .inner
        .set(&first, CourseSelection::new().with_subject("math", &["MAT1010"]));
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(h.selection.reads(), reads);
    assert!(h.store.list_curriculum(&first).await.unwrap().is_empty());

    h.state.sessions.close().await;
    assert_eq!(h.state.sessions.active_key().await, None);
}

#[tokio::test]
async fn test_reopen_picks_up_changes_made_while_closed() {
    let h = harness(DEBOUNCE, STARTER_GRACE).await;
    let key = key();
    h.selection
        .inner
        .set(&key, CourseSelection::new().with_subject("math", &["MAT1010"]));
    h.state.sessions.open(key.clone()).await.unwrap();
    h.state.sessions.close().await;

    h.selection
        .inner
        .set(&key, CourseSelection::new().with_subject("science", &["SCI1010"]));
    h.state.sessions.open(key.clone()).await.unwrap();

    assert_eq!(h.selection.reads(), 2);
    let live: Vec<_> = h
        .store
        .list_live("stu-1")
        .await
        .unwrap()
        .into_iter()
        .filter_map(|r| r.alberta_course_id)
        .collect();
    assert_eq!(live, vec!["SCI1010".to_string()]);
}
