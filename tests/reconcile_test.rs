mod common;

use common::{key, quiet_harness};
use portfolio_sync::error::AppError;
use portfolio_sync::models::{CourseSelection, NewStructureRequest, StructureRecord, StructureType};
use portfolio_sync::services::ReconcileStats;
use portfolio_sync::services::reconcile::REMOVED_FROM_PLAN_REASON;
use portfolio_sync::store::{MetadataStore, StructureOp, StructureStore};

fn math_only() -> CourseSelection {
    CourseSelection::new().with_subject("course_math_10", &["MAT1010"])
}

#[tokio::test]
async fn test_program_plan_add_remove_readd() {
    let h = quiet_harness().await;
    let key = key();

    // Added to the plan: one live record at order 0.
    h.selection.inner.set(&key, math_only());
    let stats = h.state.reconcile.reconcile(&key).await.expect("first pass");
    assert_eq!(stats.created, 1);

    let records = h.store.list_curriculum(&key).await.unwrap();
    assert_eq!(records.len(), 1);
    let original = records[0].clone();
    assert_eq!(original.alberta_course_id.as_deref(), Some("MAT1010"));
    assert_eq!(original.title, "Mathematics 10C");
    assert_eq!(original.course_code.as_deref(), Some("MATH10C"));
    assert_eq!(original.order, 0);
    assert!(!original.is_archived);

    // Removed from the plan: archived, flag raised.
    h.selection.inner.set(&key, CourseSelection::new());
    let stats = h.state.reconcile.reconcile(&key).await.expect("second pass");
    assert_eq!(stats.archived, 1);

    let archived = h.store.get(&original.id).await.unwrap().unwrap();
    assert!(archived.is_archived);
    assert_eq!(archived.archived_reason.as_deref(), Some(REMOVED_FROM_PLAN_REASON));
    assert!(archived.archived_at.is_some());
    assert!(archived.archived_by.is_some());
    assert!(h.metadata.get("stu-1").await.unwrap().has_archived_items);
    assert!(h.store.list_live("stu-1").await.unwrap().is_empty());

    // Re-added: the same record comes back.
    h.selection.inner.set(&key, math_only());
    let stats = h.state.reconcile.reconcile(&key).await.expect("third pass");
    assert_eq!(stats.restored, 1);
    assert_eq!(stats.created, 0);

    let records = h.store.list_curriculum(&key).await.unwrap();
    assert_eq!(records.len(), 1);
    let restored = &records[0];
    assert_eq!(restored.id, original.id);
    assert!(!restored.is_archived);
    assert!(restored.restored_at.is_some());
    assert!(restored.archived_at.is_none());
    assert!(restored.archived_reason.is_none());
    assert!(!h.metadata.get("stu-1").await.unwrap().has_archived_items);
}

#[tokio::test]
async fn test_second_pass_is_a_no_op() {
    let h = quiet_harness().await;
    let key = key();
    h.selection.inner.set(
        &key,
        CourseSelection::new()
            .with_subject("math", &["MAT1010"])
            .with_subject("science", &["SCI1010"]),
    );

    let first = h.state.reconcile.reconcile(&key).await.unwrap();
    assert_eq!(first.created, 2);
    let after_first = h.store.list_live("stu-1").await.unwrap();

    let second = h.state.reconcile.reconcile(&key).await.unwrap();
    assert_eq!(second, ReconcileStats::default());
    assert_eq!(h.store.list_live("stu-1").await.unwrap(), after_first);
}

#[tokio::test]
async fn test_unknown_course_is_skipped() {
    let h = quiet_harness().await;
    let key = key();
    h.selection.inner.set(
        &key,
        CourseSelection::new().with_subject("math", &["NOT-A-COURSE", "MAT1010"]),
    );

    let stats = h.state.reconcile.reconcile(&key).await.unwrap();
    assert_eq!(stats.unknown_skipped, 1);
    assert_eq!(stats.created, 1);

    let records = h.store.list_curriculum(&key).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].alberta_course_id.as_deref(), Some("MAT1010"));
}

#[tokio::test]
async fn test_user_records_are_left_alone_and_order_continues() {
    let h = quiet_harness().await;
    let key = key();

    let user = h
        .state
        .portfolio
        .create(
            NewStructureRequest {
                family_id: "fam-1".to_string(),
                student_id: "stu-1".to_string(),
                record_type: StructureType::Portfolio,
                parent_id: None,
                title: "Field trips".to_string(),
                description: None,
                order: Some(4),
                icon: None,
                color: None,
            },
            "parent",
        )
        .await
        .unwrap();

    h.selection.inner.set(&key, math_only());
    h.state.reconcile.reconcile(&key).await.unwrap();
    let course = &h.store.list_curriculum(&key).await.unwrap()[0];
    assert_eq!(course.order, 5);

    h.selection.inner.set(&key, CourseSelection::new());
    h.state.reconcile.reconcile(&key).await.unwrap();

    let user_after = h.store.get(&user.id).await.unwrap().unwrap();
    assert!(!user_after.is_archived);
    assert_eq!(h.store.count_live("stu-1").await.unwrap(), 1);
}

#[tokio::test]
async fn test_other_school_year_is_untouched() {
    let h = quiet_harness().await;
    let key = key();
    let next_year = portfolio_sync::models::PortfolioKey::new("fam-1", "stu-1", "2025-2026");

    h.selection.inner.set(&key, math_only());
    h.selection.inner.set(&next_year, math_only());
    h.state.reconcile.reconcile(&key).await.unwrap();
    h.state.reconcile.reconcile(&next_year).await.unwrap();
    assert_eq!(h.store.count_live("stu-1").await.unwrap(), 2);

    h.selection.inner.set(&next_year, CourseSelection::new());
    h.state.reconcile.reconcile(&next_year).await.unwrap();

    let this_year = h.store.list_curriculum(&key).await.unwrap();
    assert!(this_year.iter().all(|r| !r.is_archived));
    let following = h.store.list_curriculum(&next_year).await.unwrap();
    assert!(following.iter().all(|r| r.is_archived));
}

#[tokio::test]
async fn test_guard_skips_synced_key_until_invalidated() {
    let h = quiet_harness().await;
    let key = key();
    h.selection.inner.set(&key, math_only());

    let first = h.state.reconcile.run_guarded(&key).await.unwrap();
    assert_eq!(first.map(|s| s.created), Some(1));

    let second = h.state.reconcile.run_guarded(&key).await.unwrap();
    assert!(second.is_none());
    assert_eq!(h.selection.reads(), 1);

    h.state.reconcile.guard().invalidate(&key);
    let third = h.state.reconcile.run_guarded(&key).await.unwrap();
    assert_eq!(third, Some(ReconcileStats::default()));
    assert_eq!(h.selection.reads(), 2);
}

#[tokio::test]
async fn test_failed_batch_is_not_memoized() {
    let h = quiet_harness().await;
    let key = key();
    h.selection.inner.set(&key, math_only());

    sqlx::query("DROP TABLE structures")
        .execute(&h.pool)
        .await
        .unwrap();

    assert!(h.state.reconcile.run_guarded(&key).await.is_err());
    assert!(h.state.reconcile.guard().should_run(&key));
}

#[tokio::test]
async fn test_batch_failing_midway_writes_nothing() {
    let h = quiet_harness().await;
    let now = chrono::Utc::now().to_rfc3339();
    let record = StructureRecord::new_starter("fam-1", "stu-1", "parent", &now);

    let result = h
        .store
        .apply_batch(&[
            StructureOp::Create(record.clone()),
            StructureOp::Archive {
                id: "missing".to_string(),
                reason: REMOVED_FROM_PLAN_REASON.to_string(),
                actor: "curriculum-sync".to_string(),
                at: now.clone(),
            },
        ])
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(h.store.count_live("stu-1").await.unwrap(), 0);
    assert!(h.store.get(&record.id).await.unwrap().is_none());
}
