#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use portfolio_sync::curriculum::{
    CurriculumSelectionSource, InMemorySelectionSource, SelectionSubscription, StaticCourseCatalog,
};
use portfolio_sync::db::{SqliteMetadataStore, SqliteStructureStore};
use portfolio_sync::error::AppError;
use portfolio_sync::models::{CourseSelection, PortfolioKey};
use portfolio_sync::state::AppState;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

/// Selection source that counts reads, i.e. reconciliation passes that got past the guard.
#[derive(Default)]
pub struct CountingSource {
    pub inner: InMemorySelectionSource,
    reads: AtomicUsize,
}

impl CountingSource {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CurriculumSelectionSource for CountingSource {
    async fn read(&self, key: &PortfolioKey) -> Result<CourseSelection, AppError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(key).await
    }

    async fn subscribe(&self, key: &PortfolioKey) -> Result<SelectionSubscription, AppError> {
        self.inner.subscribe(key).await
    }
}

pub struct Harness {
    pub pool: SqlitePool,
    pub state: AppState,
    pub selection: Arc<CountingSource>,
    pub store: SqliteStructureStore,
    pub metadata: SqliteMetadataStore,
}

pub async fn setup_pool() -> SqlitePool {
    // One connection that never expires, or the in-memory database vanishes with it.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub fn catalog() -> StaticCourseCatalog {
    StaticCourseCatalog::new()
        .with_course("MAT1010", "Mathematics 10C", Some("MATH10C"))
        .with_course("SCI1010", "Science 10", Some("SCI10"))
        .with_course("ELA1105", "English Language Arts 10-1", Some("ELA10-1"))
}

pub fn key() -> PortfolioKey {
    PortfolioKey::new("fam-1", "stu-1", "2024-2025")
}

pub async fn harness(debounce: Duration, starter_grace: Duration) -> Harness {
    let pool = setup_pool().await;
    let selection = Arc::new(CountingSource::default());
    let state = AppState::new(
        pool.clone(),
        selection.clone(),
        Arc::new(catalog()),
        debounce,
        starter_grace,
    );

    Harness {
        store: SqliteStructureStore::new(pool.clone()),
        metadata: SqliteMetadataStore::new(pool.clone()),
        pool,
        state,
        selection,
    }
}

/// Harness whose background timers never fire during a test.
pub async fn quiet_harness() -> Harness {
    harness(Duration::from_secs(60), Duration::from_secs(60)).await
}
