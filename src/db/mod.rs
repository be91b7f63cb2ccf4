pub mod repository;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::warn;

use crate::error::AppError;
use crate::models::{
    Entry, MetadataPatch, PortfolioKey, PortfolioMetadata, StructureRecord,
    UpdateStructureRequest,
};
use crate::store::{MetadataStore, StructureOp, StructureStore};

/// SQLite-backed structure store.
#[derive(Clone)]
pub struct SqliteStructureStore {
    db: SqlitePool,
}

impl SqliteStructureStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StructureStore for SqliteStructureStore {
    async fn list_live(&self, student_id: &str) -> Result<Vec<StructureRecord>, AppError> {
        Ok(repository::fetch_live_structures(&self.db, student_id).await?)
    }

    async fn list_archived(&self, student_id: &str) -> Result<Vec<StructureRecord>, AppError> {
        Ok(repository::fetch_archived_structures(&self.db, student_id).await?)
    }

    async fn get(&self, id: &str) -> Result<Option<StructureRecord>, AppError> {
        Ok(repository::find_structure_by_id(&self.db, id).await?)
    }

    async fn list_curriculum(&self, key: &PortfolioKey) -> Result<Vec<StructureRecord>, AppError> {
        Ok(repository::fetch_curriculum_structures(&self.db, key).await?)
    }

    async fn count_live(&self, student_id: &str) -> Result<i64, AppError> {
        Ok(repository::count_structures(&self.db, student_id, false).await?)
    }

    async fn count_archived(&self, student_id: &str) -> Result<i64, AppError> {
        Ok(repository::count_structures(&self.db, student_id, true).await?)
    }

    async fn create(&self, record: &StructureRecord) -> Result<(), AppError> {
        Ok(repository::insert_structure(&self.db, record).await?)
    }

    async fn update(
        &self,
        id: &str,
        patch: &UpdateStructureRequest,
    ) -> Result<Option<StructureRecord>, AppError> {
        Ok(repository::update_structure(&self.db, id, patch).await?)
    }

    async fn archive(&self, id: &str, reason: &str, actor: &str) -> Result<bool, AppError> {
        Ok(repository::archive_structure(&self.db, id, reason, actor).await?)
    }

    async fn restore(&self, id: &str, actor: &str) -> Result<bool, AppError> {
        Ok(repository::restore_structure(&self.db, id, actor).await?)
    }

    async fn apply_batch(&self, ops: &[StructureOp]) -> Result<(), AppError> {
        if ops.is_empty() {
            return Ok(());
        }

        // Dropping the transaction on an early return rolls everything back.
        let mut tx = self.db.begin().await?;

        for op in ops {
            let affected = match op {
                StructureOp::Create(record) => repository::insert_structure_query(record)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected(),
                StructureOp::Archive { id, reason, actor, at } => {
                    repository::archive_structure_query(id, reason, actor, at)
                        .execute(&mut *tx)
                        .await?
                        .rows_affected()
                }
                StructureOp::Restore { id, actor, at } => {
                    repository::restore_structure_query(id, actor, at)
                        .execute(&mut *tx)
                        .await?
                        .rows_affected()
                }
                StructureOp::AssignEntry { entry_id, structure_id } => {
                    repository::assign_entry_query(entry_id, structure_id)
                        .execute(&mut *tx)
                        .await?
                        .rows_affected()
                }
            };

            if affected == 0 {
                warn!("batch operation matched no rows, rolling back: {:?}", op);
                return Err(AppError::Conflict(
                    "structure changed while the batch was being applied".to_string(),
                ));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_orphan_entries(&self, student_id: &str) -> Result<Vec<Entry>, AppError> {
        Ok(repository::fetch_orphan_entries(&self.db, student_id).await?)
    }
}

#[derive(Clone)]
pub struct SqliteMetadataStore {
    db: SqlitePool,
}

impl SqliteMetadataStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn get(&self, student_id: &str) -> Result<PortfolioMetadata, AppError> {
        Ok(repository::fetch_metadata(&self.db, student_id)
            .await?
            .unwrap_or_else(|| PortfolioMetadata::empty(student_id)))
    }

    async fn update(
        &self,
        student_id: &str,
        family_id: &str,
        patch: &MetadataPatch,
    ) -> Result<PortfolioMetadata, AppError> {
        Ok(repository::upsert_metadata(&self.db, student_id, family_id, patch).await?)
    }
}
