use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{
    Entry, MetadataPatch, PortfolioKey, PortfolioMetadata, StructureRecord,
    UpdateStructureRequest,
};

/// One staged write against the structure store.
#[derive(Debug, Clone, PartialEq)]
pub enum StructureOp {
    Create(StructureRecord),
    Archive {
        id: String,
        reason: String,
        actor: String,
        at: String,
    },
    Restore {
        id: String,
        actor: String,
        at: String,
    },
    AssignEntry {
        entry_id: String,
        structure_id: String,
    },
}

#[async_trait]
pub trait StructureStore: Send + Sync {
    /// Live records for a student; archived ones are excluded.
    async fn list_live(&self, student_id: &str) -> Result<Vec<StructureRecord>, AppError>;
    async fn list_archived(&self, student_id: &str) -> Result<Vec<StructureRecord>, AppError>;
    async fn get(&self, id: &str) -> Result<Option<StructureRecord>, AppError>;
    /// Every curriculum-derived record for the key, archived or not.
    async fn list_curriculum(&self, key: &PortfolioKey) -> Result<Vec<StructureRecord>, AppError>;
    async fn count_live(&self, student_id: &str) -> Result<i64, AppError>;
    async fn count_archived(&self, student_id: &str) -> Result<i64, AppError>;
    async fn create(&self, record: &StructureRecord) -> Result<(), AppError>;
    async fn update(
        &self,
        id: &str,
        patch: &UpdateStructureRequest,
    ) -> Result<Option<StructureRecord>, AppError>;
    async fn archive(&self, id: &str, reason: &str, actor: &str) -> Result<bool, AppError>;
    async fn restore(&self, id: &str, actor: &str) -> Result<bool, AppError>;
    /// Applies all operations atomically: either every one lands or none does.
    async fn apply_batch(&self, ops: &[StructureOp]) -> Result<(), AppError>;
    async fn list_orphan_entries(&self, student_id: &str) -> Result<Vec<Entry>, AppError>;
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Missing rows read as defaults.
    async fn get(&self, student_id: &str) -> Result<PortfolioMetadata, AppError>;
    async fn update(
        &self,
        student_id: &str,
        family_id: &str,
        patch: &MetadataPatch,
    ) -> Result<PortfolioMetadata, AppError>;
}
