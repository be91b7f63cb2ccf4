use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::AppError;
use crate::events::EventBus;
use crate::models::{
    MetadataPatch, NewStructureRequest, PortfolioMetadata, StructureRecord,
    UpdateStructureRequest,
};
use crate::services::hierarchy::{StructureNode, build_hierarchy};
use crate::store::{MetadataStore, StructureStore};

pub const USER_ARCHIVE_REASON: &str = "Archived by user";

/// Brings `has_archived_items` in line with the store. Returns whether it changed.
pub(crate) async fn refresh_archived_flag(
    store: &dyn StructureStore,
    metadata: &dyn MetadataStore,
    family_id: &str,
    student_id: &str,
) -> Result<bool, AppError> {
    let has_archived = store.count_archived(student_id).await? > 0;
    let current = metadata.get(student_id).await?;
    if current.has_archived_items == has_archived {
        return Ok(false);
    }

    metadata
        .update(
            student_id,
            family_id,
            &MetadataPatch {
                has_archived_items: Some(has_archived),
                starter_course_deleted: None,
            },
        )
        .await?;
    Ok(true)
}

/// User-facing structure operations.
pub struct PortfolioService {
    store: Arc<dyn StructureStore>,
    metadata: Arc<dyn MetadataStore>,
    events: EventBus,
}

impl PortfolioService {
    pub fn new(
        store: Arc<dyn StructureStore>,
        metadata: Arc<dyn MetadataStore>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            metadata,
            events,
        }
    }

    pub async fn structure_hierarchy(&self, student_id: &str) -> Result<Vec<StructureNode>, AppError> {
        let records = self.store.list_live(student_id).await?;
        Ok(build_hierarchy(records))
    }

    pub async fn list_archived(&self, student_id: &str) -> Result<Vec<StructureRecord>, AppError> {
        self.store.list_archived(student_id).await
    }

    pub async fn metadata(&self, student_id: &str) -> Result<PortfolioMetadata, AppError> {
        self.metadata.get(student_id).await
    }

    pub async fn create(
        &self,
        req: NewStructureRequest,
        actor: &str,
    ) -> Result<StructureRecord, AppError> {
        if req.title.trim().is_empty() {
            return Err(AppError::BadRequest("title must not be empty".to_string()));
        }
        if let Some(parent_id) = &req.parent_id {
            self.live_record(parent_id).await?;
        }

        let record = StructureRecord::from_request(req, actor, &Utc::now().to_rfc3339());
        self.store.create(&record).await?;
        self.events.structure_changed(&record.student_id);
        Ok(record)
    }

    pub async fn update(
        &self,
        id: &str,
        req: UpdateStructureRequest,
    ) -> Result<StructureRecord, AppError> {
        if let Some(parent_id) = &req.parent_id {
            if parent_id == id {
                return Err(AppError::BadRequest("a record cannot be its own parent".to_string()));
            }
            self.live_record(parent_id).await?;
        }

        let record = self.store.update(id, &req).await?.ok_or(AppError::NotFound)?;
        self.events.structure_changed(&record.student_id);
        Ok(record)
    }

    /// Ordinary delete path. Curriculum-managed records are refused.
    pub async fn archive(
        &self,
        id: &str,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<StructureRecord, AppError> {
        let record = self.store.get(id).await?.ok_or(AppError::NotFound)?;
        if record.is_alberta_course {
            warn!("Refusing to archive curriculum-managed record {}", id);
            return Err(AppError::CurriculumManaged(id.to_string()));
        }
        if record.is_archived {
            return Err(AppError::Conflict(format!("record {} is already archived", id)));
        }

        let reason = reason.unwrap_or(USER_ARCHIVE_REASON);
        if !self.store.archive(id, reason, actor).await? {
            return Err(AppError::Conflict(format!("record {} is already archived", id)));
        }

        let patch = MetadataPatch {
            has_archived_items: Some(true),
            starter_course_deleted: record.is_starter_course.then_some(true),
        };
        self.metadata
            .update(&record.student_id, &record.family_id, &patch)
            .await?;
        if record.is_starter_course {
            info!("Starter record {} archived; starter content disabled for {}", id, record.student_id);
        }

        self.events.structure_changed(&record.student_id);
        self.events.archived_items_changed(&record.student_id);

        self.store.get(id).await?.ok_or(AppError::NotFound)
    }

    /// Restores a user-archived record. Curriculum records come back only through
    /// reconciliation.
    pub async fn restore(&self, id: &str, actor: &str) -> Result<StructureRecord, AppError> {
        let record = self.store.get(id).await?.ok_or(AppError::NotFound)?;
        if record.is_alberta_course {
            return Err(AppError::CurriculumManaged(id.to_string()));
        }
        if !record.is_archived {
            return Err(AppError::Conflict(format!("record {} is not archived", id)));
        }

        if !self.store.restore(id, actor).await? {
            return Err(AppError::Conflict(format!("record {} is not archived", id)));
        }

        refresh_archived_flag(
            self.store.as_ref(),
            self.metadata.as_ref(),
            &record.family_id,
            &record.student_id,
        )
        .await?;

        self.events.structure_changed(&record.student_id);
        self.events.archived_items_changed(&record.student_id);

        self.store.get(id).await?.ok_or(AppError::NotFound)
    }

    async fn live_record(&self, id: &str) -> Result<StructureRecord, AppError> {
        match self.store.get(id).await? {
            Some(record) if record.is_live() => Ok(record),
            Some(_) => Err(AppError::BadRequest(format!("parent {} is archived", id))),
            None => Err(AppError::BadRequest(format!("parent {} does not exist", id))),
        }
    }
}
