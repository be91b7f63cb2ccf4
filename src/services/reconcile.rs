use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::curriculum::{CourseCatalog, CurriculumSelectionSource};
use crate::error::AppError;
use crate::events::EventBus;
use crate::models::{CourseInfo, PortfolioKey, StructureRecord};
use crate::services::guard::SyncGuard;
use crate::services::portfolio::refresh_archived_flag;
use crate::store::{MetadataStore, StructureOp, StructureStore};

pub const REMOVED_FROM_PLAN_REASON: &str = "Removed from Program Plan";
pub const DUPLICATE_RECORD_REASON: &str = "Duplicate curriculum record";
pub const SYNC_ACTOR: &str = "curriculum-sync";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub created: usize,
    pub restored: usize,
    pub archived: usize,
    pub unknown_skipped: usize,
}

#[derive(Debug, Default)]
pub struct ReconcilePlan {
    pub ops: Vec<StructureOp>,
    pub stats: ReconcileStats,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Picks the record each course id resolves to.
///
/// A live record beats archived ones; among archived ones the most recently archived
/// wins. Additional live records for the same course are returned separately.
fn index_existing(
    existing: &[StructureRecord],
) -> (HashMap<&str, &StructureRecord>, Vec<&StructureRecord>) {
    let mut index: HashMap<&str, &StructureRecord> = HashMap::new();
    let mut duplicates = Vec::new();

    for record in existing.iter().filter(|r| r.is_alberta_course) {
        let Some(course_id) = record.alberta_course_id.as_deref() else {
            continue;
        };

        match index.get(course_id).copied() {
            None => {
                index.insert(course_id, record);
            }
            Some(current) => match (current.is_live(), record.is_live()) {
                (true, true) => duplicates.push(record),
                (false, true) => {
                    index.insert(course_id, record);
                }
                (true, false) => {}
                (false, false) => {
                    if record.archived_at > current.archived_at {
                        index.insert(course_id, record);
                    }
                }
            },
        }
    }

    (index, duplicates)
}

/// Selected ids that have no existing record and so need a catalog lookup.
pub fn missing_course_ids(selected: &[String], existing: &[StructureRecord]) -> Vec<String> {
    let (index, _) = index_existing(existing);
    selected
        .iter()
        .filter(|id| !index.contains_key(id.as_str()))
        .cloned()
        .collect()
}

/// Computes the writes that make the live curriculum records match `selected`.
///
/// `courses` holds catalog entries for ids without an existing record; ids missing
/// from it are skipped. New records take sequential order from `next_order`.
pub fn plan_reconciliation(
    key: &PortfolioKey,
    selected: &[String],
    existing: &[StructureRecord],
    courses: &HashMap<String, CourseInfo>,
    next_order: i64,
    now: &str,
) -> ReconcilePlan {
    let (index, duplicates) = index_existing(existing);
    let mut plan = ReconcilePlan::default();
    let mut order = next_order;

    for course_id in selected {
        match index.get(course_id.as_str()) {
            None => match courses.get(course_id) {
                Some(course) => {
                    plan.ops.push(StructureOp::Create(StructureRecord::new_curriculum(
                        key, course_id, course, order, SYNC_ACTOR, now,
                    )));
                    order += 1;
                    plan.stats.created += 1;
                }
                None => {
                    warn!("Skipping unknown course id {} for {}", course_id, key);
                    plan.stats.unknown_skipped += 1;
                }
            },
            Some(record) if record.is_archived => {
                plan.ops.push(StructureOp::Restore {
                    id: record.id.clone(),
                    actor: SYNC_ACTOR.to_string(),
                    at: now.to_string(),
                });
                plan.stats.restored += 1;
            }
            Some(_) => {}
        }
    }

    let selected_ids: HashSet<&str> = selected.iter().map(String::as_str).collect();

    // Walk `existing` rather than the index so the op order is deterministic.
    for record in existing {
        let Some(course_id) = record.alberta_course_id.as_deref() else {
            continue;
        };
        let is_chosen = index.get(course_id).is_some_and(|r| r.id == record.id);
        if is_chosen && record.is_live() && !selected_ids.contains(course_id) {
            plan.ops.push(StructureOp::Archive {
                id: record.id.clone(),
                reason: REMOVED_FROM_PLAN_REASON.to_string(),
                actor: SYNC_ACTOR.to_string(),
                at: now.to_string(),
            });
            plan.stats.archived += 1;
        }
    }

    for record in duplicates {
        warn!(
            "Archiving duplicate curriculum record {} for course {:?}",
            record.id, record.alberta_course_id
        );
        plan.ops.push(StructureOp::Archive {
            id: record.id.clone(),
            reason: DUPLICATE_RECORD_REASON.to_string(),
            actor: SYNC_ACTOR.to_string(),
            at: now.to_string(),
        });
        plan.stats.archived += 1;
    }

    plan
}

/// Keeps curriculum-derived structure records in step with the course selection.
pub struct ReconcileService {
    store: Arc<dyn StructureStore>,
    metadata: Arc<dyn MetadataStore>,
    selection: Arc<dyn CurriculumSelectionSource>,
    catalog: Arc<dyn CourseCatalog>,
    guard: Arc<SyncGuard>,
    events: EventBus,
}

impl ReconcileService {
    pub fn new(
        store: Arc<dyn StructureStore>,
        metadata: Arc<dyn MetadataStore>,
        selection: Arc<dyn CurriculumSelectionSource>,
        catalog: Arc<dyn CourseCatalog>,
        guard: Arc<SyncGuard>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            metadata,
            selection,
            catalog,
            guard,
            events,
        }
    }

    pub fn guard(&self) -> &Arc<SyncGuard> {
        &self.guard
    }

    pub fn selection_source(&self) -> &Arc<dyn CurriculumSelectionSource> {
        &self.selection
    }

    /// One reconciliation pass, unless the guard says the key is busy or already in sync.
    pub async fn run_guarded(&self, key: &PortfolioKey) -> Result<Option<ReconcileStats>, AppError> {
        let Some(ticket) = self.guard.try_begin(key) else {
            debug!("Reconciliation for {} skipped (in flight or already synced)", key);
            return Ok(None);
        };

        match self.reconcile(key).await {
            Ok(stats) => {
                ticket.finish(true);
                Ok(Some(stats))
            }
            Err(e) => {
                error!("Reconciliation for {} failed: {}", key, e);
                ticket.finish(false);
                Err(e)
            }
        }
    }

    /// Unguarded pass: reads current state, plans, applies one atomic batch.
    pub async fn reconcile(&self, key: &PortfolioKey) -> Result<ReconcileStats, AppError> {
        info!("Reconciling curriculum structure for {}", key);

        let selected = self.selection.read(key).await?.flatten();
        let existing = self.store.list_curriculum(key).await?;

        let mut courses = HashMap::new();
        for course_id in missing_course_ids(&selected, &existing) {
            if let Some(course) = self.catalog.lookup(&course_id).await? {
                courses.insert(course_id, course);
            }
        }

        let next_order = self
            .store
            .list_live(&key.student_id)
            .await?
            .iter()
            .filter(|r| r.parent_id.is_none())
            .map(|r| r.order)
            .max()
            .map_or(0, |max| max + 1);

        let now = Utc::now().to_rfc3339();
        let plan = plan_reconciliation(key, &selected, &existing, &courses, next_order, &now);

        if plan.is_empty() {
            debug!("Curriculum structure for {} already in sync", key);
            return Ok(plan.stats);
        }

        self.store.apply_batch(&plan.ops).await?;
        self.events.structure_changed(&key.student_id);

        if plan.stats.archived > 0 || plan.stats.restored > 0 {
            refresh_archived_flag(
                self.store.as_ref(),
                self.metadata.as_ref(),
                &key.family_id,
                &key.student_id,
            )
            .await?;
            self.events.archived_items_changed(&key.student_id);
        }

        info!(
            "Reconciled {} - created: {}, restored: {}, archived: {}, unknown: {}",
            key,
            plan.stats.created,
            plan.stats.restored,
            plan.stats.archived,
            plan.stats.unknown_skipped
        );
        Ok(plan.stats)
    }
}
