use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::AppError;
use crate::events::EventBus;
use crate::models::{NewStructureRequest, StructureRecord, StructureType};
use crate::store::{StructureOp, StructureStore};

pub const UNSORTED_PORTFOLIO: &str = "Unsorted";
pub const BACKFILL_ACTOR: &str = "structure-backfill";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillStats {
    pub structures_created: usize,
    pub entries_assigned: usize,
}

/// Gives orphaned entries a home by creating the portfolios and collections their
/// legacy labels name, reusing live records with matching titles.
///
/// Safe to call repeatedly: assigned entries are no longer orphans, so a second call
/// stages nothing. Curriculum records are never reused or modified.
pub async fn initialize_structure_from_entries(
    store: &dyn StructureStore,
    events: &EventBus,
    student_id: &str,
) -> Result<BackfillStats, AppError> {
    let orphans = store.list_orphan_entries(student_id).await?;
    if orphans.is_empty() {
        debug!("no orphaned entries for {}", student_id);
        return Ok(BackfillStats::default());
    }

    let live = store.list_live(student_id).await?;
    let now = Utc::now().to_rfc3339();

    let mut portfolios: HashMap<String, String> = live
        .iter()
        .filter(|r| {
            r.record_type == StructureType::Portfolio && r.parent_id.is_none() && !r.is_alberta_course
        })
        .map(|r| (r.title.clone(), r.id.clone()))
        .collect();
    let mut collections: HashMap<(String, String), String> = live
        .iter()
        .filter(|r| r.record_type == StructureType::Collection && !r.is_alberta_course)
        .filter_map(|r| {
            r.parent_id
                .clone()
                .map(|parent| ((parent, r.title.clone()), r.id.clone()))
        })
        .collect();

    let mut next_order = live
        .iter()
        .filter(|r| r.parent_id.is_none())
        .map(|r| r.order)
        .max()
        .map_or(0, |max| max + 1);

    let mut ops = Vec::new();
    let mut stats = BackfillStats::default();

    for entry in &orphans {
        let portfolio_title = entry
            .legacy_portfolio
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNSORTED_PORTFOLIO)
            .to_string();

        let portfolio_id = match portfolios.get(&portfolio_title) {
            Some(id) => id.clone(),
            None => {
                let record = new_record(
                    entry.family_id.clone(),
                    student_id,
                    StructureType::Portfolio,
                    None,
                    &portfolio_title,
                    next_order,
                    &now,
                );
                next_order += 1;
                portfolios.insert(portfolio_title.clone(), record.id.clone());
                let id = record.id.clone();
                ops.push(StructureOp::Create(record));
                stats.structures_created += 1;
                id
            }
        };

        let target_id = match entry
            .legacy_collection
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            None => portfolio_id,
            Some(collection_title) => {
                let lookup = (portfolio_id.clone(), collection_title.to_string());
                match collections.get(&lookup) {
                    Some(id) => id.clone(),
                    None => {
                        let siblings = collections.keys().filter(|(p, _)| *p == portfolio_id).count();
                        let record = new_record(
                            entry.family_id.clone(),
                            student_id,
                            StructureType::Collection,
                            Some(portfolio_id.clone()),
                            collection_title,
                            siblings as i64,
                            &now,
                        );
                        let id = record.id.clone();
                        collections.insert(lookup, id.clone());
                        ops.push(StructureOp::Create(record));
                        stats.structures_created += 1;
                        id
                    }
                }
            }
        };

        ops.push(StructureOp::AssignEntry {
            entry_id: entry.id.clone(),
            structure_id: target_id,
        });
        stats.entries_assigned += 1;
    }

    store.apply_batch(&ops).await?;
    events.structure_changed(student_id);
    info!(
        "Backfilled structure for {}: {} records created, {} entries assigned",
        student_id, stats.structures_created, stats.entries_assigned
    );

    Ok(stats)
}

fn new_record(
    family_id: String,
    student_id: &str,
    record_type: StructureType,
    parent_id: Option<String>,
    title: &str,
    order: i64,
    now: &str,
) -> StructureRecord {
    StructureRecord::from_request(
        NewStructureRequest {
            family_id,
            student_id: student_id.to_string(),
            record_type,
            parent_id,
            title: title.to_string(),
            description: None,
            order: Some(order),
            icon: None,
            color: None,
        },
        BACKFILL_ACTOR,
        now,
    )
}
