use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::AppError;
use crate::events::{EventBus, PortfolioEvent};
use crate::models::StructureRecord;
use crate::store::{MetadataStore, StructureStore};

pub const STARTER_ACTOR: &str = "starter-content";

/// Seeds one placeholder portfolio when a student has no live structure at all.
pub struct StarterContentPolicy {
    store: Arc<dyn StructureStore>,
    metadata: Arc<dyn MetadataStore>,
    events: EventBus,
    grace_period: Duration,
}

impl StarterContentPolicy {
    pub fn new(
        store: Arc<dyn StructureStore>,
        metadata: Arc<dyn MetadataStore>,
        events: EventBus,
        grace_period: Duration,
    ) -> Self {
        Self {
            store,
            metadata,
            events,
            grace_period,
        }
    }

    /// Waits until the student's structure has been quiet for the grace period,
    /// then seeds if still empty. Gives reconciliation time to populate first.
    pub async fn watch(
        &self,
        family_id: &str,
        student_id: &str,
    ) -> Result<Option<StructureRecord>, AppError> {
        let mut rx = self.events.subscribe();
        let quiet = tokio::time::sleep(self.grace_period);
        tokio::pin!(quiet);

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Ok(PortfolioEvent::StructureChanged { student_id: changed }) if changed == student_id => {
                        debug!("structure activity for {}, restarting starter grace period", student_id);
                        quiet.as_mut().reset(Instant::now() + self.grace_period);
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                },
                _ = &mut quiet => break,
            }
        }

        self.seed_if_empty(family_id, student_id).await
    }

    /// Creates the starter record unless it was deliberately removed before or the
    /// store already holds live records. Re-checks the store, not cached state.
    pub async fn seed_if_empty(
        &self,
        family_id: &str,
        student_id: &str,
    ) -> Result<Option<StructureRecord>, AppError> {
        let metadata = self.metadata.get(student_id).await?;
        if metadata.starter_course_deleted {
            debug!("starter content disabled for {}", student_id);
            return Ok(None);
        }

        if self.store.count_live(student_id).await? > 0 {
            debug!("structure for {} already populated, not seeding", student_id);
            return Ok(None);
        }

        let record =
            StructureRecord::new_starter(family_id, student_id, STARTER_ACTOR, &Utc::now().to_rfc3339());
        self.store.create(&record).await?;
        info!("Seeded starter portfolio {} for {}", record.id, student_id);
        self.events.structure_changed(student_id);

        Ok(Some(record))
    }
}
