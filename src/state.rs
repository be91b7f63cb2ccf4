use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;

use crate::curriculum::{CourseCatalog, CurriculumSelectionSource};
use crate::db::{SqliteMetadataStore, SqliteStructureStore};
use crate::events::EventBus;
use crate::services::{
    PortfolioService, ReconcileService, SessionDeps, SessionManager, StarterContentPolicy,
    SyncGuard,
};
use crate::store::{MetadataStore, StructureStore};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub events: EventBus,
    pub portfolio: Arc<PortfolioService>,
    pub reconcile: Arc<ReconcileService>,
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    /// Wires the services around one pool. The guard is created here, once per
    /// application instance, and shared by every reconciliation entry point.
    pub fn new(
        db: SqlitePool,
        selection: Arc<dyn CurriculumSelectionSource>,
        catalog: Arc<dyn CourseCatalog>,
        debounce: Duration,
        starter_grace: Duration,
    ) -> Self {
        let store: Arc<dyn StructureStore> = Arc::new(SqliteStructureStore::new(db.clone()));
        let metadata: Arc<dyn MetadataStore> = Arc::new(SqliteMetadataStore::new(db.clone()));
        let events = EventBus::default();
        let guard = Arc::new(SyncGuard::new());

        let portfolio = Arc::new(PortfolioService::new(
            store.clone(),
            metadata.clone(),
            events.clone(),
        ));
        let reconcile = Arc::new(ReconcileService::new(
            store.clone(),
            metadata.clone(),
            selection,
            catalog,
            guard,
            events.clone(),
        ));
        let starter = Arc::new(StarterContentPolicy::new(
            store.clone(),
            metadata,
            events.clone(),
            starter_grace,
        ));
        let sessions = Arc::new(SessionManager::new(SessionDeps {
            reconcile: reconcile.clone(),
            starter,
            store,
            events: events.clone(),
            debounce,
        }));

        Self {
            db,
            events,
            portfolio,
            reconcile,
            sessions,
        }
    }
}
