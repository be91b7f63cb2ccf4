use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::curriculum::SelectionSubscription;
use crate::error::AppError;
use crate::events::EventBus;
use crate::models::PortfolioKey;
use crate::services::backfill::initialize_structure_from_entries;
use crate::services::reconcile::ReconcileService;
use crate::services::starter::StarterContentPolicy;
use crate::store::StructureStore;

/// Default coalescing window for bursts of selection changes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Clone)]
pub struct SessionDeps {
    pub reconcile: Arc<ReconcileService>,
    pub starter: Arc<StarterContentPolicy>,
    pub store: Arc<dyn StructureStore>,
    pub events: EventBus,
    pub debounce: Duration,
}

/// Background work for the portfolio currently open. Dropping it stops the
/// selection watcher and the starter policy and unsubscribes from the source.
pub struct PortfolioSession {
    key: PortfolioKey,
    watcher: JoinHandle<()>,
    starter: JoinHandle<()>,
}

impl PortfolioSession {
    /// Backfills, runs the initial reconciliation, then keeps watching the selection.
    pub async fn open(key: PortfolioKey, deps: SessionDeps) -> Result<Self, AppError> {
        info!("Opening portfolio session for {}", key);

        if let Err(e) =
            initialize_structure_from_entries(deps.store.as_ref(), &deps.events, &key.student_id).await
        {
            warn!("Structure backfill for {} failed: {}", key.student_id, e);
        }

        // Subscribe before the first pass so no change slips between read and listen.
        let subscription = deps.reconcile.selection_source().subscribe(&key).await?;

        // The memo only tracks changes while subscribed; anything may have moved while closed.
        deps.reconcile.guard().invalidate(&key);
        if let Err(e) = deps.reconcile.run_guarded(&key).await {
            warn!("Initial reconciliation for {} failed, waiting for next change: {}", key, e);
        }

        let watcher = tokio::spawn(watch_selection(
            key.clone(),
            subscription,
            deps.reconcile.clone(),
            deps.debounce,
        ));

        let starter_policy = deps.starter.clone();
        let starter_key = key.clone();
        let starter = tokio::spawn(async move {
            if let Err(e) = starter_policy
                .watch(&starter_key.family_id, &starter_key.student_id)
                .await
            {
                warn!("Starter content check for {} failed: {}", starter_key.student_id, e);
            }
        });

        Ok(Self {
            key,
            watcher,
            starter,
        })
    }

    pub fn key(&self) -> &PortfolioKey {
        &self.key
    }

    pub fn is_watching(&self) -> bool {
        !self.watcher.is_finished()
    }
}

impl Drop for PortfolioSession {
    fn drop(&mut self) {
        self.watcher.abort();
        self.starter.abort();
    }
}

/// Invalidates the guard on every notification, then waits for the burst to settle
/// and runs a single guarded pass.
async fn watch_selection(
    key: PortfolioKey,
    mut subscription: SelectionSubscription,
    reconcile: Arc<ReconcileService>,
    debounce: Duration,
) {
    let mut pending = false;

    loop {
        if pending {
            tokio::select! {
                change = subscription.changed() => match change {
                    Some(()) => reconcile.guard().invalidate(&key),
                    None => break,
                },
                _ = tokio::time::sleep(debounce) => {
                    pending = false;
                    match reconcile.run_guarded(&key).await {
                        // Another pass holds the key; try again after the next window.
                        Ok(None) if reconcile.guard().is_in_flight(&key) => pending = true,
                        Ok(_) => {}
                        Err(e) => warn!("Reconciliation after selection change failed for {}: {}", key, e),
                    }
                }
            }
        } else {
            match subscription.changed().await {
                Some(()) => {
                    reconcile.guard().invalidate(&key);
                    pending = true;
                }
                None => break,
            }
        }
    }

    info!("Selection watcher for {} stopped", key);
}

/// Holds the single open portfolio session.
pub struct SessionManager {
    deps: SessionDeps,
    active: Mutex<Option<PortfolioSession>>,
}

impl SessionManager {
    pub fn new(deps: SessionDeps) -> Self {
        Self {
            deps,
            active: Mutex::new(None),
        }
    }

    /// Opens `key`, closing whichever session was open before. Reopening the
    /// active key is a no-op.
    pub async fn open(&self, key: PortfolioKey) -> Result<(), AppError> {
        let mut active = self.active.lock().await;
        if let Some(session) = active.as_ref() {
            if session.key() == &key && session.is_watching() {
                return Ok(());
            }
        }

        if let Some(previous) = active.take() {
            info!("Closing portfolio session for {}", previous.key());
        }
        *active = Some(PortfolioSession::open(key, self.deps.clone()).await?);
        Ok(())
    }

    pub async fn active_key(&self) -> Option<PortfolioKey> {
        self.active.lock().await.as_ref().map(|s| s.key().clone())
    }

    pub async fn close(&self) {
        if let Some(session) = self.active.lock().await.take() {
            info!("Closing portfolio session for {}", session.key());
        }
    }
}
