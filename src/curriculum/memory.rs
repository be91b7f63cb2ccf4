use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::curriculum::{CurriculumSelectionSource, SelectionSubscription};
use crate::error::AppError;
use crate::models::{CourseSelection, PortfolioKey};

const SUBSCRIBER_BUFFER: usize = 16;

/// Process-local selection source. Used when no realtime endpoint is configured, and in tests.
#[derive(Default)]
pub struct InMemorySelectionSource {
    selections: Mutex<HashMap<PortfolioKey, CourseSelection>>,
    subscribers: Mutex<Vec<(PortfolioKey, mpsc::Sender<()>)>>,
}

impl InMemorySelectionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the selection for `key` and notifies its subscribers.
    pub fn set(&self, key: &PortfolioKey, selection: CourseSelection) {
        self.selections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), selection);
        self.notify(key);
    }

    /// Notifies subscribers without changing the stored selection.
    pub fn notify(&self, key: &PortfolioKey) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|(_, tx)| !tx.is_closed());
        for (subscribed, tx) in subscribers.iter() {
            if subscribed == key {
                // A full buffer already holds an undelivered notification.
                let _ = tx.try_send(());
            }
        }
    }
}

#[async_trait]
impl CurriculumSelectionSource for InMemorySelectionSource {
    async fn read(&self, key: &PortfolioKey) -> Result<CourseSelection, AppError> {
        Ok(self
            .selections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn subscribe(&self, key: &PortfolioKey) -> Result<SelectionSubscription, AppError> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).push((key.clone(), tx));
        Ok(SelectionSubscription::new(rx, None))
    }
}
