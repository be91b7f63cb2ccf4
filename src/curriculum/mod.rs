pub mod catalog;
pub mod memory;
pub mod realtime;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::models::{CourseInfo, CourseSelection, PortfolioKey};

pub use catalog::StaticCourseCatalog;
pub use memory::InMemorySelectionSource;
pub use realtime::{RealtimeConfig, RealtimeSelectionClient};

/// Externally edited source of truth for a student's selected courses.
#[async_trait]
pub trait CurriculumSelectionSource: Send + Sync {
    async fn read(&self, key: &PortfolioKey) -> Result<CourseSelection, AppError>;

    /// Starts listening for changes to `key`. Dropping the returned handle unsubscribes.
    async fn subscribe(&self, key: &PortfolioKey) -> Result<SelectionSubscription, AppError>;
}

#[async_trait]
pub trait CourseCatalog: Send + Sync {
    async fn lookup(&self, course_id: &str) -> Result<Option<CourseInfo>, AppError>;
}

/// Change notifications for one key. Carries no payload: listeners re-read the source.
pub struct SelectionSubscription {
    rx: mpsc::Receiver<()>,
    poller: Option<JoinHandle<()>>,
}

impl SelectionSubscription {
    pub fn new(rx: mpsc::Receiver<()>, poller: Option<JoinHandle<()>>) -> Self {
        Self { rx, poller }
    }

    /// Waits for the next change. `None` once the source has gone away.
    pub async fn changed(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

impl Drop for SelectionSubscription {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}
