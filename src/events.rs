use serde::Serialize;
use tokio::sync::broadcast;

/// Notifications for listeners of a student's structure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PortfolioEvent {
    StructureChanged { student_id: String },
    ArchivedItemsChanged { student_id: String },
}

impl PortfolioEvent {
    pub fn student_id(&self) -> &str {
        match self {
            PortfolioEvent::StructureChanged { student_id }
            | PortfolioEvent::ArchivedItemsChanged { student_id } => student_id,
        }
    }
}

/// Broadcast bus fanning events out to every subscriber.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PortfolioEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PortfolioEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: PortfolioEvent) {
        // No receivers is fine; lagging ones miss events rather than block writers.
        let _ = self.sender.send(event);
    }

    pub fn structure_changed(&self, student_id: &str) {
        self.publish(PortfolioEvent::StructureChanged {
            student_id: student_id.to_string(),
        });
    }

    pub fn archived_items_changed(&self, student_id: &str) {
        self.publish(PortfolioEvent::ArchivedItemsChanged {
            student_id: student_id.to_string(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
