// Change events emitted for the external rendering layer
use crate::domain::VersionKind;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

/// Events the version manager and session emit. The rendering layer (out of
/// scope here) subscribes and redraws on receipt instead of watching state.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    VersionSwitched { current: VersionKind },
    StructureChanged,
    DraftSaved,
    Published,
    TabLoaded { tab_id: String },
    Notify { level: NotifyLevel, message: String },
}

/// Broadcast fan-out for [`DashboardEvent`]. Emitting with no subscribers is
/// fine; the send result is discarded.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DashboardEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: DashboardEvent) {
        let _ = self.tx.send(event);
    }

    pub fn notify(&self, level: NotifyLevel, message: impl Into<String>) {
        self.emit(DashboardEvent::Notify {
            level,
            message: message.into(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
