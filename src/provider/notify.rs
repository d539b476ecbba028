use crate::core::SubscriptionId;
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use tokio::sync::broadcast;

/// Change notification published after a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// Rows of the table changed
    ApnTable {
        subscription: Option<SubscriptionId>,
        at: DateTime<Utc>,
    },
    /// A restore to factory defaults completed
    Restore {
        subscription: Option<SubscriptionId>,
        at: DateTime<Utc>,
    },
    EnforcedChanged { enforced: bool, at: DateTime<Utc> },
}

impl Notification {
    pub fn apn_table(subscription: Option<SubscriptionId>) -> Self {
        Self::ApnTable {
            subscription,
            at: Utc::now(),
        }
    }

    pub fn restore(subscription: Option<SubscriptionId>) -> Self {
        Self::Restore {
            subscription,
            at: Utc::now(),
        }
    }

    pub fn enforced_changed(enforced: bool) -> Self {
        Self::EnforcedChanged {
            enforced,
            at: Utc::now(),
        }
    }

    pub fn is_restore(&self) -> bool {
        matches!(self, Self::Restore { .. })
    }
}

/// Fire-and-forget notification fan-out.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Never blocks; a missing subscriber is not an error.
    pub fn publish(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            debug!("notification dropped: no subscribers");
        }
    }
}
