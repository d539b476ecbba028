use crate::core::{RowId, SubscriptionId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Preferred-APN pointer per subscription
#[derive(Debug, Default)]
pub struct PreferenceStore {
    pointers: RwLock<HashMap<SubscriptionId, RowId>>,
}

impl PreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, subscription: SubscriptionId) -> Option<RowId> {
        self.pointers.read().await.get(&subscription).copied()
    }

    pub async fn set(&self, subscription: SubscriptionId, id: RowId) {
        self.pointers.write().await.insert(subscription, id);
    }

    /// Returns the pointer that was removed, if any.
    pub async fn clear(&self, subscription: SubscriptionId) -> Option<RowId> {
        self.pointers.write().await.remove(&subscription)
    }

    pub async fn clear_all(&self) -> usize {
        let mut pointers = self.pointers.write().await;
        let cleared = pointers.len();
        pointers.clear();
        cleared
    }
}
