use tokio::sync::{RwLock, RwLockReadGuard};

/// Global "DPC APNs are enforced" switch.
///
/// FILTERED operations hold the read guard for their whole duration, so a
/// toggle waits for in-flight FILTERED writes and is seen by the next one.
#[derive(Debug, Default)]
pub struct EnforcedFlag {
    value: RwLock<bool>,
}

impl EnforcedFlag {
    pub fn new(initial: bool) -> Self {
        Self {
            value: RwLock::new(initial),
        }
    }

    pub async fn get(&self) -> bool {
        *self.value.read().await
    }

    pub async fn hold(&self) -> RwLockReadGuard<'_, bool> {
        self.value.read().await
    }

    /// Returns true when the value changed.
    pub async fn set(&self, enforced: bool) -> bool {
        let mut value = self.value.write().await;
        let changed = *value != enforced;
        *value = enforced;
        changed
    }
}
