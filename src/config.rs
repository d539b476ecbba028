use crate::core::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Provider configuration
///
/// Every field has a default, so a JSON file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Uids allowed on the DPC, FILTERED and ENFORCE_MANAGED scopes
    pub privileged_uids: Vec<u32>,

    /// Initial value of the enforcement flag
    pub enforce_managed_default: bool,

    /// Attempts of one restore before giving up
    pub restore_max_attempts: u32,

    /// Capacity of the notification channel
    pub notification_capacity: usize,

    /// Rewrite legacy integer MCC/MNC rows when they are read
    pub lazy_mcc_mnc_migration: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            privileged_uids: vec![1000, 1001],
            enforce_managed_default: false,
            restore_max_attempts: 3,
            notification_capacity: 64,
            lazy_mcc_mnc_migration: true,
        }
    }
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the privileged uid allow-list
    pub fn privileged_uids(mut self, uids: impl IntoIterator<Item = u32>) -> Self {
        self.privileged_uids = uids.into_iter().collect();
        self
    }

    pub fn enforce_managed_default(mut self, enforced: bool) -> Self {
        self.enforce_managed_default = enforced;
        self
    }

    pub fn restore_max_attempts(mut self, attempts: u32) -> Self {
        self.restore_max_attempts = attempts;
        self
    }

    pub fn notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity;
        self
    }

    pub fn lazy_mcc_mnc_migration(mut self, enabled: bool) -> Self {
        self.lazy_mcc_mnc_migration = enabled;
        self
    }

    /// Load and validate a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.restore_max_attempts == 0 {
            return Err(DbError::Config("restore_max_attempts must be at least 1".into()));
        }
        if self.notification_capacity == 0 {
            return Err(DbError::Config("notification_capacity must be at least 1".into()));
        }
        Ok(())
    }
}
