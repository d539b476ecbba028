// ============================================================================
// apnstore Library
// ============================================================================
//
// The APN configuration table of a device: rows from factory defaults, user
// edits, carrier pushes and the device policy controller reconciled into one
// table, with per-caller access partitions and restore-to-default.
//
// ============================================================================

pub mod access;
pub mod config;
pub mod core;
pub mod lookup;
pub mod merge;
pub mod migration;
pub mod prelude;
pub mod provider;
pub mod restore;
pub mod selector;
pub mod storage;

// Re-export main types for convenience
pub use access::{Caller, Permission, Scope};
pub use config::ProviderConfig;
pub use core::{
    ApnRecord, ApnUpdate, DbError, EditedStatus, Field, MvnoType, Order, Ownership, Predicate,
    Result, RowId, SubscriptionId, Value,
};
pub use provider::{ApnProvider, Notification, Target};
