//! Everything an embedding application usually needs, in one import.
//!
//! `use apnstore::prelude::*;` brings in the provider, its request types and
//! the shipped collaborator implementations.

pub use crate::access::{Caller, Permission, Scope};
pub use crate::config::ProviderConfig;
pub use crate::core::{
    ApnRecord, ApnUpdate, DbError, EditedStatus, Field, MvnoType, Order, Ownership, Predicate,
    Result, RowId, SubscriptionId,
};
pub use crate::lookup::{CarrierIdentity, DefaultApnSource, SimIdentity, StaticCarrierIdentity, StaticDefaults};
pub use crate::merge::MergeOutcome;
pub use crate::provider::{ApnProvider, Notification, Target};
pub use crate::restore::RestoreReport;
pub use crate::storage::{ApnStore, InMemoryApnStore};
