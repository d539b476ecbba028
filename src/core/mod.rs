pub mod error;
pub mod predicate;
pub mod record;
pub mod update;
pub mod value;

pub use error::{DbError, Result};
pub use predicate::{CompareOp, Field, Order, Predicate};
pub use record::{ApnRecord, EditedStatus, MergeKey, MvnoType, Ownership, RowId, SubscriptionId};
pub use update::ApnUpdate;
pub use value::Value;
