pub mod caller;
pub mod enforced;
pub mod partition;

pub use caller::{Caller, Permission};
pub use enforced::EnforcedFlag;
pub use partition::{AccessPolicy, Partition, Scope, Verb};
