use super::caller::{Caller, Permission};
use crate::core::{DbError, Field, Ownership, Predicate, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Table surface a request is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Ordinary table; DPC rows are invisible here
    General,
    /// Rows pushed by the device policy controller
    Dpc,
    /// DPC rows while enforcement is on, OTHERS rows otherwise
    Filtered,
    /// The enforcement flag itself
    EnforceManaged,
}

impl Scope {
    pub fn is_privileged(&self) -> bool {
        !matches!(self, Self::General)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::General => "general",
            Self::Dpc => "dpc",
            Self::Filtered => "filtered",
            Self::EnforceManaged => "enforce_managed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verb {
    Query,
    Insert,
    Update,
    Delete,
}

impl Verb {
    #[inline]
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::Query)
    }
}

/// Slice of the table an authorized request may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// Only rows with this owner are visible
    pub ownership: Ownership,
    /// Owner stamped on inserted rows, whatever the caller supplied
    pub forced_owner: Option<Ownership>,
}

impl Partition {
    fn new(ownership: Ownership, verb: Verb) -> Self {
        Self {
            ownership,
            forced_owner: (verb == Verb::Insert).then_some(ownership),
        }
    }

    /// Row filter for this partition.
    pub fn predicate(&self) -> Predicate {
        Predicate::eq(Field::OwnedBy, self.ownership.code())
    }
}

/// Decides which partition a caller gets for a (scope, verb) pair
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    privileged_uids: HashSet<u32>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new([Caller::SYSTEM_UID, Caller::PHONE_UID])
    }
}

impl AccessPolicy {
    pub fn new(privileged_uids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            privileged_uids: privileged_uids.into_iter().collect(),
        }
    }

    pub fn is_privileged(&self, caller: &Caller) -> bool {
        self.privileged_uids.contains(&caller.uid())
    }

    /// Authorize `verb` on `scope`.
    ///
    /// `enforced` is the current value of the enforcement flag; it only
    /// matters for [`Scope::Filtered`].
    pub fn authorize(
        &self,
        caller: &Caller,
        scope: Scope,
        verb: Verb,
        enforced: bool,
    ) -> Result<Partition> {
        if scope.is_privileged() && !self.is_privileged(caller) {
            return Err(DbError::security(format!(
                "uid {} may not {:?} the {} scope",
                caller.uid(),
                verb,
                scope
            )));
        }

        match scope {
            Scope::General => {
                if verb.is_write() && !caller.has_permission(Permission::WriteApnSettings) {
                    return Err(DbError::security(format!(
                        "uid {} lacks {:?}",
                        caller.uid(),
                        Permission::WriteApnSettings
                    )));
                }
                Ok(Partition::new(Ownership::Others, verb))
            }
            Scope::Dpc | Scope::EnforceManaged => Ok(Partition::new(Ownership::Dpc, verb)),
            Scope::Filtered => {
                let ownership = if enforced { Ownership::Dpc } else { Ownership::Others };
                Ok(Partition::new(ownership, verb))
            }
        }
    }
}
