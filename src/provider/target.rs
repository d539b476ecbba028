use crate::access::Scope;
use crate::core::{Field, Predicate, RowId, SubscriptionId};
use serde::{Deserialize, Serialize};

/// Address of a request: a whole scoped table, or one row of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum Target {
    Table {
        scope: Scope,
        subscription: Option<SubscriptionId>,
    },
    Row {
        scope: Scope,
        id: RowId,
    },
}

impl Target {
    pub fn table(scope: Scope) -> Self {
        Self::Table {
            scope,
            subscription: None,
        }
    }

    pub fn subscription(scope: Scope, subscription: SubscriptionId) -> Self {
        Self::Table {
            scope,
            subscription: Some(subscription),
        }
    }

    pub fn row(scope: Scope, id: RowId) -> Self {
        Self::Row { scope, id }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Self::Table { scope, .. } | Self::Row { scope, .. } => *scope,
        }
    }

    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        match self {
            Self::Table { subscription, .. } => *subscription,
            Self::Row { .. } => None,
        }
    }

    /// Row filter of a row target; `All` for table targets.
    pub(crate) fn row_predicate(&self) -> Predicate {
        match self {
            Self::Row { id, .. } => match i64::try_from(id.0) {
                Ok(id) => Predicate::eq(Field::Id, id),
                Err(_) => Predicate::All.not(),
            },
            Self::Table { .. } => Predicate::All,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ApnRecord;

    #[test]
    fn test_row_target_selects_one_id() {
        let mut rec = ApnRecord::new("a", "a", "123456");
        rec.id = Some(RowId(3));

        assert!(Target::row(Scope::General, RowId(3)).row_predicate().matches(&rec));
        assert!(!Target::row(Scope::General, RowId(4)).row_predicate().matches(&rec));
        assert!(Target::table(Scope::Dpc).row_predicate().matches(&rec));
    }

    #[test]
    fn test_row_target_beyond_i64_matches_nothing() {
        let mut rec = ApnRecord::new("a", "a", "123456");
        rec.id = Some(RowId(u64::MAX));

        assert!(!Target::row(Scope::General, RowId(u64::MAX)).row_predicate().matches(&rec));
        assert!(!Predicate::eq(Field::Id, -1i64).matches(&rec));
    }

    #[test]
    fn test_accessors() {
        let t = Target::subscription(Scope::Filtered, SubscriptionId(2));
        assert_eq!(t.scope(), Scope::Filtered);
        assert_eq!(t.subscription_id(), Some(SubscriptionId(2)));
        assert_eq!(Target::row(Scope::Dpc, RowId(1)).subscription_id(), None);
    }
}
