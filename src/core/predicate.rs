// ============================================================================
// Typed Selection Predicates
// ============================================================================
//
// Callers select rows with a small AST instead of SQL fragments. Evaluation is
// total: a comparison between values of different types simply does not match,
// and a predicate matching nothing is a valid (empty) result.
//
// ============================================================================

use super::{ApnRecord, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Column of the APN table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Id,
    Name,
    Apn,
    Numeric,
    Mcc,
    Mnc,
    Proxy,
    Port,
    Mmsc,
    MmsProxy,
    MmsPort,
    User,
    Password,
    AuthType,
    ApnTypes,
    Protocol,
    RoamingProtocol,
    BearerBitmask,
    CarrierEnabled,
    Current,
    MvnoType,
    MvnoMatchData,
    ApnSetId,
    SubscriptionId,
    OwnedBy,
    EditedStatus,
}

impl Field {
    /// Project a row onto this column.
    pub fn value_of(&self, rec: &ApnRecord) -> Value {
        match self {
            Self::Id => Value::from(rec.id.and_then(|id| i64::try_from(id.0).ok())),
            Self::Name => Value::from(rec.name.as_str()),
            Self::Apn => Value::from(rec.apn.as_str()),
            Self::Numeric => Value::from(rec.numeric.as_str()),
            Self::Mcc => Value::from(rec.mcc.as_str()),
            Self::Mnc => Value::from(rec.mnc.as_str()),
            Self::Proxy => Value::from(rec.proxy.as_str()),
            Self::Port => Value::from(rec.port.as_str()),
            Self::Mmsc => Value::from(rec.mmsc.as_str()),
            Self::MmsProxy => Value::from(rec.mms_proxy.as_str()),
            Self::MmsPort => Value::from(rec.mms_port.as_str()),
            Self::User => Value::from(rec.user.as_str()),
            Self::Password => Value::from(rec.password.as_str()),
            Self::AuthType => Value::from(rec.auth_type),
            Self::ApnTypes => Value::from(rec.apn_types.as_str()),
            Self::Protocol => Value::from(rec.protocol.as_str()),
            Self::RoamingProtocol => Value::from(rec.roaming_protocol.as_str()),
            Self::BearerBitmask => Value::from(rec.bearer_bitmask),
            Self::CarrierEnabled => Value::from(rec.carrier_enabled),
            Self::Current => Value::from(rec.current),
            Self::MvnoType => Value::from(rec.mvno_type.as_str()),
            Self::MvnoMatchData => Value::from(rec.mvno_match_data.as_str()),
            Self::ApnSetId => Value::from(rec.apn_set_id),
            Self::SubscriptionId => Value::from(rec.subscription_id.0),
            Self::OwnedBy => Value::Integer(rec.owned_by.code()),
            Self::EditedStatus => Value::Integer(rec.edited_status.code()),
        }
    }
}

/// Comparison operator of a leaf predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::NotEq => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::LtEq => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::GtEq => ordering != Ordering::Less,
        }
    }
}

/// Row selection expression.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Predicate {
    #[default]
    All,
    Compare(Field, CompareOp, Value),
    In(Field, Vec<Value>),
    IsEmpty(Field),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn eq(field: Field, value: impl Into<Value>) -> Self {
        Self::Compare(field, CompareOp::Eq, value.into())
    }

    pub fn not_eq(field: Field, value: impl Into<Value>) -> Self {
        Self::Compare(field, CompareOp::NotEq, value.into())
    }

    pub fn is_in<V: Into<Value>>(field: Field, values: impl IntoIterator<Item = V>) -> Self {
        Self::In(field, values.into_iter().map(Into::into).collect())
    }

    /// Conjunction that flattens `All` operands away.
    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Self::All, p) | (p, Self::All) => p,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), p) => {
                left.push(p);
                Self::And(left)
            }
            (p, other) => Self::And(vec![p, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match (self, other) {
            (Self::Or(mut left), p) => {
                left.push(p);
                Self::Or(left)
            }
            (p, other) => Self::Or(vec![p, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn matches(&self, rec: &ApnRecord) -> bool {
        match self {
            Self::All => true,
            Self::Compare(field, op, expected) => field
                .value_of(rec)
                .compare(expected)
                .is_some_and(|ordering| op.holds(ordering)),
            Self::In(field, values) => {
                let actual = field.value_of(rec);
                values.iter().any(|v| *v == actual)
            }
            Self::IsEmpty(field) => field.value_of(rec).is_empty(),
            Self::And(parts) => parts.iter().all(|p| p.matches(rec)),
            Self::Or(parts) => parts.iter().any(|p| p.matches(rec)),
            Self::Not(inner) => !inner.matches(rec),
        }
    }
}

/// Result ordering for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Order {
    #[default]
    IdAscending,
    IdDescending,
}
