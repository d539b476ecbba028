use super::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque row identifier assigned by the datastore on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subscription a row is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub i32);

impl SubscriptionId {
    /// Row is not pinned; it belongs to whichever subscription carries its numeric.
    pub const UNSPECIFIED: SubscriptionId = SubscriptionId(-1);

    pub fn is_specified(&self) -> bool {
        self.0 >= 0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::UNSPECIFIED
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ownership tag partitioning the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Ownership {
    /// Rows owned by the user, the carrier or factory defaults.
    #[default]
    Others,
    /// Rows pushed by the device policy controller.
    Dpc,
}

impl Ownership {
    pub fn code(&self) -> i64 {
        match self {
            Self::Dpc => 0,
            Self::Others => 1,
        }
    }

    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(Self::Dpc),
            1 => Ok(Self::Others),
            other => Err(DbError::InvalidInput(format!("unknown owned_by code {}", other))),
        }
    }
}

/// Edit/delete marker carried by every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditedStatus {
    #[default]
    Unedited,
    UserEdited,
    UserDeleted,
    UserDeletedButPresentInXml,
    CarrierEdited,
    CarrierDeleted,
    CarrierDeletedButPresentInXml,
}

impl EditedStatus {
    pub const ALL: [EditedStatus; 7] = [
        Self::Unedited,
        Self::UserEdited,
        Self::UserDeleted,
        Self::UserDeletedButPresentInXml,
        Self::CarrierEdited,
        Self::CarrierDeleted,
        Self::CarrierDeletedButPresentInXml,
    ];

    pub fn code(&self) -> i64 {
        match self {
            Self::Unedited => 0,
            Self::UserEdited => 1,
            Self::UserDeleted => 2,
            Self::UserDeletedButPresentInXml => 3,
            Self::CarrierEdited => 4,
            Self::CarrierDeleted => 5,
            Self::CarrierDeletedButPresentInXml => 6,
        }
    }

    pub fn from_code(code: i64) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.code() == code)
            .ok_or_else(|| DbError::InvalidInput(format!("unknown edited status {}", code)))
    }

    #[inline]
    pub fn is_unedited(&self) -> bool {
        matches!(self, Self::Unedited)
    }

    /// Tombstone statuses; such rows are hidden from every normal read.
    pub fn is_deleted(&self) -> bool {
        matches!(
            self,
            Self::UserDeleted
                | Self::UserDeletedButPresentInXml
                | Self::CarrierDeleted
                | Self::CarrierDeletedButPresentInXml
        )
    }

    pub fn is_edited(&self) -> bool {
        matches!(self, Self::UserEdited | Self::CarrierEdited)
    }
}

/// How a row restricts itself to one virtual operator on top of MCC/MNC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MvnoType {
    #[default]
    None,
    Spn,
    Imsi,
    Gid,
    Iccid,
}

impl MvnoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Spn => "spn",
            Self::Imsi => "imsi",
            Self::Gid => "gid",
            Self::Iccid => "iccid",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(Self::None),
            "spn" => Ok(Self::Spn),
            "imsi" => Ok(Self::Imsi),
            "gid" => Ok(Self::Gid),
            "iccid" => Ok(Self::Iccid),
            other => Err(DbError::InvalidInput(format!("unknown mvno_type '{}'", other))),
        }
    }
}

/// One APN configuration row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApnRecord {
    pub id: Option<RowId>,
    pub name: String,
    pub apn: String,
    pub numeric: String,
    pub mcc: String,
    pub mnc: String,
    /// Integer code columns written by old schema versions.
    pub legacy_mcc: Option<u16>,
    pub legacy_mnc: Option<u16>,
    pub proxy: String,
    pub port: String,
    pub mmsc: String,
    pub mms_proxy: String,
    pub mms_port: String,
    pub user: String,
    pub password: String,
    pub auth_type: i32,
    pub apn_types: String,
    pub protocol: String,
    pub roaming_protocol: String,
    pub bearer_bitmask: u32,
    pub carrier_enabled: bool,
    pub current: bool,
    pub mvno_type: MvnoType,
    pub mvno_match_data: String,
    pub apn_set_id: i32,
    pub subscription_id: SubscriptionId,
    pub owned_by: Ownership,
    pub edited_status: EditedStatus,
}

impl Default for ApnRecord {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            apn: String::new(),
            numeric: String::new(),
            mcc: String::new(),
            mnc: String::new(),
            legacy_mcc: None,
            legacy_mnc: None,
            proxy: String::new(),
            port: String::new(),
            mmsc: String::new(),
            mms_proxy: String::new(),
            mms_port: String::new(),
            user: String::new(),
            password: String::new(),
            auth_type: -1,
            apn_types: String::new(),
            protocol: "IP".to_string(),
            roaming_protocol: "IP".to_string(),
            bearer_bitmask: 0,
            carrier_enabled: true,
            current: false,
            mvno_type: MvnoType::None,
            mvno_match_data: String::new(),
            apn_set_id: 0,
            subscription_id: SubscriptionId::UNSPECIFIED,
            owned_by: Ownership::Others,
            edited_status: EditedStatus::Unedited,
        }
    }
}

impl ApnRecord {
    pub fn new(apn: impl Into<String>, name: impl Into<String>, numeric: impl Into<String>) -> Self {
        Self {
            apn: apn.into(),
            name: name.into(),
            numeric: numeric.into(),
            ..Self::default()
        }
    }

    pub fn with_mcc_mnc(mut self, mcc: impl Into<String>, mnc: impl Into<String>) -> Self {
        self.mcc = mcc.into();
        self.mnc = mnc.into();
        self
    }

    pub fn with_legacy_codes(mut self, mcc: u16, mnc: u16) -> Self {
        self.legacy_mcc = Some(mcc);
        self.legacy_mnc = Some(mnc);
        self
    }

    pub fn with_mvno(mut self, mvno_type: MvnoType, match_data: impl Into<String>) -> Self {
        self.mvno_type = mvno_type;
        self.mvno_match_data = match_data.into();
        self
    }

    pub fn with_types(mut self, apn_types: impl Into<String>) -> Self {
        self.apn_types = apn_types.into();
        self
    }

    pub fn with_apn_set(mut self, apn_set_id: i32) -> Self {
        self.apn_set_id = apn_set_id;
        self
    }

    pub fn with_status(mut self, status: EditedStatus) -> Self {
        self.edited_status = status;
        self
    }

    pub fn with_subscription(mut self, subscription: SubscriptionId) -> Self {
        self.subscription_id = subscription;
        self
    }

    pub fn with_owner(mut self, owner: Ownership) -> Self {
        self.owned_by = owner;
        self
    }

    pub fn with_current(mut self, current: bool) -> Self {
        self.current = current;
        self
    }

    /// Hidden rows are tombstones kept only to remember deletion intent.
    #[inline]
    pub fn is_visible(&self) -> bool {
        !self.edited_status.is_deleted()
    }

    pub fn has_mvno(&self) -> bool {
        self.mvno_type != MvnoType::None
    }

    pub fn merge_key(&self) -> MergeKey {
        MergeKey {
            numeric: self.numeric.clone(),
            mcc: self.mcc.clone(),
            mnc: self.mnc.clone(),
            apn: self.apn.clone(),
            proxy: self.proxy.clone(),
            port: self.port.clone(),
            mmsc: self.mmsc.clone(),
            mms_proxy: self.mms_proxy.clone(),
            mms_port: self.mms_port.clone(),
            protocol: self.protocol.clone(),
            roaming_protocol: self.roaming_protocol.clone(),
            carrier_enabled: self.carrier_enabled,
            bearer_bitmask: self.bearer_bitmask,
            mvno_type: self.mvno_type,
            mvno_match_data: self.mvno_match_data.clone(),
            subscription_id: self.subscription_id,
            owned_by: self.owned_by,
        }
    }

    /// Lock scope serializing writers that could collide with this row.
    pub fn scope(&self) -> (Ownership, SubscriptionId) {
        (self.owned_by, self.subscription_id)
    }
}

/// Natural key on which inserts collide. `name` is not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MergeKey {
    pub numeric: String,
    pub mcc: String,
    pub mnc: String,
    pub apn: String,
    pub proxy: String,
    pub port: String,
    pub mmsc: String,
    pub mms_proxy: String,
    pub mms_port: String,
    pub protocol: String,
    pub roaming_protocol: String,
    pub carrier_enabled: bool,
    pub bearer_bitmask: u32,
    pub mvno_type: MvnoType,
    pub mvno_match_data: String,
    pub subscription_id: SubscriptionId,
    pub owned_by: Ownership,
}
