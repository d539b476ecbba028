//! Collaborators the provider consults but does not own: the carrier
//! identity of each SIM and the factory APN list.

use crate::core::{ApnRecord, EditedStatus, Result, SubscriptionId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Identity fields of the SIM behind a subscription.
///
/// Unknown fields are `None` and never match an MVNO constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimIdentity {
    pub mcc_mnc: Option<String>,
    pub spn: Option<String>,
    pub imsi: Option<String>,
    pub gid1: Option<String>,
    pub iccid: Option<String>,
}

impl SimIdentity {
    pub fn new(mcc_mnc: impl Into<String>) -> Self {
        Self {
            mcc_mnc: Some(mcc_mnc.into()),
            ..Self::default()
        }
    }

    pub fn with_spn(mut self, spn: impl Into<String>) -> Self {
        self.spn = Some(spn.into());
        self
    }

    pub fn with_imsi(mut self, imsi: impl Into<String>) -> Self {
        self.imsi = Some(imsi.into());
        self
    }

    pub fn with_gid1(mut self, gid1: impl Into<String>) -> Self {
        self.gid1 = Some(gid1.into());
        self
    }

    pub fn with_iccid(mut self, iccid: impl Into<String>) -> Self {
        self.iccid = Some(iccid.into());
        self
    }
}

/// Carrier identity lookup
pub trait CarrierIdentity: Send + Sync {
    /// Every MCC+MNC string the device knows about
    fn known_mcc_mnc(&self) -> HashSet<String>;

    /// MCC+MNC of the SIM behind `subscription`
    fn sim_operator(&self, subscription: SubscriptionId) -> Option<String>;

    fn service_provider_name(&self, subscription: SubscriptionId) -> Option<String>;

    /// Full SIM identity; implementations knowing IMSI/GID1/ICCID override this
    fn sim_identity(&self, subscription: SubscriptionId) -> SimIdentity {
        SimIdentity {
            mcc_mnc: self.sim_operator(subscription),
            spn: self.service_provider_name(subscription),
            ..SimIdentity::default()
        }
    }

    /// Number of SIM slots
    fn phone_count(&self) -> usize;
}

/// Fixed carrier identity, used by tests and the command-line tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticCarrierIdentity {
    known: HashSet<String>,
    sims: HashMap<i32, SimIdentity>,
    phone_count: usize,
}

impl StaticCarrierIdentity {
    pub fn new(phone_count: usize) -> Self {
        Self {
            phone_count,
            ..Self::default()
        }
    }

    pub fn with_known(mut self, mcc_mnc: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.known.extend(mcc_mnc.into_iter().map(Into::into));
        self
    }

    /// Insert the SIM of `subscription`; its operator becomes known.
    pub fn with_sim(mut self, subscription: SubscriptionId, sim: SimIdentity) -> Self {
        if let Some(op) = &sim.mcc_mnc {
            self.known.insert(op.clone());
        }
        self.sims.insert(subscription.0, sim);
        self
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl CarrierIdentity for StaticCarrierIdentity {
    fn known_mcc_mnc(&self) -> HashSet<String> {
        self.known.clone()
    }

    fn sim_operator(&self, subscription: SubscriptionId) -> Option<String> {
        self.sims.get(&subscription.0).and_then(|s| s.mcc_mnc.clone())
    }

    fn service_provider_name(&self, subscription: SubscriptionId) -> Option<String> {
        self.sims.get(&subscription.0).and_then(|s| s.spn.clone())
    }

    fn sim_identity(&self, subscription: SubscriptionId) -> SimIdentity {
        self.sims.get(&subscription.0).cloned().unwrap_or_default()
    }

    fn phone_count(&self) -> usize {
        self.phone_count.max(1)
    }
}

/// Source of factory default APNs
pub trait DefaultApnSource: Send + Sync {
    fn default_apns(&self) -> Vec<ApnRecord>;
}

/// Factory defaults held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticDefaults {
    records: Vec<ApnRecord>,
}

impl StaticDefaults {
    pub fn new(records: Vec<ApnRecord>) -> Self {
        Self { records }
    }

    /// Load a JSON array of records.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let records: Vec<ApnRecord> = serde_json::from_str(text)?;
        Ok(Self::new(records))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DefaultApnSource for StaticDefaults {
    /// Defaults never carry ids, pins or edit marks.
    fn default_apns(&self) -> Vec<ApnRecord> {
        self.records
            .iter()
            .cloned()
            .map(|mut rec| {
                rec.id = None;
                rec.edited_status = EditedStatus::Unedited;
                rec
            })
            .collect()
    }
}
