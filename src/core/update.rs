use super::{ApnRecord, EditedStatus, MvnoType};
use serde::{Deserialize, Serialize};

macro_rules! assignments {
    ($($field:ident: $ty:ty),* $(,)?) => {
        /// Partial row assignment carried by an update request.
        ///
        /// Only the fields that are `Some` are written.
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct ApnUpdate {
            $(pub $field: Option<$ty>,)*
            pub edited_status: Option<EditedStatus>,
        }

        impl ApnUpdate {
            $(
                pub fn $field(mut self, value: impl Into<$ty>) -> Self {
                    self.$field = Some(value.into());
                    self
                }
            )*

            pub fn is_empty(&self) -> bool {
                true $(&& self.$field.is_none())* && self.edited_status.is_none()
            }

            /// Write the assigned fields onto `rec`.
            pub fn apply_to(&self, rec: &mut ApnRecord) {
                $(
                    if let Some(value) = &self.$field {
                        rec.$field = value.clone();
                    }
                )*
                if let Some(status) = self.edited_status {
                    rec.edited_status = status;
                }
            }
        }
    };
}

assignments! {
    name: String,
    apn: String,
    numeric: String,
    mcc: String,
    mnc: String,
    proxy: String,
    port: String,
    mmsc: String,
    mms_proxy: String,
    mms_port: String,
    user: String,
    password: String,
    auth_type: i32,
    apn_types: String,
    protocol: String,
    roaming_protocol: String,
    bearer_bitmask: u32,
    carrier_enabled: bool,
    current: bool,
    mvno_type: MvnoType,
    mvno_match_data: String,
    apn_set_id: i32,
}

impl ApnUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: EditedStatus) -> Self {
        self.edited_status = Some(status);
        self
    }

    /// Row as it would look after the update.
    pub fn applied(&self, rec: &ApnRecord) -> ApnRecord {
        let mut next = rec.clone();
        self.apply_to(&mut next);
        next
    }
}
