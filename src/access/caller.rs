use serde::{Deserialize, Serialize};

/// Permission held by a calling process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Modify the GENERAL APN table (insert, update, delete, restore)
    WriteApnSettings,
    /// Caller holds carrier privileges on the active SIM
    CarrierPrivileges,
}

/// Identity of the process behind a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    uid: u32,
    permissions: Vec<Permission>,
}

impl Caller {
    pub const SYSTEM_UID: u32 = 1000;
    pub const PHONE_UID: u32 = 1001;

    /// Creates a caller with no permissions
    pub fn new(uid: u32) -> Self {
        Self {
            uid,
            permissions: Vec::new(),
        }
    }

    /// The system process; allowed to write settings
    pub fn system() -> Self {
        Self::new(Self::SYSTEM_UID).with_permission(Permission::WriteApnSettings)
    }

    /// The telephony process; allowed to write settings
    pub fn phone() -> Self {
        Self::new(Self::PHONE_UID).with_permission(Permission::WriteApnSettings)
    }

    /// Grants a permission if it isn't held yet
    pub fn with_permission(mut self, permission: Permission) -> Self {
        if !self.permissions.contains(&permission) {
            self.permissions.push(permission);
        }
        self
    }

    /// Returns the calling uid
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Returns the caller's permission list
    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    /// Checks if the caller holds a specific permission
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    #[inline]
    pub fn is_carrier(&self) -> bool {
        self.has_permission(Permission::CarrierPrivileges)
    }
}
