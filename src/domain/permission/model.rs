use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Fixed-width capability bitmask owned by users and roles.
///
/// Every bit denotes one discrete capability. The bit layout is part of the
/// stored data and must never be reordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(u64);

impl Permission {
    pub const NONE: Permission = Permission(0);

    pub const ADMIN_ENTRY: Permission = Permission(1 << 0);
    pub const USER_SHOW_LIST: Permission = Permission(1 << 1);
    pub const USER_EDIT_INFO: Permission = Permission(1 << 2);
    pub const USER_EDIT_PERMISSION: Permission = Permission(1 << 3);
    pub const USER_EDIT_ROLE: Permission = Permission(1 << 4);
    pub const USER_BAN: Permission = Permission(1 << 5);
    pub const ROLE_SHOW_LIST: Permission = Permission(1 << 6);
    pub const ROLE_CREATE: Permission = Permission(1 << 7);
    pub const ROLE_EDIT: Permission = Permission(1 << 8);
    pub const ROLE_DELETE: Permission = Permission(1 << 9);
    pub const ROLE_EDIT_PERMISSION: Permission = Permission(1 << 10);
    pub const AUDIT_LOG_SHOW: Permission = Permission(1 << 11);
    pub const FSD_OBSERVER: Permission = Permission(1 << 12);
    pub const FSD_CONTROLLER: Permission = Permission(1 << 13);
    pub const FSD_SUPERVISOR: Permission = Permission(1 << 14);

    pub const fn from_bits(bits: u64) -> Self {
        Permission(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// True iff every bit of `node` is set.
    pub const fn has(self, node: Permission) -> bool {
        self.0 & node.0 == node.0
    }

    pub const fn grant(self, node: Permission) -> Permission {
        Permission(self.0 | node.0)
    }

    pub const fn revoke(self, node: Permission) -> Permission {
        Permission(self.0 & !node.0)
    }

    pub const fn merge(self, other: Permission) -> Permission {
        Permission(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Permission {
    type Output = Permission;

    fn bitor(self, rhs: Permission) -> Permission {
        self.merge(rhs)
    }
}

impl BitOrAssign for Permission {
    fn bitor_assign(&mut self, rhs: Permission) {
        *self = self.merge(rhs);
    }
}

impl FromIterator<Permission> for Permission {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        iter.into_iter().fold(Permission::NONE, Permission::merge)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
