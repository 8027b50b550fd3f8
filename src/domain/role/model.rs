use chrono::{DateTime, Utc};

use crate::domain::permission::Permission;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub permission: Permission,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub description: String,
    pub permission: Permission,
}

#[derive(Debug, Clone, Default)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permission: Option<Permission>,
}

impl RoleUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.permission.is_none()
    }

    pub fn apply_to(&self, role: &mut Role) {
        if let Some(v) = &self.name {
            role.name = v.clone();
        }
        if let Some(v) = &self.description {
            role.description = v.clone();
        }
        if let Some(v) = self.permission {
            role.permission = v;
        }
    }
}
