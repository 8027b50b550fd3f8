//! Role DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::application::rbac::RoleDetail;
use crate::domain::Role;
use crate::interfaces::http::modules::users::UserDto;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoleDto {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub permission: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Role> for RoleDto {
    fn from(r: Role) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            permission: r.permission.bits(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleDetailDto {
    pub role: RoleDto,
    pub users: Vec<UserDto>,
}

impl From<RoleDetail> for RoleDetailDto {
    fn from(d: RoleDetail) -> Self {
        Self {
            role: d.role.into(),
            users: d.users.into_iter().map(UserDto::from).collect(),
        }
    }
}

/// Create or update body; update replaces both fields
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RoleRequest {
    #[validate(length(min = 1, max = 64, message = "name must be 1-64 characters"))]
    pub name: String,
    #[validate(length(max = 255))]
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DeleteRoleParams {
    /// Remove memberships first instead of refusing
    #[serde(default)]
    pub force: bool,
}
