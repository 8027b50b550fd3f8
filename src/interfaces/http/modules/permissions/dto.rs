//! Permission and membership DTOs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionNodeDto {
    pub name: String,
    pub bit: u64,
}

/// Node name to `true` (grant) or `false` (revoke)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EditPermissionRequest {
    #[validate(length(min = 1, message = "at least one permission change is required"))]
    pub permissions: BTreeMap<String, bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EditPermissionResponse {
    /// Bitmask after the edit
    pub permission: u64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MembershipRequest {
    #[validate(length(min = 1, max = 100, message = "ids must hold 1-100 entries"))]
    pub ids: Vec<i64>,
}
