//! User DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::application::identity::{AdminUserUpdate, RegisterUser, SelfUpdate};
use crate::domain::user::MAX_BAN_SECONDS;
use crate::domain::{Role, User};

/// `^[A-Za-z_-][\w-]*$`
pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    let mut chars = value.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '-');
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if head_ok && tail_ok {
        Ok(())
    } else {
        Err(ValidationError::new("username").with_message("invalid username".into()))
    }
}

/// `^[1-9][0-9]*$`
pub fn validate_qq(value: &str) -> Result<(), ValidationError> {
    if value.starts_with(|c: char| ('1'..='9').contains(&c)) && value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("qq").with_message("invalid qq number".into()))
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoleSummary {
    pub id: i64,
    pub name: String,
    pub permission: u64,
}

impl From<Role> for RoleSummary {
    fn from(r: Role) -> Self {
        Self {
            id: r.id,
            name: r.name,
            permission: r.permission.bits(),
        }
    }
}

/// User API representation
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserDto {
    pub id: i64,
    pub cid: i64,
    pub username: String,
    pub email: String,
    pub qq: Option<String>,
    /// Direct permission bits
    pub permission: u64,
    /// Direct bits merged with every role's bits
    pub effective_permission: u64,
    pub banned: bool,
    pub banned_until: Option<DateTime<Utc>>,
    pub roles: Vec<RoleSummary>,
    pub register_time: DateTime<Utc>,
    pub last_login_time: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        let effective = u.effective_permission().bits();
        Self {
            id: u.id,
            cid: u.cid,
            username: u.username,
            email: u.email,
            qq: u.qq,
            permission: u.permission.bits(),
            effective_permission: effective,
            banned: u.banned,
            banned_until: u.banned_until,
            roles: u.roles.into_iter().map(RoleSummary::from).collect(),
            register_time: u.created_at,
            last_login_time: u.last_login_time,
            last_login_ip: u.last_login_ip,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(range(min = 1, message = "cid must be positive"))]
    pub cid: i64,
    #[validate(length(min = 1, max = 64), custom(function = "validate_username"))]
    pub username: String,
    #[validate(email(message = "invalid email format"), length(max = 128))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "password must be 6-128 characters"))]
    pub password: String,
    #[validate(length(equal = 6, message = "code must be 6 characters"))]
    pub code: String,
}

impl From<RegisterRequest> for RegisterUser {
    fn from(r: RegisterRequest) -> Self {
        Self {
            cid: r.cid,
            username: r.username,
            email: r.email,
            password: r.password,
            code: r.code,
        }
    }
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
pub struct AvailabilityParams {
    pub cid: Option<i64>,
    #[validate(length(max = 64), custom(function = "validate_username"))]
    pub username: Option<String>,
    #[validate(email, length(max = 128))]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AvailabilityResponse {
    pub available: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(email, length(max = 128))]
    pub email: String,
    #[validate(length(equal = 6))]
    pub code: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateSelfRequest {
    #[validate(length(min = 1, max = 64), custom(function = "validate_username"))]
    pub username: Option<String>,
    #[validate(email, length(max = 128))]
    pub email: Option<String>,
    #[validate(length(equal = 6))]
    pub email_code: Option<String>,
    #[validate(length(max = 16), custom(function = "validate_qq"))]
    pub qq: Option<String>,
}

impl From<UpdateSelfRequest> for SelfUpdate {
    fn from(r: UpdateSelfRequest) -> Self {
        Self {
            username: r.username,
            email: r.email,
            email_code: r.email_code,
            qq: r.qq,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 64), custom(function = "validate_username"))]
    pub username: Option<String>,
    #[validate(email, length(max = 128))]
    pub email: Option<String>,
    #[validate(length(max = 16), custom(function = "validate_qq"))]
    pub qq: Option<String>,
    #[validate(length(min = 6, max = 128))]
    pub password: Option<String>,
}

impl From<UpdateUserRequest> for AdminUserUpdate {
    fn from(r: UpdateUserRequest) -> Self {
        Self {
            username: r.username,
            email: r.email,
            qq: r.qq,
            password: r.password,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "old password is required"))]
    pub old_password: String,
    #[validate(length(min = 6, max = 128, message = "new password must be 6-128 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BanRequest {
    /// Ban length in seconds; zero or negative bans permanently. At most
    /// ten years.
    #[validate(range(max = MAX_BAN_SECONDS, message = "ban must not exceed ten years"))]
    pub seconds: i64,
    #[validate(length(max = 512))]
    #[serde(default)]
    pub reason: String,
}
