//! Authentication DTOs

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::application::identity::{FsdLoginResult, LoginResult, RefreshResult};
use crate::interfaces::http::modules::users::UserDto;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// Username, e-mail, cid or numeric id
    #[validate(length(min = 1, max = 128, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserDto,
    pub token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access-token lifetime in seconds
    pub expires_in: i64,
}

impl From<LoginResult> for LoginResponse {
    fn from(r: LoginResult) -> Self {
        Self {
            user: r.user.into(),
            token: r.access_token,
            refresh_token: r.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: r.expires_in,
        }
    }
}

impl From<RefreshResult> for LoginResponse {
    fn from(r: RefreshResult) -> Self {
        Self {
            user: r.user.into(),
            token: r.access_token,
            refresh_token: r.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: r.expires_in,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RefreshParams {
    /// Always rotate the refresh token
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct FsdLoginRequest {
    #[validate(length(min = 1, max = 16, message = "cid is required"))]
    pub cid: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Reply consumed by the flight-sim server; failures are reported in the
/// body with HTTP 200.
#[derive(Debug, Serialize, ToSchema)]
pub struct FsdLoginResponse {
    pub success: bool,
    pub errmsg: String,
    pub token: String,
}

impl From<FsdLoginResult> for FsdLoginResponse {
    fn from(r: FsdLoginResult) -> Self {
        Self {
            success: r.success,
            errmsg: r.error_msg,
            token: r.token,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EmailCodeRequest {
    #[validate(email, length(max = 128))]
    pub email: String,
}
