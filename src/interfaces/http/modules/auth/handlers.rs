//! Token endpoints: login, FSD login, refresh and e-mail codes

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use tracing::{debug, info};

use super::dto::{
    EmailCodeRequest, FsdLoginRequest, FsdLoginResponse, LoginRequest, LoginResponse, RefreshParams,
};
use crate::application::ports::{CollaboratorError, TokenClaims};
use crate::domain::DomainError;
use crate::interfaces::http::common::{ApiResponse, ApiResult, RequestMeta, ValidatedJson};
use crate::interfaces::http::state::AppState;

#[utoipa::path(
    post,
    path = "/api/v1/users/token",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Successful login", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account banned")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    RequestMeta(meta): RequestMeta,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let result = state
        .auth
        .login(&request.username, &request.password, &meta.ip)
        .await?;
    Ok(Json(ApiResponse::success(result.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/token/fsd",
    tag = "Authentication",
    request_body = FsdLoginRequest,
    responses((status = 200, description = "Login outcome", body = FsdLoginResponse))
)]
pub async fn fsd_login(
    State(state): State<AppState>,
    RequestMeta(meta): RequestMeta,
    ValidatedJson(request): ValidatedJson<FsdLoginRequest>,
) -> Json<FsdLoginResponse> {
    let result = state
        .auth
        .fsd_login(&request.cid, &request.password, &meta.ip)
        .await;
    Json(result.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/users/token",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    params(RefreshParams),
    responses(
        (status = 200, description = "New access token; refresh token only when rotated", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Refresh token required")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Query(params): Query<RefreshParams>,
) -> ApiResult<LoginResponse> {
    let result = state.auth.refresh(&claims, params.force).await?;
    Ok(Json(ApiResponse::success(result.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/email-code",
    tag = "Authentication",
    request_body = EmailCodeRequest,
    responses(
        (status = 200, description = "Code issued"),
        (status = 429, description = "Too many codes pending")
    )
)]
pub async fn issue_email_code(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<EmailCodeRequest>,
) -> ApiResult<()> {
    let code = state.codes.issue(&request.email).map_err(|e| match e {
        CollaboratorError::Rejected(reason) => DomainError::RateLimited(reason),
        CollaboratorError::Unavailable(reason) => DomainError::Downstream(reason),
    })?;
    info!(email = %request.email, "Issued e-mail verification code");
    debug!(email = %request.email, code = %code, "E-mail verification code value");
    Ok(Json(ApiResponse::success(())))
}
