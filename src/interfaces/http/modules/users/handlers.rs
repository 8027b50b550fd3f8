//! User account handlers
//!
//! Thin wrappers over `UserService`; every endpoint except registration,
//! availability and password reset needs an access token.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use super::dto::{
    AvailabilityParams, AvailabilityResponse, BanRequest, ChangePasswordRequest, RegisterRequest,
    ResetPasswordRequest, UpdateSelfRequest, UpdateUserRequest, UserDto,
};
use crate::domain::DomainError;
use crate::interfaces::http::common::{
    ApiError, ApiResponse, ApiResult, CurrentActor, PaginatedResponse, PaginationParams,
    RequestMeta, ValidatedJson,
};
use crate::interfaces::http::state::AppState;

#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "Users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<UserDto>),
        (status = 400, description = "Bad e-mail code"),
        (status = 409, description = "Cid, username or e-mail already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    RequestMeta(meta): RequestMeta,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserDto>>), ApiError> {
    let user = state.users.register(request.into(), meta).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user.into()))))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/availability",
    tag = "Users",
    params(AvailabilityParams),
    responses((status = 200, description = "Whether the identity is free", body = ApiResponse<AvailabilityResponse>))
)]
pub async fn check_availability(
    State(state): State<AppState>,
    Query(params): Query<AvailabilityParams>,
) -> ApiResult<AvailabilityResponse> {
    params
        .validate()
        .map_err(|e| ApiError(DomainError::Validation(e.to_string())))?;
    let available = state
        .users
        .check_availability(params.cid, params.username.as_deref(), params.email.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(AvailabilityResponse { available })))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/password/reset",
    tag = "Users",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset"),
        (status = 404, description = "No account for this e-mail")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    RequestMeta(meta): RequestMeta,
    ValidatedJson(request): ValidatedJson<ResetPasswordRequest>,
) -> ApiResult<()> {
    state
        .users
        .reset_password(&request.email, &request.code, &request.password, meta)
        .await?;
    Ok(Json(ApiResponse::success(())))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "User page", body = ApiResponse<PaginatedResponse<UserDto>>),
        (status = 403, description = "Missing UserShowList")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(params): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<UserDto>> {
    let page = state.users.get_pages(&actor, &params.into()).await?;
    Ok(Json(ApiResponse::success(page.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Current account", body = ApiResponse<UserDto>))
)]
pub async fn get_self(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<UserDto> {
    let user = state.users.get_self(&actor).await?;
    Ok(Json(ApiResponse::success(user.into())))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = UpdateSelfRequest,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<UserDto>),
        (status = 400, description = "Nothing to change or bad e-mail code")
    )
)]
pub async fn update_self(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ValidatedJson(request): ValidatedJson<UpdateSelfRequest>,
) -> ApiResult<UserDto> {
    let user = state.users.update_self(&actor, request.into()).await?;
    Ok(Json(ApiResponse::success(user.into())))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/me/password",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Old password mismatch"),
        (status = 409, description = "New password equals the old one")
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> ApiResult<()> {
    state
        .users
        .update_password(&actor, &request.old_password, &request.new_password)
        .await?;
    Ok(Json(ApiResponse::success(())))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User details", body = ApiResponse<UserDto>),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
) -> ApiResult<UserDto> {
    let user = state.users.get_user(&actor, id).await?;
    Ok(Json(ApiResponse::success(user.into())))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated"),
        (status = 403, description = "Missing UserEditInfo")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<()> {
    state.users.update_user(&actor, id, request.into()).await?;
    Ok(Json(ApiResponse::success(())))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/ban",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User id")),
    request_body = BanRequest,
    responses(
        (status = 200, description = "User banned"),
        (status = 403, description = "Missing UserBan")
    )
)]
pub async fn ban_user(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<BanRequest>,
) -> ApiResult<()> {
    state
        .users
        .ban(&actor, id, request.seconds, &request.reason)
        .await?;
    Ok(Json(ApiResponse::success(())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}/ban",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Ban lifted"),
        (status = 403, description = "Missing UserBan")
    )
)]
pub async fn unban_user(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.users.unban(&actor, id).await?;
    Ok(Json(ApiResponse::success(())))
}
