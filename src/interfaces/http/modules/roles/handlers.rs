//! Role catalogue handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::dto::{DeleteRoleParams, RoleDetailDto, RoleDto, RoleRequest};
use crate::interfaces::http::common::{
    ApiError, ApiResponse, ApiResult, CurrentActor, PaginatedResponse, PaginationParams,
    ValidatedJson,
};
use crate::interfaces::http::state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/roles",
    tag = "Roles",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses((status = 200, description = "Role page", body = ApiResponse<PaginatedResponse<RoleDto>>))
)]
pub async fn list_roles(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(params): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<RoleDto>> {
    let page = state.roles.get_pages(&actor, &params.into()).await?;
    Ok(Json(ApiResponse::success(page.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/roles/{id}",
    tag = "Roles",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role with its members", body = ApiResponse<RoleDetailDto>),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_role(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
) -> ApiResult<RoleDetailDto> {
    let detail = state.roles.get_role(&actor, id).await?;
    Ok(Json(ApiResponse::success(detail.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/roles",
    tag = "Roles",
    security(("bearer_auth" = [])),
    request_body = RoleRequest,
    responses(
        (status = 201, description = "Role created", body = ApiResponse<RoleDto>),
        (status = 409, description = "Name taken")
    )
)]
pub async fn create_role(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ValidatedJson(request): ValidatedJson<RoleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RoleDto>>), ApiError> {
    let role = state
        .roles
        .create(&actor, &request.name, &request.description)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(role.into()))))
}

#[utoipa::path(
    put,
    path = "/api/v1/roles/{id}",
    tag = "Roles",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Role id")),
    request_body = RoleRequest,
    responses((status = 200, description = "Role updated", body = ApiResponse<RoleDto>))
)]
pub async fn update_role(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<RoleRequest>,
) -> ApiResult<RoleDto> {
    let role = state
        .roles
        .update(&actor, id, &request.name, &request.description)
        .await?;
    Ok(Json(ApiResponse::success(role.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/roles/{id}",
    tag = "Roles",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Role id"), DeleteRoleParams),
    responses(
        (status = 200, description = "Role deleted"),
        (status = 409, description = "Role still has members")
    )
)]
pub async fn delete_role(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
    Query(params): Query<DeleteRoleParams>,
) -> ApiResult<()> {
    state.roles.delete(&actor, id, params.force).await?;
    Ok(Json(ApiResponse::success(())))
}
