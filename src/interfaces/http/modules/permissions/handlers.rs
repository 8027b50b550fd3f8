//! Permission edits and role membership handlers

use axum::{
    extract::{Path, State},
    Json,
};

use super::dto::{EditPermissionRequest, EditPermissionResponse, MembershipRequest, PermissionNodeDto};
use crate::interfaces::http::common::{ApiResponse, ApiResult, CurrentActor, ValidatedJson};
use crate::interfaces::http::state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/permissions",
    tag = "Permissions",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Known permission nodes", body = ApiResponse<Vec<PermissionNodeDto>>))
)]
pub async fn list_nodes(
    State(state): State<AppState>,
    CurrentActor(_actor): CurrentActor,
) -> ApiResult<Vec<PermissionNodeDto>> {
    let registry = state.permissions.registry();
    let mut nodes: Vec<PermissionNodeDto> = registry
        .names_of(registry.all())
        .into_iter()
        .filter_map(|name| {
            let bit = registry.lookup(&name).ok()?.bits();
            Some(PermissionNodeDto { name, bit })
        })
        .collect();
    nodes.sort_by_key(|n| n.bit);
    Ok(Json(ApiResponse::success(nodes)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}/permissions",
    tag = "Permissions",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User id")),
    request_body = EditPermissionRequest,
    responses(
        (status = 200, description = "Permission edited", body = ApiResponse<EditPermissionResponse>),
        (status = 403, description = "Actor lacks a node it tried to change"),
        (status = 404, description = "Unknown node or user")
    )
)]
pub async fn edit_user_permission(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<EditPermissionRequest>,
) -> ApiResult<EditPermissionResponse> {
    let after = state
        .permissions
        .edit_user_permission(&actor, id, &request.permissions)
        .await?;
    Ok(Json(ApiResponse::success(EditPermissionResponse {
        permission: after.bits(),
    })))
}

#[utoipa::path(
    patch,
    path = "/api/v1/roles/{id}/permissions",
    tag = "Permissions",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Role id")),
    request_body = EditPermissionRequest,
    responses((status = 200, description = "Permission edited", body = ApiResponse<EditPermissionResponse>))
)]
pub async fn edit_role_permission(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<EditPermissionRequest>,
) -> ApiResult<EditPermissionResponse> {
    let after = state
        .permissions
        .edit_role_permission(&actor, id, &request.permissions)
        .await?;
    Ok(Json(ApiResponse::success(EditPermissionResponse {
        permission: after.bits(),
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/roles",
    tag = "Permissions",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User id")),
    request_body = MembershipRequest,
    responses((status = 200, description = "Roles granted"))
)]
pub async fn grant_user_roles(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<MembershipRequest>,
) -> ApiResult<()> {
    state.permissions.grant_user_role(&actor, id, &request.ids).await?;
    Ok(Json(ApiResponse::success(())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}/roles",
    tag = "Permissions",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User id")),
    request_body = MembershipRequest,
    responses((status = 200, description = "Roles revoked"))
)]
pub async fn revoke_user_roles(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<MembershipRequest>,
) -> ApiResult<()> {
    state.permissions.revoke_user_role(&actor, id, &request.ids).await?;
    Ok(Json(ApiResponse::success(())))
}

#[utoipa::path(
    post,
    path = "/api/v1/roles/{id}/users",
    tag = "Permissions",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Role id")),
    request_body = MembershipRequest,
    responses((status = 200, description = "Users added to the role"))
)]
pub async fn grant_role_users(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<MembershipRequest>,
) -> ApiResult<()> {
    state.permissions.grant_role_user(&actor, id, &request.ids).await?;
    Ok(Json(ApiResponse::success(())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/roles/{id}/users",
    tag = "Permissions",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Role id")),
    request_body = MembershipRequest,
    responses((status = 200, description = "Users removed from the role"))
)]
pub async fn revoke_role_users(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
    ValidatedJson(request): ValidatedJson<MembershipRequest>,
) -> ApiResult<()> {
    state.permissions.revoke_role_user(&actor, id, &request.ids).await?;
    Ok(Json(ApiResponse::success(())))
}
