//! API Router with Swagger UI

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use super::common::{ApiResponse, PaginatedResponse, PaginationParams};
use super::middleware::{require_access, require_refresh, AuthState};
use super::modules::{auth, health, permissions, roles, users};
use super::state::AppState;

/// Security scheme modifier for OpenAPI
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token, or refresh token for GET /users/token"))
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health_check,
        // Auth
        auth::login,
        auth::fsd_login,
        auth::refresh,
        auth::issue_email_code,
        // Users
        users::register,
        users::check_availability,
        users::reset_password,
        users::list_users,
        users::get_self,
        users::update_self,
        users::change_password,
        users::get_user,
        users::update_user,
        users::ban_user,
        users::unban_user,
        // Roles
        roles::list_roles,
        roles::get_role,
        roles::create_role,
        roles::update_role,
        roles::delete_role,
        // Permissions
        permissions::list_nodes,
        permissions::edit_user_permission,
        permissions::edit_role_permission,
        permissions::grant_user_roles,
        permissions::revoke_user_roles,
        permissions::grant_role_users,
        permissions::revoke_role_users,
    ),
    components(
        schemas(
            ApiResponse<String>,
            PaginatedResponse<users::UserDto>,
            PaginatedResponse<roles::RoleDto>,
            PaginationParams,
            auth::LoginRequest,
            auth::LoginResponse,
            auth::FsdLoginRequest,
            auth::FsdLoginResponse,
            auth::EmailCodeRequest,
            users::UserDto,
            users::RoleSummary,
            users::RegisterRequest,
            users::AvailabilityResponse,
            users::ResetPasswordRequest,
            users::UpdateSelfRequest,
            users::UpdateUserRequest,
            users::ChangePasswordRequest,
            users::BanRequest,
            roles::RoleDto,
            roles::RoleDetailDto,
            roles::RoleRequest,
            permissions::PermissionNodeDto,
            permissions::EditPermissionRequest,
            permissions::EditPermissionResponse,
            permissions::MembershipRequest,
            health::HealthResponse,
            health::ComponentHealth,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Server health check endpoints"),
        (name = "Authentication", description = "Access/refresh tokens, FSD login and e-mail codes"),
        (name = "Users", description = "Registration, profile and account administration"),
        (name = "Roles", description = "Role catalogue"),
        (name = "Permissions", description = "Permission bits and role membership"),
    ),
    info(
        title = "FSD User Service API",
        version = "0.1.0",
        description = "Account, token and permission backend for an FSD flight-simulation network",
    )
)]
pub struct ApiDoc;

/// Create the API router with all routes
pub fn create_api_router(state: AppState) -> Router {
    let auth_state = AuthState {
        tokens: state.tokens.clone(),
    };
    let access = middleware::from_fn_with_state(auth_state.clone(), require_access);
    let refresh = middleware::from_fn_with_state(auth_state, require_refresh);

    // /users and /users/token mix public and authenticated methods, so the
    // guard sits on the method router rather than the whole path.
    let mixed_routes = Router::new()
        .route(
            "/users",
            post(users::register).merge(get(users::list_users).route_layer(access.clone())),
        )
        .route(
            "/users/token",
            post(auth::login).merge(get(auth::refresh).route_layer(refresh)),
        );

    let public_routes = Router::new()
        .route("/users/token/fsd", post(auth::fsd_login))
        .route("/users/availability", get(users::check_availability))
        .route("/users/password/reset", post(users::reset_password))
        .route("/users/email-code", post(auth::issue_email_code));

    let protected_routes = Router::new()
        .route("/users/me", get(users::get_self).patch(users::update_self))
        .route("/users/me/password", put(users::change_password))
        .route("/users/{id}", get(users::get_user).patch(users::update_user))
        .route("/users/{id}/ban", post(users::ban_user).delete(users::unban_user))
        .route("/users/{id}/permissions", patch(permissions::edit_user_permission))
        .route(
            "/users/{id}/roles",
            post(permissions::grant_user_roles).delete(permissions::revoke_user_roles),
        )
        .route("/roles", get(roles::list_roles).post(roles::create_role))
        .route(
            "/roles/{id}",
            get(roles::get_role)
                .put(roles::update_role)
                .delete(roles::delete_role),
        )
        .route("/roles/{id}/permissions", patch(permissions::edit_role_permission))
        .route(
            "/roles/{id}/users",
            post(permissions::grant_role_users).delete(permissions::revoke_role_users),
        )
        .route("/permissions", get(permissions::list_nodes))
        .route_layer(access);

    let api_routes = Router::new()
        .merge(mixed_routes)
        .merge(public_routes)
        .merge(protected_routes);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::application::testing::{Fixture, TEST_COST};
    use crate::application::{AuthService, PermissionService, RoleService, UserService};
    use crate::domain::Permission;

    fn app(fx: &Fixture) -> Router {
        let state = AppState {
            auth: Arc::new(AuthService::new(fx.users(), fx.tokens.clone())),
            users: Arc::new(UserService::new(fx.users(), fx.side_effects.clone(), TEST_COST)),
            roles: Arc::new(RoleService::new(fx.roles(), fx.side_effects.clone())),
            permissions: Arc::new(PermissionService::new(
                fx.users(),
                fx.roles(),
                fx.registry.clone(),
                fx.side_effects.clone(),
            )),
            tokens: fx.tokens.clone(),
            codes: fx.codes.clone(),
            side_effects: fx.side_effects.clone(),
            db: None,
            started_at: Instant::now(),
        };
        create_api_router(state)
    }

    fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login(router: &Router, username: &str, password: &str) -> Value {
        let response = router
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/users/token",
                None,
                json!({ "username": username, "password": password }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["data"].clone()
    }

    #[tokio::test]
    async fn login_records_socket_peer_without_proxy_headers() {
        let fx = Fixture::new();
        let user = fx.user(1001, "pilot", "secret123", Permission::NONE).await;
        let router = app(&fx);

        let mut request = json_request(
            Method::POST,
            "/api/v1/users/token",
            None,
            json!({ "username": "pilot", "password": "secret123" }),
        );
        request
            .extensions_mut()
            .insert(axum::extract::ConnectInfo(std::net::SocketAddr::from(([192, 0, 2, 44], 50000))));
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(fx.reload(user.id).await.last_login_ip.as_deref(), Some("192.0.2.44"));
    }

    #[tokio::test]
    async fn login_then_read_profile() {
        let fx = Fixture::new();
        fx.user(1001, "pilot", "secret123", Permission::NONE).await;
        let router = app(&fx);

        let data = login(&router, "pilot", "secret123").await;
        let token = data["token"].as_str().unwrap();

        let response = router
            .clone()
            .oneshot(get_request("/api/v1/users/me", Some(token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["cid"], 1001);
        assert_eq!(body["data"]["username"], "pilot");
    }

    #[tokio::test]
    async fn missing_or_wrong_kind_token_is_unauthorized() {
        let fx = Fixture::new();
        fx.user(1001, "pilot", "secret123", Permission::NONE).await;
        let router = app(&fx);

        let response = router
            .clone()
            .oneshot(get_request("/api/v1/users/me", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "INVALID_TOKEN");

        let data = login(&router, "pilot", "secret123").await;
        let refresh_token = data["refresh_token"].as_str().unwrap();
        let response = router
            .clone()
            .oneshot(get_request("/api/v1/users/me", Some(refresh_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .clone()
            .oneshot(get_request("/api/v1/users/token", Some(refresh_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn listing_users_needs_permission() {
        let fx = Fixture::new();
        fx.user(1001, "pilot", "secret123", Permission::NONE).await;
        fx.user(1002, "admin", "secret123", Permission::USER_SHOW_LIST).await;
        let router = app(&fx);

        let pilot = login(&router, "pilot", "secret123").await;
        let response = router
            .clone()
            .oneshot(get_request("/api/v1/users", pilot["token"].as_str()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["code"], "NO_PERMISSION");

        let admin = login(&router, "admin", "secret123").await;
        let response = router
            .clone()
            .oneshot(get_request("/api/v1/users?page=1&page_size=10", admin["token"].as_str()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["total"], 2);
    }

    #[tokio::test]
    async fn register_with_email_code() {
        let fx = Fixture::new();
        let router = app(&fx);
        let code = fx.codes.issue("new@example.com").unwrap();

        let response = router
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/users",
                None,
                json!({
                    "cid": 2001,
                    "username": "newbie",
                    "email": "new@example.com",
                    "password": "secret123",
                    "code": code,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let data = login(&router, "2001", "secret123").await;
        assert_eq!(data["user"]["username"], "newbie");
    }

    #[tokio::test]
    async fn permission_edit_over_http() {
        let fx = Fixture::new();
        let target = fx.user(1001, "pilot", "secret123", Permission::NONE).await;
        fx.user(
            1002,
            "admin",
            "secret123",
            Permission::USER_EDIT_PERMISSION.merge(Permission::FSD_CONTROLLER),
        )
        .await;
        let router = app(&fx);
        let admin = login(&router, "admin", "secret123").await;

        let response = router
            .clone()
            .oneshot(json_request(
                Method::PATCH,
                &format!("/api/v1/users/{}/permissions", target.id),
                admin["token"].as_str(),
                json!({ "permissions": { "FsdController": true } }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["data"]["permission"],
            Permission::FSD_CONTROLLER.bits()
        );
        assert!(fx.reload(target.id).await.permission.has(Permission::FSD_CONTROLLER));
    }

    #[tokio::test]
    async fn fsd_login_reports_failure_in_body() {
        let fx = Fixture::new();
        fx.user(1001, "pilot", "secret123", Permission::NONE).await;
        let router = app(&fx);

        let response = router
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/users/token/fsd",
                None,
                json!({ "cid": "1001", "password": "wrong" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn health_reports_memory_store() {
        let fx = Fixture::new();
        let response = app(&fx)
            .oneshot(get_request("/health", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"]["status"], "memory");
    }
}
