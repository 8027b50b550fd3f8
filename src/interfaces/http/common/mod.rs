//! Response envelope, error mapping and request extractors shared by every
//! HTTP module.

pub mod validated_json;

pub use validated_json::ValidatedJson;

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::{IntoParams, ToSchema};

use crate::application::ports::TokenClaims;
use crate::application::{Actor, ClientMeta};
use crate::domain::DomainError;
use crate::shared::{PageRequest, PaginatedResult};

/// Standard response envelope
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// `true` when the request succeeded
    pub success: bool,
    /// Stable machine-readable result code
    pub code: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "OK".to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.into(),
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Paginated payload
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    /// 1-based
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T, U: Into<T>> From<PaginatedResult<U>> for PaginatedResponse<T> {
    fn from(result: PaginatedResult<U>) -> Self {
        Self {
            items: result.items.into_iter().map(Into::into).collect(),
            total: result.total,
            page: result.page,
            limit: result.limit,
            total_pages: result.total_pages,
        }
    }
}

/// List query parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Free-text filter
    pub search: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

impl From<PaginationParams> for PageRequest {
    fn from(p: PaginationParams) -> Self {
        PageRequest::new(p.page, p.page_size, p.search)
    }
}

/// Domain error rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self(e)
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn status_of(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_)
        | DomainError::OldPasswordMismatch
        | DomainError::CodeExpired
        | DomainError::CodeInvalid => StatusCode::BAD_REQUEST,
        DomainError::InvalidCredentials | DomainError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
        DomainError::PermissionDenied
        | DomainError::Banned { .. }
        | DomainError::BannedPermanently => StatusCode::FORBIDDEN,
        DomainError::NotFound { .. } | DomainError::PermissionNodeNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::IdentityTaken
        | DomainError::Conflict(_)
        | DomainError::RoleHasUsers(_)
        | DomainError::SamePassword => StatusCode::CONFLICT,
        DomainError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        DomainError::Downstream(_) => StatusCode::BAD_GATEWAY,
        DomainError::Database(_) | DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_of(&self.0);
        if self.0.is_server_error() {
            error!(code = self.0.code(), error = %self.0, "Request failed");
        }
        let body = ApiResponse::<()>::error(self.0.code(), self.0.public_message());
        (status, Json(body)).into_response()
    }
}

/// Client address and user agent as seen by the service. The address
/// comes from proxy headers when present, else from the socket peer.
#[derive(Debug, Clone)]
pub struct RequestMeta(pub ClientMeta);

impl<S: Send + Sync> FromRequestParts<S> for RequestMeta {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let get = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let ip = get("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .or_else(|| get("x-real-ip"))
            .map(str::to_string)
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        Ok(Self(ClientMeta::new(ip, user_agent)))
    }
}

/// Authenticated caller, built from the claims the auth middleware
/// attached to the request.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

impl<S: Send + Sync> FromRequestParts<S> for CurrentActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<TokenClaims>()
            .cloned()
            .ok_or_else(|| ApiError(DomainError::InvalidToken("missing credentials".into())))?;
        let RequestMeta(meta) = match RequestMeta::from_request_parts(parts, state).await {
            Ok(meta) => meta,
            Err(never) => match never {},
        };
        Ok(Self(Actor::from_claims(&claims, meta)))
    }
}
