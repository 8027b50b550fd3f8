//! Bearer-token middleware for Axum
//!
//! Verifies the JWT, checks it is of the expected kind and attaches the
//! claims to the request extensions for `CurrentActor` to pick up.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::application::ports::{TokenClaims, TokenIssuer, TokenKind};
use crate::domain::DomainError;
use crate::interfaces::http::common::ApiError;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<dyn TokenIssuer>,
}

fn extract_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn authenticate(state: &AuthState, request: &Request<Body>, kind: TokenKind) -> Result<TokenClaims, DomainError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_token)
        .ok_or_else(|| DomainError::InvalidToken("missing bearer token".into()))?;

    let claims = state.tokens.verify(token)?;
    if claims.kind != kind {
        debug!(expected = ?kind, got = ?claims.kind, uid = claims.uid, "Token kind mismatch");
        return Err(DomainError::InvalidToken("wrong token kind".into()));
    }
    Ok(claims)
}

async fn guard(state: AuthState, mut request: Request<Body>, next: Next, kind: TokenKind) -> Response {
    match authenticate(&state, &request, kind) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => ApiError(e).into_response(),
    }
}

/// Accepts access tokens only
pub async fn require_access(State(state): State<AuthState>, request: Request<Body>, next: Next) -> Response {
    guard(state, request, next, TokenKind::Access).await
}

/// Accepts refresh tokens only
pub async fn require_refresh(State(state): State<AuthState>, request: Request<Body>, next: Next) -> Response {
    guard(state, request, next, TokenKind::Refresh).await
}
