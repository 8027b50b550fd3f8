//! Shared state handed to every HTTP handler

use std::sync::Arc;
use std::time::Instant;

use axum::extract::FromRef;
use sea_orm::DatabaseConnection;

use crate::application::ports::TokenIssuer;
use crate::application::{AuthService, PermissionService, RoleService, SideEffects, UserService};
use crate::infrastructure::clients::InMemoryEmailCodeStore;
use crate::interfaces::http::middleware::AuthState;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub roles: Arc<RoleService>,
    pub permissions: Arc<PermissionService>,
    pub tokens: Arc<dyn TokenIssuer>,
    pub codes: Arc<InMemoryEmailCodeStore>,
    pub side_effects: SideEffects,
    /// Pinged by `/health`; `None` for the in-memory account store
    pub db: Option<DatabaseConnection>,
    pub started_at: Instant,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(s: &AppState) -> Self {
        AuthState {
            tokens: Arc::clone(&s.tokens),
        }
    }
}
