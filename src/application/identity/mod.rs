//! Identity module: authentication and user management
//!
//! `AuthService` runs the login / refresh state machine, `UserService`
//! covers registration, profile updates, password flows and bans.

pub mod auth_service;
pub mod bootstrap;
pub mod user_service;

pub use auth_service::{AuthService, FsdLoginResult, LoginResult, RefreshResult};
pub use bootstrap::{ensure_admin, AdminAccount};
pub use user_service::{AdminUserUpdate, RegisterUser, SelfUpdate, UserService};
