//! # FSD User Service
//!
//! Account and authorization backend for an FSD flight-simulation network:
//! registration, JWT login/refresh, bans, a permission bitmask with roles,
//! and an audit/notification pipeline that runs after each mutation.
//!
//! ## Architecture
//!
//! - **domain**: permission model, users, roles, audit records, repository ports
//! - **application**: use cases (`AuthService`, `UserService`, `RoleService`,
//!   `PermissionService`) and the detached side-effect pipeline
//! - **infrastructure**: SeaORM persistence, JWT/bcrypt, collaborator adapters
//! - **interfaces**: axum REST API with Swagger documentation
//! - **shared**: error and pagination types, graceful shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod shared;

pub use config::{config_path, default_config_path, AppConfig};

// Re-export database types for easy access
pub use infrastructure::{init_database, DatabaseConfig};

// Re-export API router
pub use interfaces::http::{create_api_router, AppState};
