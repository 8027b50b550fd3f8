//! HTTP REST API
//!
//! - `common`: response envelope, error mapping, extractors
//! - `middleware`: bearer-token guards
//! - `modules`: handlers and DTOs per resource
//! - `router`: route table and Swagger documentation

pub mod common;
pub mod middleware;
pub mod modules;
pub mod router;
pub mod state;

pub use router::create_api_router;
pub use state::AppState;
