//! Permissions module: bit edits and role membership

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
