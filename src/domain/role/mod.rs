//! Role aggregate

pub mod model;
pub mod repository;

pub use model::{NewRole, Role, RoleUpdate};
pub use repository::RoleRepository;
