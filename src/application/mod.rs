//! Application layer - use cases over the domain ports

pub mod context;
pub mod identity;
pub mod ports;
pub mod rbac;
pub mod side_effects;

#[cfg(test)]
pub mod testing;

pub use context::{Actor, ClientMeta};
pub use identity::{AuthService, UserService};
pub use rbac::{PermissionService, RoleService};
pub use side_effects::SideEffects;
