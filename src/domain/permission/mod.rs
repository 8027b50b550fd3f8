//! Permission bitmask and the named node registry

pub mod model;
pub mod registry;

pub use model::Permission;
pub use registry::{apply_changes, ChangeKind, PermissionChange, PermissionEdit, PermissionRegistry};
