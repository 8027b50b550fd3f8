//! Role catalogue and permission / membership mutations

pub mod permission_service;
pub mod role_service;

pub use permission_service::PermissionService;
pub use role_service::{RoleDetail, RoleService};
