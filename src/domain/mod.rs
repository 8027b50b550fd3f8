pub mod audit;
pub mod permission;
pub mod role;
pub mod user;

pub use audit::{AuditEvent, AuditEventKind};
pub use permission::{Permission, PermissionRegistry};
pub use role::{NewRole, Role, RoleRepository, RoleUpdate};
pub use user::{AccountState, NewUser, User, UserGuard, UserRepository, UserUpdate};

pub use crate::shared::{DomainError, DomainResult};
