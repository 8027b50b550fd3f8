//! User aggregate
//!
//! Contains the User entity, its ban state, and repository interface.

pub mod model;
pub mod repository;

pub use model::{format_cid, AccountState, NewUser, User, UserGuard, UserUpdate, MAX_BAN_SECONDS};
pub use repository::UserRepository;
