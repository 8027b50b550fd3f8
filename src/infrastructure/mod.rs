//! Infrastructure layer - external concerns

pub mod clients;
pub mod crypto;
pub mod database;
pub mod storage;

pub use database::{init_database, DatabaseConfig};
pub use storage::InMemoryAccountStore;
