//! Password hashing utilities

use bcrypt::{hash, verify};

use crate::shared::InfraError;

/// Hash a password using bcrypt at `cost`
pub fn hash_password(password: &str, cost: u32) -> Result<String, InfraError> {
    Ok(hash(password, cost)?)
}

/// Verify a password against a hash. A malformed hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    verify(password, hash).unwrap_or(false)
}
