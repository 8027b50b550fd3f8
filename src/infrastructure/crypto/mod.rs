pub mod jwt;
pub mod password;

pub use jwt::{JwtClaimFactory, JwtConfig};
pub use password::{hash_password, verify_password};
