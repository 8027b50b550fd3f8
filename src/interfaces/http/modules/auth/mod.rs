//! Authentication module: tokens and e-mail codes

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
