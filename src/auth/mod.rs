pub mod claims;
pub mod jwt;

pub use jwt::validate_jwt;
