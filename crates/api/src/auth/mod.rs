//! Authentication primitives: JWT validation and claims.

pub mod jwt;
