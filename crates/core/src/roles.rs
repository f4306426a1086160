//! Caller role names carried in access-token claims.

/// System/service credential: pool workers and internal services.
/// May claim from the whole queue and call operator endpoints.
pub const ROLE_SERVICE: &str = "service";

/// Regular per-user credential. May only act on the user's own tasks.
pub const ROLE_USER: &str = "user";
