//! API middleware. Only the protected routes run `auth::require_auth`.

pub mod auth;
