// handlers/public/mod.rs - endpoints reachable without a bearer token.
// Everything here validates its own input; there is no caller context.

pub mod auth;
pub mod payments;
