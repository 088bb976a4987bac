// handlers/elevated/mod.rs - platform administration, ADMIN role only.
// admin_middleware runs after auth_middleware and rejects everyone else with 403.

pub mod admin;
