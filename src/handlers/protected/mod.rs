// handlers/protected/mod.rs - bearer-token endpoints.
// auth_middleware has already put the caller's `AuthUser` in the extensions.

pub mod auth;
pub mod business;
pub mod cleaners;
pub mod clients;
pub mod dashboard;
pub mod invoices;
pub mod jobs;
pub mod payments;
pub mod reports;
pub mod subscriptions;
pub mod upload;
