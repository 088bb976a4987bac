pub mod app;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod http;
pub mod middleware;
pub mod notifications;
pub mod scheduler;
pub mod services;
pub mod types;

#[cfg(test)]
pub mod testing;
