//! Give&Get API: HTTP surface for listing price negotiations.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod notifications;
pub mod routes;
pub mod state;
