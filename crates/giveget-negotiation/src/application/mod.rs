//! Application layer for the Price Negotiation context.

pub mod command_handlers;
pub mod query_handlers;
