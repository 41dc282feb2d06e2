//! Domain layer for the Price Negotiation context.

pub mod commands;
pub mod events;
pub mod rules;
