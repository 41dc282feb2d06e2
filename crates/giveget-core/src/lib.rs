//! Give&Get Core: shared domain abstractions.
//!
//! This crate defines the record types, store ports and collaborator ports
//! that the negotiation context and its adapters depend on. It contains no
//! infrastructure code.

pub mod chat;
pub mod clock;
pub mod command;
pub mod error;
pub mod identity;
pub mod listing;
pub mod record;
pub mod repository;
