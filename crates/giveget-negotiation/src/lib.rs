//! Give&Get price negotiation bounded context.
//!
//! Responsible for the alternating offer/counter-offer protocol between the
//! buyer and the seller of a sale listing, and for applying the agreed price
//! when an offer is accepted.

pub mod application;
pub mod domain;
