//! Business services sitting between the HTTP routes and the repositories.
//!
//! - [`auth`] - signup, password login, profile edits
//! - [`checkout`] - transactional order placement and payment intents
//! - [`payments`] - payment processor client and webhook signatures

pub mod auth;
pub mod checkout;
pub mod payments;
