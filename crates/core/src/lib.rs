//! `cardkeep-core`: shared building blocks for the card client.
//!
//! This crate contains **pure** primitives (no IO, no async): identifiers
//! and the error taxonomy every other crate reports through.

pub mod error;
pub mod id;

pub use error::{CardError, CardResult};
pub use id::{CardId, IdentityId};
