//! Cards domain module.
//!
//! Business-card records and the per-identity relations hanging off them
//! (favorites, likes), implemented as plain data plus deterministic rules
//! (no IO, no async, no storage).

pub mod card;
pub mod favorite;
pub mod filter;
pub mod validation;

pub use card::{Address, Card, CardDraft, CardPatch, Contact, SEED_OWNER};
pub use favorite::{Favorite, LikeMarker, LikeState, ViewerMarks};
pub use filter::CardFilter;
pub use validation::{validate_draft, validate_patch};
