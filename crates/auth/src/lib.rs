//! `cardkeep-auth`: pure identity/authorization boundary.
//!
//! This crate is intentionally decoupled from storage and transport: session
//! persistence lives in the client, signature material is injected.

pub mod claims;
pub mod credential;
pub mod identity;
pub mod policy;
pub mod roles;

pub use claims::{CredentialClaims, TokenValidationError, validate_claims};
pub use credential::{CredentialError, CredentialVerifier, Hs256Credentials};
pub use identity::{Actor, Identity};
pub use policy::{
    Action, AuthzError, authorize, can_create, can_delete, can_edit, can_favorite, can_like,
};
pub use roles::Role;
