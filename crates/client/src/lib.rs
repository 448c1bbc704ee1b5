//! `cardkeep-client`
//!
//! **Responsibility:** client-resident card cache with optimistic mutations,
//! the identity session, and the two interchangeable backends.
//!
//! This crate provides:
//! - A local key-value store (in-memory or file-backed)
//! - The identity session store
//! - A simulated backend for offline and demo use
//! - A remote backend over a pluggable gateway (HTTP behind the `http` feature)
//! - The card coordinator presentation code talks to

pub mod app;
pub mod backend;
pub mod cache;
pub mod config;
#[cfg(feature = "http")]
pub mod http;
pub mod offline;
pub mod remote;
pub mod seed;
pub mod session;
pub mod store;

pub use app::CardClient;
pub use backend::{BackendKind, CardBackend, Operation};
pub use cache::{CacheSnapshot, CardCoordinator, InFlightKey, MutationKind};
pub use config::{ClientConfig, LatencyProfile};
pub use offline::OfflineBackend;
pub use remote::{
    DisconnectedGateway, GatewayError, GatewayRequest, GatewayResponse, RemoteBackend, RemoteGateway,
};
pub use session::SessionStore;
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};

#[cfg(feature = "http")]
pub use http::HttpGateway;
