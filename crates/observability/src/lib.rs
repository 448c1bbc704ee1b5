//! Process-wide log output for cardkeep binaries.

pub mod tracing;

pub use tracing::{LOG_FORMAT_ENV, LogFormat};

/// Install the subscriber using `CARDKEEP_LOG_FORMAT` and `RUST_LOG`.
///
/// Later calls keep the first subscriber.
pub fn init() {
    tracing::init(LogFormat::from_env());
}
