//! Election Management Engine
//!
//! An in-process record store and tallying engine: indexed record storage,
//! an election lifecycle state machine, a tournament-tree tally, and a
//! row-oriented snapshot codec.

pub mod audit;
pub mod config;
pub mod credential;
pub mod errors;
pub mod index;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod tally;
pub mod types;
pub mod wal;

// Re-export commonly used types
pub use errors::{Error, Result};
pub use service::ElectionService;
pub use store::RecordStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the election engine with proper logging
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ballot=info".into()),
        )
        .init();

    tracing::info!("election engine v{} initialized", VERSION);
    Ok(())
}
