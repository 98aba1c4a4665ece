//! Ledger Core - shared data structures for the ledger service
//!
//! Holds the domain records, the error taxonomy, configuration loading and the
//! logging setup used by the HTTP layer.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use tracing;
