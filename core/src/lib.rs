//! Freighter Core - Foundational Types
//!
//! Error taxonomy, configuration and the media-type/annotation tables shared
//! by the content store and the CLI.

pub mod config;
pub mod consts;
pub mod error;

// Re-export commonly used types
pub use config::{FreighterConfig, LogLevel};
pub use error::{ErrorKind, FreighterError, Result};

/// Freighter version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
