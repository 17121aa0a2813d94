//! RoleBridge Core Library
//!
//! Core types, configuration and error handling shared by the RoleBridge
//! directory role provider.

pub mod config;
pub mod error;
pub mod types;

pub use config::{LdapConfig, LdapServerType, LoggingConfig, RoleBridgeConfig};
pub use error::{Error, Result};
pub use types::{DirectoryEntry, Lookup};

/// RoleBridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of attribute values requested per ranged retrieval round-trip
pub const DEFAULT_RANGE_PAGE_SIZE: usize = 1000;
