//! Shared foundation for airlift.
//!
//! Holds the error type used across the workspace and the image set
//! configuration schema loaded from YAML.

pub mod config;
pub mod error;

pub use config::{ImageSetConfig, Mirror, Operator, Platform, PlatformChannel};
pub use error::{MirrorError, RegistryErrorCode, Result};

/// Airlift version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
