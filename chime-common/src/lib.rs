//! # Chime Common Library
//!
//! Shared code for the chime device firmware crates:
//! - TOML configuration schema and config-file resolution
//! - Logging initialisation
//! - Common error type

pub mod config;
pub mod error;
pub mod logging;

pub use config::TomlConfig;
pub use error::{Error, Result};
