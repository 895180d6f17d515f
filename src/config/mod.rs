//! Configuration module for the gate.
//!
//! This module loads the JSON configuration file and validates it once at
//! startup. The resulting [`Config`] is never mutated afterwards.

mod config;
mod error;

pub use config::Config;
pub use error::ConfigError;
