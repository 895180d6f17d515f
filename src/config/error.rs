//! Errors raised while loading the gate configuration.
//!
//! Every variant is fatal: the process refuses to start rather than serve
//! with a partial policy.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("can't read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but holds nothing.
    #[error("config file {} is empty", path.display())]
    Empty { path: PathBuf },

    /// Invalid JSON, a missing required field, or a malformed CIDR prefix.
    #[error("can't parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    /// `RedirectURL` is blank.
    #[error("RedirectURL must not be empty")]
    MissingRedirectUrl,

    /// `RedirectHTTPResponse` is not a redirect status.
    #[error("RedirectHTTPResponse {0} is not a redirect status (expected 300-308 or 201)")]
    InvalidRedirectStatus(u16),

    /// A `ForbiddenHeaders` entry can't be written on the wire.
    #[error("invalid forbidden header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: &'static str },

    /// `TimeoutSeconds` is zero.
    #[error("TimeoutSeconds must be greater than zero")]
    InvalidTimeout,
}
