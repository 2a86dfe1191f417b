//! Error types for the discovery core.

use std::net::AddrParseError;
use thiserror::Error;

/// Error type for discovery operations.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Address parsing error.
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddrParseError),

    /// Invalid URL format.
    #[error("Invalid kadnode URL: {0}")]
    InvalidUrl(String),

    /// Invalid node ID encoding.
    #[error("Invalid node ID: {0}")]
    InvalidNodeId(String),

    /// The coordinator task is no longer running.
    #[error("Discovery coordinator is not running")]
    CoordinatorClosed,
}

/// Result type alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
