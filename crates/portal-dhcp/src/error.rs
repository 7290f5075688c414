//! Error types for the subnet policy hooks
//!
//! None of these errors ever escape a callout: every entry point logs them
//! and lets the host server continue with its normal processing.

use thiserror::Error;

/// Error type for policy operations
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A required item was absent from the callout argument bag
    #[error("missing callout argument: {0}")]
    MissingArgument(&'static str),

    /// The reservation oracle could not answer
    #[error("reservation lookup failed: {0}")]
    LookupFailure(String),

    /// Option present but too short to decode
    #[error("malformed option {code}: {len} bytes")]
    MalformedOption { code: u8, len: usize },

    /// Unexpected fault while processing a callout
    #[error("internal error: {0}")]
    Internal(String),

    /// Failed to parse DHCP packet
    #[error("failed to parse DHCP packet: {0}")]
    ParseError(String),

    /// Failed to encode DHCP packet
    #[error("failed to encode DHCP packet: {0}")]
    EncodeError(String),

    /// Invalid MAC address format
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Side-effect script could not be run or failed
    #[error("notification failed: {0}")]
    NotifyFailed(String),

    /// Notification queue is at capacity
    #[error("notification queue full")]
    QueueFull,
}

/// Result type for policy operations
pub type Result<T> = std::result::Result<T, PolicyError>;
