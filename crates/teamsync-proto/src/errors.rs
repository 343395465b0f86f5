//! Protocol error taxonomy.
//!
//! These errors are confined to the ingestion boundary: a frame that
//! fails to decode is dropped and logged there, never propagated up to
//! tear down the connection.

use thiserror::Error;

/// Errors from wire encoding and decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame body exceeds the maximum allowed size.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Claimed or actual body size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Buffer ended before the full frame arrived.
    #[error("frame truncated: expected {expected} body bytes, got {actual}")]
    FrameTruncated {
        /// Body size the length prefix claims.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },

    /// CBOR serialization failed.
    #[error("cbor encode failed: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed (malformed or unknown shape).
    #[error("cbor decode failed: {0}")]
    CborDecode(String),
}
