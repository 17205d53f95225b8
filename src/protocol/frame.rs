//! Video datagram header parsing.
//!
//! Each UDP datagram is self-describing:
//!
//! ```text
//! KEY:<ascii key>;<opaque payload>
//! ```
//!
//! The header ends at the first `;`. Bytes after it are never inspected.

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Header prefix naming the sender's key.
pub const HEADER_PREFIX: &[u8] = b"KEY:";

/// Separates the header from the payload.
pub const HEADER_DELIMITER: u8 = b';';

/// Longest header accepted, delimiter excluded.
pub const MAX_HEADER_LEN: usize = 256;

// ============================================================================
// VideoFrame
// ============================================================================

/// A parsed video datagram borrowing from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFrame<'a> {
    /// Sender key named in the header.
    pub key: &'a str,
    /// Opaque payload following the delimiter.
    pub payload: &'a [u8],
}

impl<'a> VideoFrame<'a> {
    /// Parses a raw datagram.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] when the delimiter is missing or
    /// too far in, the header is not ASCII, the prefix is wrong, or the key
    /// is empty.
    pub fn parse(datagram: &'a [u8]) -> Result<Self> {
        let search = &datagram[..datagram.len().min(MAX_HEADER_LEN + 1)];
        let delimiter = search
            .iter()
            .position(|&b| b == HEADER_DELIMITER)
            .ok_or_else(|| Error::malformed_frame("missing delimiter"))?;

        let header = &datagram[..delimiter];
        if !header.is_ascii() {
            return Err(Error::malformed_frame("non-ascii header"));
        }

        let key = header
            .strip_prefix(HEADER_PREFIX)
            .ok_or_else(|| Error::malformed_frame("missing KEY: prefix"))?;
        if key.is_empty() {
            return Err(Error::malformed_frame("empty key"));
        }

        // ASCII was checked above.
        let key = std::str::from_utf8(key).map_err(|_| Error::malformed_frame("non-ascii header"))?;

        Ok(Self {
            key,
            payload: &datagram[delimiter + 1..],
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
