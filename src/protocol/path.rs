//! Admission path parsing.
//!
//! Clients connect to `/key/<identifier>`. The identifier is
//! percent-decoded; anything after it is ignored.

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};
use crate::identifiers::EndpointKey;

// ============================================================================
// Constants
// ============================================================================

/// First path segment of every admission path.
const KEY_SEGMENT: &str = "key";

// ============================================================================
// Parsing
// ============================================================================

/// Extracts the endpoint key from a request path.
///
/// # Errors
///
/// Returns [`Error::InvalidKeyPath`] if the path does not start with
/// `/key/` followed by a non-empty identifier, or if the identifier is not
/// valid percent-encoded UTF-8.
pub fn parse_key_path(path: &str) -> Result<EndpointKey> {
    let path_only = path.split(['?', '#']).next().unwrap_or_default();
    let mut segments = path_only.split('/');

    // Leading slash produces an empty first segment.
    if segments.next() != Some("") || segments.next() != Some(KEY_SEGMENT) {
        return Err(Error::invalid_key_path(path));
    }

    let raw = segments.next().unwrap_or_default();
    if raw.is_empty() {
        return Err(Error::invalid_key_path(path));
    }

    let decoded = urlencoding::decode(raw).map_err(|_| Error::invalid_key_path(path))?;
    if decoded.is_empty() {
        return Err(Error::invalid_key_path(path));
    }

    Ok(EndpointKey::new(decoded.into_owned()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_key() {
        assert_eq!(parse_key_path("/key/abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_controller_key() {
        assert_eq!(
            parse_key_path("/key/abcbrowser").unwrap().as_str(),
            "abcbrowser"
        );
    }

    #[test]
    fn test_trailing_segments_and_query_ignored() {
        assert_eq!(parse_key_path("/key/abc/extra").unwrap().as_str(), "abc");
        assert_eq!(parse_key_path("/key/abc?x=1").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_percent_decoding() {
        assert_eq!(
            parse_key_path("/key/my%20room").unwrap().as_str(),
            "my room"
        );
    }

    #[test]
    fn test_invalid_paths() {
        for path in ["", "/", "/key", "/key/", "/keys/abc", "key/abc", "/other/key/abc"] {
            let err = parse_key_path(path).unwrap_err();
            assert!(
                matches!(err, Error::InvalidKeyPath { .. }),
                "expected invalid key path for {path:?}"
            );
        }
    }

    #[test]
    fn test_invalid_utf8_escape() {
        assert!(parse_key_path("/key/%FF").is_err());
    }
}
