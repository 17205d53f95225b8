//! Role resolution and counterpart lookup keys.
//!
//! A key ending in the controller suffix belongs to the controller; the same
//! key without the suffix belongs to the agent. Resolving a key's
//! counterpart twice always gives the key back.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Serialize;

use crate::identifiers::EndpointKey;

// ============================================================================
// Constants
// ============================================================================

/// Suffix marking the controller half of a pair.
pub const DEFAULT_CONTROLLER_SUFFIX: &str = "browser";

// ============================================================================
// Role
// ============================================================================

/// Which half of a pair an endpoint is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// Controlled process, registered under the bare key.
    Agent,
    /// Remote controller, registered under key + suffix.
    Controller,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent => f.write_str("agent"),
            Self::Controller => f.write_str("controller"),
        }
    }
}

// ============================================================================
// PairingRule
// ============================================================================

/// Suffix convention mapping a key to its role and counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingRule {
    suffix: String,
}

impl Default for PairingRule {
    fn default() -> Self {
        Self::new(DEFAULT_CONTROLLER_SUFFIX)
    }
}

impl PairingRule {
    /// Creates a rule with a custom controller suffix.
    #[inline]
    #[must_use]
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    /// Returns the controller suffix.
    #[inline]
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Returns the role a key registers as.
    #[must_use]
    pub fn role(&self, key: &str) -> Role {
        if key.ends_with(self.suffix.as_str()) {
            Role::Controller
        } else {
            Role::Agent
        }
    }

    /// Returns the complementary key.
    #[must_use]
    pub fn counterpart(&self, key: &str) -> EndpointKey {
        match key.strip_suffix(self.suffix.as_str()) {
            Some(agent) => EndpointKey::from(agent),
            None => EndpointKey::new(format!("{key}{}", self.suffix)),
        }
    }

    /// Returns the agent key shared by both halves of the pair.
    #[must_use]
    pub fn base_key<'a>(&self, key: &'a str) -> &'a str {
        key.strip_suffix(self.suffix.as_str()).unwrap_or(key)
    }
}

// ============================================================================
// Tests
// ============================================================================
