//! Registry of live endpoints keyed by their endpoint key.
//!
//! Single source of truth for who is connected. All access goes through
//! [`Registry::admit`], [`Registry::lookup`] and [`Registry::remove`]; the
//! map itself never leaves this module.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │              Registry                │
//! │  ┌────────────────────────────────┐  │
//! │  │ "abc"        → Endpoint (id 1) │  │
//! │  │ "abcbrowser" → Endpoint (id 2) │  │
//! │  │ "xyz"        → Endpoint (id 3) │  │
//! │  └────────────────────────────────┘  │
//! └──────────────────────────────────────┘
//! ```
//!
//! The lock is held only for map operations, never across I/O.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identifiers::EndpointKey;

use super::endpoint::{Endpoint, EndpointState};

// ============================================================================
// PairChange
// ============================================================================

/// Pairing transition decided while the registry lock is held.
///
/// Handed to the caller's callback inside the critical section, so two
/// changes for the same pair are never observed out of order.
#[derive(Debug, Clone, Copy)]
pub enum PairChange<'a> {
    /// Both halves are now registered, open and active.
    Paired {
        endpoint: &'a Endpoint,
        counterpart: &'a Endpoint,
    },
    /// `survivor` was active with `departed`, which is gone.
    Unpaired {
        survivor: &'a Endpoint,
        departed: &'a Endpoint,
    },
}

// ============================================================================
// Registry
// ============================================================================

/// Map from key to at most one live endpoint.
#[derive(Debug, Default)]
pub struct Registry {
    endpoints: Mutex<FxHashMap<EndpointKey, Endpoint>>,
}

impl Registry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `endpoint` under its key and pairs it with `counterpart`.
    ///
    /// A stale holder (transport no longer open) is replaced and returned so
    /// the caller can finish tearing it down. If the holder of `counterpart`
    /// is open, both move to `Active` and `announce` receives
    /// [`PairChange::Paired`], preceded by [`PairChange::Unpaired`] when the
    /// counterpart was still paired with the replaced holder.
    ///
    /// `announce` runs under the lock and must not touch the registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyInUse`] if the current holder is still open.
    pub fn admit(
        &self,
        endpoint: Endpoint,
        counterpart: &str,
        mut announce: impl FnMut(PairChange<'_>),
    ) -> Result<Option<Endpoint>> {
        let mut endpoints = self.endpoints.lock();

        if let Some(current) = endpoints.get(endpoint.key())
            && current.is_open()
        {
            return Err(Error::key_in_use(endpoint.key().clone()));
        }

        let key = endpoint.key().clone();
        let stale = endpoints.insert(key.clone(), endpoint.clone());

        if let Some(ref stale) = stale {
            info!(key = %key, stale_id = %stale.id(), "Replaced stale endpoint");
        } else {
            debug!(key = %key, "Endpoint registered");
        }

        if let Some(peer) = endpoints.get(counterpart).filter(|peer| peer.is_open()) {
            let was_active = peer.state() == EndpointState::Active;

            if peer.transition(EndpointState::Active) {
                endpoint.transition(EndpointState::Active);

                if was_active && let Some(ref stale) = stale {
                    announce(PairChange::Unpaired {
                        survivor: peer,
                        departed: stale,
                    });
                }
                announce(PairChange::Paired {
                    endpoint: &endpoint,
                    counterpart: peer,
                });
            }
        }

        Ok(stale)
    }

    /// Returns the current holder of `key`.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<Endpoint> {
        self.endpoints.lock().get(key).cloned()
    }

    /// Returns the current holder of `key` if its transport is open.
    #[must_use]
    pub fn lookup_open(&self, key: &str) -> Option<Endpoint> {
        self.lookup(key).filter(Endpoint::is_open)
    }

    /// Removes `key` only if it is still held by `expected`.
    ///
    /// Returns `true` if this call removed the entry. A disconnect event for
    /// a superseded endpoint returns `false` and leaves the newer holder in
    /// place. If the holder of `counterpart` was active, it drops back to
    /// `Registered` and `announce` receives [`PairChange::Unpaired`] under
    /// the lock.
    pub fn remove(
        &self,
        key: &str,
        expected: &Endpoint,
        counterpart: &str,
        mut announce: impl FnMut(PairChange<'_>),
    ) -> bool {
        let mut endpoints = self.endpoints.lock();

        match endpoints.get(key) {
            Some(current) if current.is_same(expected) => {
                endpoints.remove(key);
            }
            _ => return false,
        }

        if let Some(peer) = endpoints.get(counterpart)
            && peer.transition_from(EndpointState::Active, EndpointState::Registered)
        {
            announce(PairChange::Unpaired {
                survivor: peer,
                departed: expected,
            });
        }

        true
    }

    /// Returns `true` if any endpoint is registered under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.endpoints.lock().contains_key(key)
    }

    /// Returns the number of registered endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.lock().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.lock().is_empty()
    }

    /// Removes and returns every endpoint.
    pub fn drain(&self) -> Vec<Endpoint> {
        self.endpoints.lock().drain().map(|(_, endpoint)| endpoint).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
