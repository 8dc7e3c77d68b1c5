//! Best-effort public address discovery
//!
//! Visit events prefer to carry the client's public network address. The
//! lookup runs on a worker thread and is bounded by a timeout: on timeout or
//! failure the visit event carries [`ADDRESS_PLACEHOLDER`] instead, and a
//! late completion is discarded with the dropped channel receiver.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::{Result, VigilError};

/// Substituted when no address can be discovered in time
pub const ADDRESS_PLACEHOLDER: &str = "unknown";

/// Public-address resolver seam
///
/// Implementations may block; the tracker never calls `resolve` on its own
/// thread.
pub trait AddressResolver: Send + Sync {
    /// Discover candidate public addresses, best first
    fn resolve(&self) -> Result<Vec<String>>;

    /// Resolver name (for logging)
    fn name(&self) -> &'static str;
}

/// Resolver that always returns a fixed address list
#[derive(Debug, Clone, Default)]
pub struct StaticAddressResolver {
    addresses: Vec<String>,
}

impl StaticAddressResolver {
    pub fn new(addresses: Vec<String>) -> Self {
        Self { addresses }
    }
}

impl AddressResolver for StaticAddressResolver {
    fn resolve(&self) -> Result<Vec<String>> {
        Ok(self.addresses.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Resolver that never discovers anything (default)
#[derive(Debug, Clone, Default)]
pub struct NoAddressResolver;

impl NoAddressResolver {
    pub fn new() -> Self {
        Self
    }
}

impl AddressResolver for NoAddressResolver {
    fn resolve(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Resolve the first public address within `timeout_ms`, or the placeholder.
///
/// The resolver runs on a detached worker thread; if it outlives the
/// timeout, its eventual result is dropped on the closed channel.
pub fn lookup_public_address(resolver: Arc<dyn AddressResolver>, timeout_ms: u64) -> String {
    let (tx, rx) = mpsc::channel();
    let resolver_name = resolver.name();

    thread::spawn(move || {
        let outcome = resolver.resolve();
        // Receiver may already be gone after a timeout; that is fine.
        let _ = tx.send(outcome);
    });

    match rx.recv_timeout(Duration::from_millis(timeout_ms)) {
        Ok(Ok(addresses)) => addresses
            .into_iter()
            .next()
            .unwrap_or_else(|| ADDRESS_PLACEHOLDER.to_string()),
        Ok(Err(err)) => {
            tracing::warn!(resolver = resolver_name, error = %err, "address discovery failed");
            ADDRESS_PLACEHOLDER.to_string()
        }
        Err(_) => {
            let err = VigilError::DiscoveryTimeout { timeout_ms };
            tracing::warn!(resolver = resolver_name, error = %err, "address discovery abandoned");
            ADDRESS_PLACEHOLDER.to_string()
        }
    }
}
