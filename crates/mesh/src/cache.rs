//! TTL-bounded route cache.
//!
//! Keyed by the ordered `(source, dest)` identity pair, since paths may be
//! asymmetric. The TTL is fixed, not sliding: hits never extend expiry, so
//! staleness is bounded deterministically. An entry past its expiry is
//! inert immediately, even before the maintenance sweep deletes it.

use std::time::Duration;

use tracing::debug;

use loomnet_core::error::Result;
use loomnet_core::time::now_ms;
use loomnet_domain::Route;
use loomnet_store::Store;

/// Cache of previously computed routes.
pub struct RouteCache {
    store: Store,
}

impl RouteCache {
    /// Create a cache over the shared store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Look up the cached route for an ordered identity pair.
    ///
    /// A hit increments `hit_count` and stamps `last_used_at` in the same
    /// conditional update that checks expiry and route liveness.
    pub fn get(&self, source: &str, dest: &str) -> Result<Option<Route>> {
        let route = self.store.cache_hit(source, dest, now_ms())?;
        if let Some(route) = &route {
            debug!(source = %source, dest = %dest, route_id = %route.route_id, "route cache hit");
        }
        Ok(route)
    }

    /// Upsert the entry for an ordered identity pair, replacing any prior
    /// entry and restarting the TTL window.
    pub fn put(&self, source: &str, dest: &str, route: &Route, ttl: Duration) -> Result<()> {
        let now = now_ms();
        let expires_at = now + ttl.as_millis() as i64;
        self.store
            .cache_put(source, dest, &route.route_id, now, expires_at)
    }

    /// Physically delete expired entries. Maintenance-only; idempotent.
    pub fn evict_expired(&self) -> Result<usize> {
        self.store.evict_expired_cache(now_ms())
    }
}
