//! Route and route-cache persistence.
//!
//! Cache entries are inert the instant their `expires_at` passes: the hit
//! path matches only unexpired entries backed by an active route, so a
//! stale entry can never be served even before the maintenance sweep
//! physically deletes it.

use rusqlite::{params, OptionalExtension, Row};

use loomnet_core::error::Result;
use loomnet_domain::{Route, RouteCacheEntry};

use crate::Store;

fn map_route(row: &Row<'_>) -> rusqlite::Result<Route> {
    let path_raw: String = row.get(3)?;
    let path: Vec<String> = serde_json::from_str(&path_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })?;
    Ok(Route {
        route_id: row.get(0)?,
        source_identity: row.get(1)?,
        dest_identity: row.get(2)?,
        path,
        hop_count: row.get(4)?,
        predicted_latency_ms: row.get(5)?,
        predicted_bandwidth_mbps: row.get(6)?,
        ai_score: row.get(7)?,
        supports_aic: row.get::<_, i64>(8)? != 0,
        is_optimal: row.get::<_, i64>(9)? != 0,
        is_active: row.get::<_, i64>(10)? != 0,
        expires_at: row.get(11)?,
        usage_count: row.get(12)?,
        success_rate: row.get(13)?,
        created_at: row.get(14)?,
    })
}

fn map_cache_entry(row: &Row<'_>) -> rusqlite::Result<RouteCacheEntry> {
    Ok(RouteCacheEntry {
        source_identity: row.get(0)?,
        dest_identity: row.get(1)?,
        route_id: row.get(2)?,
        hit_count: row.get(3)?,
        created_at: row.get(4)?,
        last_used_at: row.get(5)?,
        expires_at: row.get(6)?,
    })
}

const ROUTE_COLUMNS: &str = "route_id, source_identity, dest_identity, path, hop_count, \
     predicted_latency_ms, predicted_bandwidth_mbps, ai_score, supports_aic, is_optimal, \
     is_active, expires_at, usage_count, success_rate, created_at";

impl Store {
    /// Persist a freshly selected route.
    pub fn insert_route(&self, route: &Route) -> Result<()> {
        let path = serde_json::to_string(&route.path)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO routes (route_id, source_identity, dest_identity, path, \
                 hop_count, predicted_latency_ms, predicted_bandwidth_mbps, ai_score, \
                 supports_aic, is_optimal, is_active, expires_at, usage_count, \
                 success_rate, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    route.route_id,
                    route.source_identity,
                    route.dest_identity,
                    path,
                    route.hop_count,
                    route.predicted_latency_ms,
                    route.predicted_bandwidth_mbps,
                    route.ai_score,
                    route.supports_aic as i64,
                    route.is_optimal as i64,
                    route.is_active as i64,
                    route.expires_at,
                    route.usage_count,
                    route.success_rate,
                    route.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Fetch a route by id.
    pub fn get_route(&self, route_id: &str) -> Result<Option<Route>> {
        self.with_conn(|conn| {
            let route = conn
                .query_row(
                    &format!("SELECT {ROUTE_COLUMNS} FROM routes WHERE route_id = ?1"),
                    params![route_id],
                    map_route,
                )
                .optional()?;
            Ok(route)
        })
    }

    /// Fold one performance sample into the route's success-rate EMA and
    /// bump its usage count, in a single statement. Returns the updated
    /// `(success_rate, usage_count)`, or `None` for an unknown route.
    pub fn record_route_feedback(
        &self,
        route_id: &str,
        alpha: f64,
        success: bool,
    ) -> Result<Option<(f64, i64)>> {
        let sample = if success { 1.0 } else { 0.0 };
        self.with_conn(|conn| {
            let updated = conn
                .query_row(
                    "UPDATE routes SET
                         success_rate = success_rate * (1.0 - ?1) + ?2,
                         usage_count = usage_count + 1
                     WHERE route_id = ?3
                     RETURNING success_rate, usage_count",
                    params![alpha, alpha * sample, route_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            Ok(updated)
        })
    }

    /// Deactivate a route whose success rate has fallen below `floor`.
    /// Conditional, so a recovering EMA racing this call is respected.
    pub fn deactivate_route_below(&self, route_id: &str, floor: f64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE routes SET is_active = 0
                 WHERE route_id = ?1 AND is_active = 1 AND success_rate < ?2",
                params![route_id, floor],
            )?;
            Ok(changed > 0)
        })
    }

    /// Upsert the cache entry for an ordered identity pair, replacing any
    /// prior entry and resetting its hit count.
    pub fn cache_put(
        &self,
        source: &str,
        dest: &str,
        route_id: &str,
        now_ms: i64,
        expires_at: i64,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO route_cache (source_identity, dest_identity, \
                 route_id, hit_count, created_at, last_used_at, expires_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?4, ?5)",
                params![source, dest, route_id, now_ms, expires_at],
            )?;
            Ok(())
        })
    }

    /// Cache lookup. The hit is one conditional update that only matches a
    /// live entry (unexpired, active route); it bumps `hit_count` and
    /// `last_used_at` but never extends `expires_at`.
    pub fn cache_hit(&self, source: &str, dest: &str, now_ms: i64) -> Result<Option<Route>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE route_cache SET hit_count = hit_count + 1, last_used_at = ?3
                 WHERE source_identity = ?1 AND dest_identity = ?2
                   AND expires_at >= ?3
                   AND EXISTS (SELECT 1 FROM routes r
                               WHERE r.route_id = route_cache.route_id
                                 AND r.is_active = 1)",
                params![source, dest, now_ms],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let route = conn
                .query_row(
                    &format!(
                        "SELECT {ROUTE_COLUMNS} FROM routes
                         WHERE route_id = (SELECT route_id FROM route_cache
                                           WHERE source_identity = ?1 AND dest_identity = ?2)"
                    ),
                    params![source, dest],
                    map_route,
                )
                .optional()?;
            Ok(route)
        })
    }

    /// Inspect a cache entry regardless of expiry.
    pub fn cache_entry(&self, source: &str, dest: &str) -> Result<Option<RouteCacheEntry>> {
        self.with_conn(|conn| {
            let entry = conn
                .query_row(
                    "SELECT source_identity, dest_identity, route_id, hit_count, \
                     created_at, last_used_at, expires_at
                     FROM route_cache
                     WHERE source_identity = ?1 AND dest_identity = ?2",
                    params![source, dest],
                    map_cache_entry,
                )
                .optional()?;
            Ok(entry)
        })
    }

    /// Physically delete entries past their expiry. Idempotent.
    pub fn evict_expired_cache(&self, now_ms: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM route_cache WHERE expires_at < ?1",
                params![now_ms],
            )?;
            Ok(changed)
        })
    }

    /// Drop all cache entries referencing a route, used when feedback
    /// deactivates it.
    pub fn purge_cache_for_route(&self, route_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM route_cache WHERE route_id = ?1",
                params![route_id],
            )?;
            Ok(changed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loomnet_core::time::now_ms;

    fn route(id: &str, source: &str, dest: &str) -> Route {
        Route {
            route_id: id.to_string(),
            source_identity: source.to_string(),
            dest_identity: dest.to_string(),
            path: vec!["mn-dst".to_string()],
            hop_count: 1,
            predicted_latency_ms: 25.0,
            predicted_bandwidth_mbps: 200.0,
            ai_score: 82.0,
            supports_aic: true,
            is_optimal: true,
            is_active: true,
            expires_at: now_ms() + 300_000,
            usage_count: 0,
            success_rate: 1.0,
            created_at: now_ms(),
        }
    }

    #[test]
    fn test_route_round_trip() {
        let store = Store::open_in_memory().unwrap();
        store.insert_route(&route("rt-1", "alice", "bob")).unwrap();

        let stored = store.get_route("rt-1").unwrap().unwrap();
        assert_eq!(stored.path, vec!["mn-dst"]);
        assert!(stored.is_optimal);
        assert!(store.get_route("rt-missing").unwrap().is_none());
    }

    #[test]
    fn test_cache_hit_increments_without_extending_ttl() {
        let store = Store::open_in_memory().unwrap();
        store.insert_route(&route("rt-1", "alice", "bob")).unwrap();
        let now = now_ms();
        store
            .cache_put("alice", "bob", "rt-1", now, now + 10_000)
            .unwrap();

        let hit = store.cache_hit("alice", "bob", now_ms()).unwrap().unwrap();
        assert_eq!(hit.route_id, "rt-1");

        let entry = store.cache_entry("alice", "bob").unwrap().unwrap();
        assert_eq!(entry.hit_count, 1);
        // Fixed TTL: expiry is untouched by the hit.
        assert_eq!(entry.expires_at, now + 10_000);
    }

    #[test]
    fn test_cache_is_ordered_by_direction() {
        let store = Store::open_in_memory().unwrap();
        store.insert_route(&route("rt-1", "alice", "bob")).unwrap();
        let now = now_ms();
        store
            .cache_put("alice", "bob", "rt-1", now, now + 10_000)
            .unwrap();

        // The reverse direction is a distinct key and must miss.
        assert!(store.cache_hit("bob", "alice", now_ms()).unwrap().is_none());
    }

    #[test]
    fn test_expired_entry_is_inert_before_eviction() {
        let store = Store::open_in_memory().unwrap();
        store.insert_route(&route("rt-1", "alice", "bob")).unwrap();
        let now = now_ms();
        store.cache_put("alice", "bob", "rt-1", now, now - 1).unwrap();

        // Entry still physically present, but logically expired.
        assert!(store.cache_entry("alice", "bob").unwrap().is_some());
        assert!(store.cache_hit("alice", "bob", now_ms()).unwrap().is_none());

        assert_eq!(store.evict_expired_cache(now_ms()).unwrap(), 1);
        assert!(store.cache_entry("alice", "bob").unwrap().is_none());
    }

    #[test]
    fn test_inactive_route_misses_cache() {
        let store = Store::open_in_memory().unwrap();
        let mut rt = route("rt-1", "alice", "bob");
        rt.success_rate = 0.2;
        store.insert_route(&rt).unwrap();
        let now = now_ms();
        store
            .cache_put("alice", "bob", "rt-1", now, now + 10_000)
            .unwrap();

        assert!(store.deactivate_route_below("rt-1", 0.5).unwrap());
        assert!(store.cache_hit("alice", "bob", now_ms()).unwrap().is_none());
    }

    #[test]
    fn test_feedback_ema() {
        let store = Store::open_in_memory().unwrap();
        store.insert_route(&route("rt-1", "alice", "bob")).unwrap();

        let (rate, count) = store
            .record_route_feedback("rt-1", 0.2, false)
            .unwrap()
            .unwrap();
        assert!((rate - 0.8).abs() < 1e-9);
        assert_eq!(count, 1);

        let (rate, count) = store
            .record_route_feedback("rt-1", 0.2, true)
            .unwrap()
            .unwrap();
        assert!((rate - (0.8 * 0.8 + 0.2)).abs() < 1e-9);
        assert_eq!(count, 2);

        assert!(store
            .record_route_feedback("rt-missing", 0.2, true)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_deactivate_respects_floor() {
        let store = Store::open_in_memory().unwrap();
        store.insert_route(&route("rt-1", "alice", "bob")).unwrap();

        // Healthy route: the conditional update must not fire.
        assert!(!store.deactivate_route_below("rt-1", 0.5).unwrap());
        assert!(store.get_route("rt-1").unwrap().unwrap().is_active);
    }

    #[test]
    fn test_cache_put_replaces_and_resets_hits() {
        let store = Store::open_in_memory().unwrap();
        store.insert_route(&route("rt-1", "alice", "bob")).unwrap();
        store.insert_route(&route("rt-2", "alice", "bob")).unwrap();
        let now = now_ms();
        store
            .cache_put("alice", "bob", "rt-1", now, now + 10_000)
            .unwrap();
        store.cache_hit("alice", "bob", now_ms()).unwrap();

        store
            .cache_put("alice", "bob", "rt-2", now, now + 10_000)
            .unwrap();

        let entry = store.cache_entry("alice", "bob").unwrap().unwrap();
        assert_eq!(entry.route_id, "rt-2");
        assert_eq!(entry.hit_count, 0);
    }
}
