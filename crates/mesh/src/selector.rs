//! Route selection.
//!
//! Builds direct and relayed path candidates from stored node state,
//! scores them with the configured weights, and persists the winner. The
//! only side effects are the final route insert and cache write, both of
//! which happen after the winner is chosen — an abandoned call leaves no
//! partial state.

use tracing::{debug, info, warn};

use loomnet_core::config::{Config, RoutingConfig, ScoringConfig};
use loomnet_core::error::{Error, Result};
use loomnet_core::time::now_ms;
use loomnet_domain::{new_id, EntityType, MeshNode, Route};
use loomnet_store::Store;
use loomnet_trust::{
    ReputationEventLog, TrustScoreEngine, ROUTE_FAILURE_DELTA, ROUTE_SUCCESS_DELTA,
};

use crate::cache::RouteCache;
use crate::geo;
use crate::score::{score_candidate, CandidateMetrics};

/// Upper bound on relays fetched from the store for corridor filtering.
const RELAY_POOL_LIMIT: usize = 32;

/// A scored path candidate. The traversal it was built from starts at the
/// source identity's egress node; the stored path drops that first element.
struct Candidate {
    path: Vec<String>,
    metrics: CandidateMetrics,
    score: f64,
}

/// Selects optimal routes between identities and folds live performance
/// feedback back into routes and node reputations.
pub struct RouteSelector {
    store: Store,
    cache: RouteCache,
    engine: TrustScoreEngine,
    events: ReputationEventLog,
    scoring: ScoringConfig,
    routing: RoutingConfig,
}

impl RouteSelector {
    /// Create a selector over the shared store.
    pub fn new(store: Store, config: &Config) -> Self {
        let cache = RouteCache::new(store.clone());
        let engine = TrustScoreEngine::new(store.clone());
        let events = ReputationEventLog::new(store.clone());
        Self {
            store,
            cache,
            engine,
            events,
            scoring: config.scoring.clone(),
            routing: config.routing.clone(),
        }
    }

    /// Select the best route between two identities.
    ///
    /// Consults the cache first, then builds direct and relayed candidates
    /// from active nodes. With `require_aic` every hop must support AIC
    /// compression; candidates that do not are excluded before scoring,
    /// and an unsatisfiable requirement is [`Error::NoRouteAvailable`],
    /// never a degraded route. `media_type` is recorded for the signaling
    /// layer but does not influence scoring.
    pub fn find_optimal_route(
        &self,
        source: &str,
        dest: &str,
        media_type: &str,
        require_aic: bool,
    ) -> Result<Route> {
        if source == dest {
            return Err(Error::invalid("source and destination are the same identity"));
        }
        if !self.store.resolve_identity(source)?.exists {
            return Err(Error::not_found("identity", source));
        }
        if !self.store.resolve_identity(dest)?.exists {
            return Err(Error::not_found("identity", dest));
        }

        if let Some(route) = self.cache.get(source, dest)? {
            return Ok(route);
        }

        let src_nodes = self.store.active_nodes_for_identity(source)?;
        let dst_nodes = self.store.active_nodes_for_identity(dest)?;
        if src_nodes.is_empty() || dst_nodes.is_empty() {
            return Err(Error::NoRouteAvailable {
                src: source.to_string(),
                dest: dest.to_string(),
            });
        }

        let relays = self.store.active_relay_candidates(
            self.routing.relay_min_trust,
            source,
            dest,
            RELAY_POOL_LIMIT,
        )?;

        let mut candidates = self.direct_candidates(&src_nodes, &dst_nodes, require_aic, true);
        candidates.extend(self.single_relay_candidates(&src_nodes, &dst_nodes, &relays, require_aic));

        if candidates.is_empty() && require_aic {
            // Last resort under a hard constraint: chain two relays.
            debug!(source = %source, dest = %dest, "no 2-hop candidate, trying two-relay paths");
            candidates = self.two_relay_candidates(&src_nodes, &dst_nodes, &relays);
        }

        if candidates.is_empty() {
            // Capacity shortage is non-fatal by default: accept saturated
            // direct pairs over failing the request outright.
            let relaxed = self.direct_candidates(&src_nodes, &dst_nodes, require_aic, false);
            if !relaxed.is_empty() {
                if !self.routing.allow_capacity_degrade {
                    return Err(Error::CapacityExhausted(format!(
                        "no candidate between {source} and {dest} has spare capacity"
                    )));
                }
                warn!(
                    source = %source,
                    dest = %dest,
                    "capacity exhausted, degrading to best-effort candidates"
                );
            }
            candidates = relaxed;
        }

        let Some(best) = pick_best(candidates) else {
            return Err(Error::NoRouteAvailable {
                src: source.to_string(),
                dest: dest.to_string(),
            });
        };

        let now = now_ms();
        let ttl = self.routing.cache_ttl();
        let route = Route {
            route_id: new_id("rt"),
            source_identity: source.to_string(),
            dest_identity: dest.to_string(),
            path: best.path.clone(),
            hop_count: best.metrics.hop_count,
            predicted_latency_ms: best.metrics.latency_ms,
            predicted_bandwidth_mbps: best.metrics.bandwidth_mbps,
            ai_score: best.score,
            supports_aic: best.metrics.all_aic,
            is_optimal: best.score >= self.routing.optimal_score_threshold,
            is_active: true,
            expires_at: now + ttl.as_millis() as i64,
            usage_count: 0,
            success_rate: 1.0,
            created_at: now,
        };
        self.store.insert_route(&route)?;
        self.cache.put(source, dest, &route, ttl)?;
        info!(
            route_id = %route.route_id,
            hops = route.hop_count,
            score = route.ai_score,
            media_type = %media_type,
            "route selected"
        );
        Ok(route)
    }

    /// Fold one live traffic sample into a route and the reputation of
    /// every node on its path.
    ///
    /// The route's success rate moves by an exponential moving average; a
    /// route falling below the configured floor is deactivated and its
    /// cache entries dropped, so the next lookup recomputes.
    pub fn report_route_performance(
        &self,
        route_id: &str,
        actual_latency_ms: f64,
        actual_quality_score: f64,
        success: bool,
    ) -> Result<Route> {
        if actual_latency_ms < 0.0 {
            return Err(Error::invalid("actual latency cannot be negative"));
        }
        if !(0.0..=100.0).contains(&actual_quality_score) {
            return Err(Error::invalid("quality score must be within [0, 100]"));
        }

        let Some((success_rate, _)) =
            self.store
                .record_route_feedback(route_id, self.routing.feedback_alpha, success)?
        else {
            return Err(Error::not_found("route", route_id));
        };

        if success_rate < self.routing.min_success_rate
            && self
                .store
                .deactivate_route_below(route_id, self.routing.min_success_rate)?
        {
            self.store.purge_cache_for_route(route_id)?;
            info!(
                route_id = %route_id,
                success_rate,
                "route invalidated by performance feedback"
            );
        }

        let route = self
            .store
            .get_route(route_id)?
            .ok_or_else(|| Error::not_found("route", route_id))?;

        let delta = if success {
            ROUTE_SUCCESS_DELTA
        } else {
            ROUTE_FAILURE_DELTA
        };
        let description = format!(
            "route {route_id} sample: latency {actual_latency_ms}ms quality {actual_quality_score}"
        );
        for node_id in &route.path {
            let applied =
                self.events
                    .apply_node_delta(node_id, "route_feedback", 1, delta, &description)?;
            if applied.is_some() {
                self.engine.calculate(EntityType::Node, node_id)?;
            }
        }
        Ok(route)
    }

    fn direct_candidates(
        &self,
        src_nodes: &[MeshNode],
        dst_nodes: &[MeshNode],
        require_aic: bool,
        enforce_capacity: bool,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for src in src_nodes {
            for dst in dst_nodes {
                if enforce_capacity && !(src.has_spare_capacity() && dst.has_spare_capacity()) {
                    continue;
                }
                if require_aic && !(src.aic_capable && dst.aic_capable) {
                    continue;
                }
                candidates.push(self.build_candidate(vec![src.clone(), dst.clone()]));
            }
        }
        candidates
    }

    fn single_relay_candidates(
        &self,
        src_nodes: &[MeshNode],
        dst_nodes: &[MeshNode],
        relays: &[MeshNode],
        require_aic: bool,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for src in src_nodes {
            for dst in dst_nodes {
                if require_aic && !(src.aic_capable && dst.aic_capable) {
                    continue;
                }
                let source = (src.latitude, src.longitude);
                let dest = (dst.latitude, dst.longitude);
                let eligible = relays
                    .iter()
                    .filter(|relay| !require_aic || relay.aic_capable)
                    .filter(|relay| {
                        geo::detour_ratio(source, &[(relay.latitude, relay.longitude)], dest)
                            <= self.routing.max_relay_detour
                    })
                    .take(self.routing.max_relay_candidates);
                for relay in eligible {
                    candidates.push(self.build_candidate(vec![
                        src.clone(),
                        relay.clone(),
                        dst.clone(),
                    ]));
                }
            }
        }
        candidates
    }

    /// Two-relay chains are built only when a hard constraint ruled out
    /// every shorter path, so the corridor filter is dropped here:
    /// connectivity beats geometry, and scoring still punishes the extra
    /// distance.
    fn two_relay_candidates(
        &self,
        src_nodes: &[MeshNode],
        dst_nodes: &[MeshNode],
        relays: &[MeshNode],
    ) -> Vec<Candidate> {
        let pool: Vec<&MeshNode> = relays
            .iter()
            .filter(|relay| relay.aic_capable)
            .take(self.routing.max_relay_candidates)
            .collect();

        let mut candidates = Vec::new();
        for src in src_nodes {
            for dst in dst_nodes {
                if !(src.aic_capable && dst.aic_capable) {
                    continue;
                }
                for first in &pool {
                    for second in &pool {
                        if first.node_id == second.node_id {
                            continue;
                        }
                        candidates.push(self.build_candidate(vec![
                            src.clone(),
                            (*first).clone(),
                            (*second).clone(),
                            dst.clone(),
                        ]));
                    }
                }
            }
        }
        candidates
    }

    fn build_candidate(&self, traversal: Vec<MeshNode>) -> Candidate {
        let curve = &self.routing.latency;
        let mut latency_ms = 0.0;
        for pair in traversal.windows(2) {
            let km = geo::distance_km(
                (pair[0].latitude, pair[0].longitude),
                (pair[1].latitude, pair[1].longitude),
            );
            latency_ms += geo::leg_latency_ms(curve, km);
        }
        let relay_count = traversal.len().saturating_sub(2);
        latency_ms += curve.per_hop_cost_ms * relay_count as f64;

        let count = traversal.len() as f64;
        let metrics = CandidateMetrics {
            latency_ms,
            bandwidth_mbps: traversal
                .iter()
                .map(|n| n.bandwidth_capacity_mbps)
                .fold(f64::INFINITY, f64::min),
            avg_trust: traversal.iter().map(|n| n.trust_score).sum::<f64>() / count,
            hop_count: (traversal.len() - 1) as u32,
            all_aic: traversal.iter().all(|n| n.aic_capable),
            avg_uptime: traversal.iter().map(|n| n.uptime_percentage).sum::<f64>() / count,
        };
        let score = score_candidate(&metrics, &self.scoring.weights, &self.scoring.bounds);
        let path = traversal[1..].iter().map(|n| n.node_id.clone()).collect();
        Candidate {
            path,
            metrics,
            score,
        }
    }
}

/// Highest score wins; ties fall to fewer hops, then lower latency, then
/// the lexicographically smallest path, so selection is deterministic for
/// a given snapshot.
fn pick_best(mut candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.metrics.hop_count.cmp(&b.metrics.hop_count))
            .then_with(|| a.metrics.latency_ms.total_cmp(&b.metrics.latency_ms))
            .then_with(|| a.path.cmp(&b.path))
    });
    candidates.into_iter().next()
}
