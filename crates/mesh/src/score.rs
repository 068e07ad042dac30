//! Weighted multi-criteria candidate scoring.
//!
//! Raw metrics are min-max normalized into `[0, 1]` against configured
//! bounds, combined with the configured weights, clamped, and scaled to
//! the canonical 0-100 range.

use loomnet_core::config::{ScoringBounds, ScoringWeights};
use loomnet_domain::{MAX_PATH_HOPS, MIN_PATH_HOPS};

/// Aggregated metrics of one route candidate, computed over its full
/// traversal (source egress node included).
#[derive(Debug, Clone)]
pub struct CandidateMetrics {
    /// Estimated end-to-end latency in milliseconds.
    pub latency_ms: f64,
    /// Bottleneck bandwidth along the traversal in Mbps.
    pub bandwidth_mbps: f64,
    /// Mean trust score of the traversal nodes, 0-100.
    pub avg_trust: f64,
    /// Number of hops (equals the stored path length).
    pub hop_count: u32,
    /// Whether every traversal node supports AIC compression.
    pub all_aic: bool,
    /// Mean uptime percentage of the traversal nodes, 0-100.
    pub avg_uptime: f64,
}

fn norm(value: f64, max: f64) -> f64 {
    if max <= 0.0 {
        return 0.0;
    }
    (value / max).clamp(0.0, 1.0)
}

fn norm_hops(hop_count: u32) -> f64 {
    let span = (MAX_PATH_HOPS - MIN_PATH_HOPS) as f64;
    ((hop_count as f64 - MIN_PATH_HOPS as f64) / span).clamp(0.0, 1.0)
}

/// Score a candidate into `[0, 100]`. Higher is better. Lower latency and
/// fewer hops raise the score; bandwidth, trust, uptime, and full AIC
/// support add to it.
pub fn score_candidate(
    metrics: &CandidateMetrics,
    weights: &ScoringWeights,
    bounds: &ScoringBounds,
) -> f64 {
    let latency_inv = 1.0 - norm(metrics.latency_ms, bounds.latency_max_ms);
    let bandwidth = norm(metrics.bandwidth_mbps, bounds.bandwidth_max_mbps);
    let trust = norm(metrics.avg_trust, 100.0);
    let uptime = norm(metrics.avg_uptime, 100.0);
    let aic = if metrics.all_aic { 1.0 } else { 0.0 };

    let combined = weights.latency * latency_inv + weights.bandwidth * bandwidth
        + weights.trust * trust
        - weights.hop_penalty * norm_hops(metrics.hop_count)
        + weights.aic_bonus * aic
        + weights.uptime * uptime;

    combined.clamp(0.0, 1.0) * 100.0
}
