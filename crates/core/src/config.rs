//! Configuration management for Loomnet.
//!
//! All tunables of the routing and trust subsystem live here: scoring
//! weights and normalization bounds, the relay policy, cache TTLs, the
//! offline threshold, and maintenance budgets. Values are loaded from TOML
//! with every section optional; omitted fields take the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: NodeConfig,
    pub scoring: ScoringConfig,
    pub routing: RoutingConfig,
    pub registry: RegistryConfig,
    pub maintenance: MaintenanceConfig,
}

/// Service-level settings for the node binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node_id: String,
    pub data_dir: String,
    pub maintenance_interval_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "node-001".to_string(),
            data_dir: "./data".to_string(),
            maintenance_interval_secs: 60,
        }
    }
}

/// Weighted-scoring configuration for route candidates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub bounds: ScoringBounds,
}

/// Relative weights of the candidate-scoring criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub latency: f64,
    pub bandwidth: f64,
    pub trust: f64,
    pub hop_penalty: f64,
    pub aic_bonus: f64,
    pub uptime: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            latency: 0.40,
            bandwidth: 0.25,
            trust: 0.15,
            hop_penalty: 0.10,
            aic_bonus: 0.05,
            uptime: 0.05,
        }
    }
}

/// Min-max normalization bounds for raw candidate metrics.
///
/// Latency and bandwidth scale from zero up to these maxima; values past a
/// bound saturate at 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringBounds {
    pub latency_max_ms: f64,
    pub bandwidth_max_mbps: f64,
}

impl Default for ScoringBounds {
    fn default() -> Self {
        Self {
            latency_max_ms: 300.0,
            bandwidth_max_mbps: 1000.0,
        }
    }
}

/// Route selection and cache policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub cache_ttl_secs: i64,
    pub relay_min_trust: f64,
    pub max_relay_candidates: usize,
    pub max_relay_detour: f64,
    pub optimal_score_threshold: f64,
    pub feedback_alpha: f64,
    pub min_success_rate: f64,
    /// When false, a capacity shortage fails the request instead of
    /// degrading to saturated candidates.
    pub allow_capacity_degrade: bool,
    pub latency: LatencyCurve,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            relay_min_trust: 70.0,
            max_relay_candidates: 3,
            max_relay_detour: 1.5,
            optimal_score_threshold: 80.0,
            feedback_alpha: 0.2,
            min_success_rate: 0.5,
            allow_capacity_degrade: true,
            latency: LatencyCurve::default(),
        }
    }
}

impl RoutingConfig {
    /// Route-cache TTL as a [`Duration`].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs.max(0) as u64)
    }
}

/// Maps geographic distance to a latency estimate.
///
/// Route selection never probes the network; latency is always an estimate
/// from stored coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyCurve {
    pub base_ms: f64,
    pub ms_per_km: f64,
    pub per_hop_cost_ms: f64,
}

impl Default for LatencyCurve {
    fn default() -> Self {
        Self {
            base_ms: 5.0,
            ms_per_km: 0.02,
            per_hop_cost_ms: 5.0,
        }
    }
}

/// Node lifecycle policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub offline_threshold_secs: i64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            offline_threshold_secs: 120,
        }
    }
}

impl RegistryConfig {
    /// Heartbeat staleness threshold as a [`Duration`].
    pub fn offline_threshold(&self) -> Duration {
        Duration::from_secs(self.offline_threshold_secs.max(0) as u64)
    }
}

/// Maintenance task execution policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub task_budget_ms: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            task_budget_ms: 5_000,
        }
    }
}

impl MaintenanceConfig {
    /// Per-task execution budget as a [`Duration`].
    pub fn task_budget(&self) -> Duration {
        Duration::from_millis(self.task_budget_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults, already valid.
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Reject out-of-range values before they reach the hot path.
    pub fn validate(&self) -> Result<()> {
        if self.routing.cache_ttl_secs < 0 {
            return Err(Error::invalid("route cache TTL cannot be negative"));
        }
        if self.registry.offline_threshold_secs < 0 {
            return Err(Error::invalid("offline threshold cannot be negative"));
        }
        if !(0.0..=1.0).contains(&self.routing.feedback_alpha) {
            return Err(Error::invalid("feedback_alpha must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.routing.min_success_rate) {
            return Err(Error::invalid("min_success_rate must be within [0, 1]"));
        }
        if !(0.0..=100.0).contains(&self.routing.relay_min_trust) {
            return Err(Error::invalid("relay_min_trust must be within [0, 100]"));
        }
        if self.routing.max_relay_detour < 1.0 {
            return Err(Error::invalid("max_relay_detour must be at least 1.0"));
        }
        let w = &self.scoring.weights;
        for (name, value) in [
            ("latency", w.latency),
            ("bandwidth", w.bandwidth),
            ("trust", w.trust),
            ("hop_penalty", w.hop_penalty),
            ("aic_bonus", w.aic_bonus),
            ("uptime", w.uptime),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::invalid(format!(
                    "scoring weight {name} must be within [0, 1]"
                )));
            }
        }
        if self.scoring.bounds.latency_max_ms <= 0.0
            || self.scoring.bounds.bandwidth_max_mbps <= 0.0
        {
            return Err(Error::invalid("normalization bounds must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        Config::default_config().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [routing]
            cache_ttl_secs = 60

            [scoring.bounds]
            latency_max_ms = 500.0
            "#,
        )
        .unwrap();

        assert_eq!(config.routing.cache_ttl_secs, 60);
        assert_eq!(config.scoring.bounds.latency_max_ms, 500.0);
        // Untouched sections keep their defaults.
        assert_eq!(config.scoring.weights.latency, 0.40);
        assert_eq!(config.registry.offline_threshold_secs, 120);
    }

    #[test]
    fn test_negative_ttl_rejected() {
        let mut config = Config::default_config();
        config.routing.cache_ttl_secs = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_weight_rejected() {
        let mut config = Config::default_config();
        config.scoring.weights.bandwidth = 1.5;
        assert!(config.validate().is_err());
    }
}
