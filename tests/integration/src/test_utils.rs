//! Shared fixtures for the integration suite.

use loomnet_core::Config;
use loomnet_domain::{NodeCapabilities, NodeType, PrivacyLevel};
use loomnet_mesh::{NodeRegistry, RouteCache, RouteSelector};
use loomnet_store::Store;
use loomnet_trust::{AbuseReportManager, TrustScoreEngine};

/// Well-known coordinates used across the scenarios.
pub const BERLIN: (f64, f64) = (52.52, 13.405);
/// Paris.
pub const PARIS: (f64, f64) = (48.8566, 2.3522);
/// Frankfurt, roughly on the Berlin-Paris corridor.
pub const FRANKFURT: (f64, f64) = (50.1109, 8.6821);

/// Everything a scenario needs, wired over one shared in-memory store.
pub struct TestMesh {
    pub store: Store,
    pub config: Config,
    pub registry: NodeRegistry,
    pub selector: RouteSelector,
    pub cache: RouteCache,
    pub engine: TrustScoreEngine,
    pub reports: AbuseReportManager,
}

impl TestMesh {
    /// Build a mesh with the default configuration and the given
    /// identities already present.
    pub fn new(identities: &[&str]) -> Self {
        Self::with_config(identities, Config::default_config())
    }

    /// Build a mesh with a custom configuration.
    pub fn with_config(identities: &[&str], config: Config) -> Self {
        let store = Store::open_in_memory().expect("in-memory store");
        for handle in identities {
            store
                .upsert_identity(handle, PrivacyLevel::Public, true)
                .expect("seed identity");
        }
        Self {
            registry: NodeRegistry::new(store.clone()),
            selector: RouteSelector::new(store.clone(), &config),
            cache: RouteCache::new(store.clone()),
            engine: TrustScoreEngine::new(store.clone()),
            reports: AbuseReportManager::new(store.clone()),
            store,
            config,
        }
    }

    /// Register a node through the registry, the way production code does.
    pub fn register_node(
        &self,
        identity: &str,
        address: &str,
        location: (f64, f64),
        aic_capable: bool,
    ) -> loomnet_domain::MeshNode {
        self.registry
            .register(
                identity,
                address,
                NodeType::Peer,
                &NodeCapabilities {
                    latitude: location.0,
                    longitude: location.1,
                    region: "test".to_string(),
                    max_connections: 16,
                    bandwidth_capacity_mbps: 400.0,
                    aic_capable,
                },
            )
            .expect("register node")
    }
}
