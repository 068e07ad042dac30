//! Node lifecycle: registration, heartbeat ingestion, offline detection.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, info};

use loomnet_core::error::{Error, Result};
use loomnet_core::time::now_ms;
use loomnet_domain::{
    new_id, EntityType, HeartbeatMetrics, MeshNode, NodeCapabilities, NodeStatus, NodeType,
};
use loomnet_store::Store;
use loomnet_trust::TrustScoreEngine;

/// Manages mesh-node lifecycle against the shared store.
///
/// Heartbeats and the offline scan are designed to race: each is a single
/// conditional update, and the scan only matches heartbeats already past
/// the cutoff, so a concurrent heartbeat always keeps its node active.
pub struct NodeRegistry {
    store: Store,
    engine: TrustScoreEngine,
}

impl NodeRegistry {
    /// Create a registry over the shared store.
    pub fn new(store: Store) -> Self {
        let engine = TrustScoreEngine::new(store.clone());
        Self { store, engine }
    }

    /// Register a node for an existing identity.
    ///
    /// Fails with [`Error::NotFound`] for an unknown identity and
    /// [`Error::InvalidArgument`] for a malformed address or out-of-range
    /// capabilities.
    pub fn register(
        &self,
        identity: &str,
        address: &str,
        node_type: NodeType,
        capabilities: &NodeCapabilities,
    ) -> Result<MeshNode> {
        if !self.store.identity_exists(identity)? {
            return Err(Error::not_found("identity", identity));
        }
        address
            .parse::<SocketAddr>()
            .map_err(|_| Error::invalid(format!("malformed node address: {address}")))?;
        validate_capabilities(capabilities)?;

        let now = now_ms();
        let node = MeshNode {
            node_id: new_id("mn"),
            identity: identity.to_string(),
            address: address.to_string(),
            node_type,
            latitude: capabilities.latitude,
            longitude: capabilities.longitude,
            region: capabilities.region.clone(),
            max_connections: capabilities.max_connections,
            current_connections: 0,
            bandwidth_capacity_mbps: capabilities.bandwidth_capacity_mbps,
            bandwidth_usage_mbps: 0.0,
            avg_latency_ms: 0.0,
            packet_loss_rate: 0.0,
            uptime_percentage: 100.0,
            reputation_score: 50.0,
            trust_score: 50.0,
            aic_capable: capabilities.aic_capable,
            status: NodeStatus::Active,
            last_heartbeat: now,
            created_at: now,
        };
        self.store.insert_node(&node)?;
        // Seed the trust ledger so the denormalized score is real from the
        // first routing decision.
        self.engine.calculate(EntityType::Node, &node.node_id)?;

        let node = self
            .store
            .get_node(&node.node_id)?
            .ok_or_else(|| Error::not_found("node", &node.node_id))?;
        info!(
            node_id = %node.node_id,
            identity = %identity,
            node_type = node_type.as_str(),
            "mesh node registered"
        );
        Ok(node)
    }

    /// Ingest heartbeat telemetry. Never changes `status`; a node that was
    /// marked offline re-enters service through re-registration.
    pub fn heartbeat(&self, node_id: &str, metrics: &HeartbeatMetrics) -> Result<()> {
        if !(0.0..=1.0).contains(&metrics.packet_loss_rate) {
            return Err(Error::invalid("packet_loss_rate must be within [0, 1]"));
        }
        if metrics.avg_latency_ms < 0.0 || metrics.bandwidth_usage_mbps < 0.0 {
            return Err(Error::invalid("heartbeat metrics cannot be negative"));
        }

        if !self.store.record_heartbeat(node_id, metrics, now_ms())? {
            return Err(Error::not_found("node", node_id));
        }
        debug!(node_id = %node_id, connections = metrics.current_connections, "heartbeat");
        Ok(())
    }

    /// Transition active nodes whose heartbeat is older than `threshold`
    /// to offline. Maintenance-only; returns how many were marked.
    pub fn mark_offline_stale(&self, threshold: Duration) -> Result<usize> {
        let cutoff = now_ms() - threshold.as_millis() as i64;
        let marked = self.store.mark_offline_stale(cutoff)?;
        if marked > 0 {
            info!(count = marked, "stale nodes marked offline");
        }
        Ok(marked)
    }

    /// Active nodes owned by an identity, ordered by trust descending,
    /// then latency ascending, then node id.
    pub fn active_nodes_for_identity(&self, identity: &str) -> Result<Vec<MeshNode>> {
        self.store.active_nodes_for_identity(identity)
    }

    /// Fetch a node by id.
    pub fn node(&self, node_id: &str) -> Result<Option<MeshNode>> {
        self.store.get_node(node_id)
    }

    /// Remove a node permanently. The only hard delete in the lifecycle.
    pub fn deregister(&self, node_id: &str) -> Result<()> {
        if !self.store.delete_node(node_id)? {
            return Err(Error::not_found("node", node_id));
        }
        info!(node_id = %node_id, "mesh node deregistered");
        Ok(())
    }
}

fn validate_capabilities(capabilities: &NodeCapabilities) -> Result<()> {
    if capabilities.max_connections == 0 {
        return Err(Error::invalid("max_connections must be positive"));
    }
    if capabilities.bandwidth_capacity_mbps <= 0.0 {
        return Err(Error::invalid("bandwidth capacity must be positive"));
    }
    if !(-90.0..=90.0).contains(&capabilities.latitude)
        || !(-180.0..=180.0).contains(&capabilities.longitude)
    {
        return Err(Error::invalid("coordinates out of range"));
    }
    Ok(())
}
