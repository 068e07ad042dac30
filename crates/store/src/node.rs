//! Mesh node persistence.
//!
//! Heartbeats and the offline sweep are separate conditional updates that
//! never read-modify-write: the sweep only matches rows whose heartbeat is
//! already older than the cutoff, so a heartbeat landing mid-scan keeps the
//! node active.

use rusqlite::{params, OptionalExtension, Row};

use loomnet_core::error::Result;
use loomnet_domain::{HeartbeatMetrics, MeshNode};

use crate::{parse_text, Store};

fn map_node(row: &Row<'_>) -> rusqlite::Result<MeshNode> {
    Ok(MeshNode {
        node_id: row.get(0)?,
        identity: row.get(1)?,
        address: row.get(2)?,
        node_type: parse_text(3, row.get::<_, String>(3)?)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        region: row.get(6)?,
        max_connections: row.get(7)?,
        current_connections: row.get(8)?,
        bandwidth_capacity_mbps: row.get(9)?,
        bandwidth_usage_mbps: row.get(10)?,
        avg_latency_ms: row.get(11)?,
        packet_loss_rate: row.get(12)?,
        uptime_percentage: row.get(13)?,
        reputation_score: row.get(14)?,
        trust_score: row.get(15)?,
        aic_capable: row.get::<_, i64>(16)? != 0,
        status: parse_text(17, row.get::<_, String>(17)?)?,
        last_heartbeat: row.get(18)?,
        created_at: row.get(19)?,
    })
}

const NODE_COLUMNS: &str = "node_id, identity, address, node_type, latitude, longitude, region, \
     max_connections, current_connections, bandwidth_capacity_mbps, bandwidth_usage_mbps, \
     avg_latency_ms, packet_loss_rate, uptime_percentage, reputation_score, trust_score, \
     aic_capable, status, last_heartbeat, created_at";

impl Store {
    /// Insert a freshly registered node.
    pub fn insert_node(&self, node: &MeshNode) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO mesh_nodes (node_id, identity, address, node_type, latitude, \
                 longitude, region, max_connections, current_connections, \
                 bandwidth_capacity_mbps, bandwidth_usage_mbps, avg_latency_ms, \
                 packet_loss_rate, uptime_percentage, reputation_score, trust_score, \
                 aic_capable, status, last_heartbeat, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                 ?16, ?17, ?18, ?19, ?20)",
                params![
                    node.node_id,
                    node.identity,
                    node.address,
                    node.node_type.as_str(),
                    node.latitude,
                    node.longitude,
                    node.region,
                    node.max_connections,
                    node.current_connections,
                    node.bandwidth_capacity_mbps,
                    node.bandwidth_usage_mbps,
                    node.avg_latency_ms,
                    node.packet_loss_rate,
                    node.uptime_percentage,
                    node.reputation_score,
                    node.trust_score,
                    node.aic_capable as i64,
                    node.status.as_str(),
                    node.last_heartbeat,
                    node.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Fetch a node by id.
    pub fn get_node(&self, node_id: &str) -> Result<Option<MeshNode>> {
        self.with_conn(|conn| {
            let node = conn
                .query_row(
                    &format!("SELECT {NODE_COLUMNS} FROM mesh_nodes WHERE node_id = ?1"),
                    params![node_id],
                    map_node,
                )
                .optional()?;
            Ok(node)
        })
    }

    /// Apply heartbeat telemetry in one statement. Status is deliberately
    /// untouched. The uptime EMA is pulled toward 100 by each heartbeat.
    ///
    /// Returns false when the node is unknown.
    pub fn record_heartbeat(
        &self,
        node_id: &str,
        metrics: &HeartbeatMetrics,
        now_ms: i64,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE mesh_nodes SET
                     current_connections = ?1,
                     bandwidth_usage_mbps = ?2,
                     avg_latency_ms = ?3,
                     packet_loss_rate = ?4,
                     uptime_percentage = min(100.0, uptime_percentage * 0.95 + 5.0),
                     last_heartbeat = ?5
                 WHERE node_id = ?6",
                params![
                    metrics.current_connections,
                    metrics.bandwidth_usage_mbps,
                    metrics.avg_latency_ms,
                    metrics.packet_loss_rate,
                    now_ms,
                    node_id,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    /// Transition active nodes whose heartbeat predates `cutoff_ms` to
    /// offline. One conditional update: a node heartbeating during the
    /// scan no longer matches the predicate and stays active. The uptime
    /// EMA is pulled toward 0 on the transition.
    pub fn mark_offline_stale(&self, cutoff_ms: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE mesh_nodes SET
                     status = 'offline',
                     uptime_percentage = max(0.0, uptime_percentage * 0.95)
                 WHERE status = 'active' AND last_heartbeat < ?1",
                params![cutoff_ms],
            )?;
            Ok(changed)
        })
    }

    /// Active nodes owned by an identity, best first: trust descending,
    /// then latency ascending, then node id for a deterministic tie-break.
    pub fn active_nodes_for_identity(&self, identity: &str) -> Result<Vec<MeshNode>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NODE_COLUMNS} FROM mesh_nodes
                 WHERE identity = ?1 AND status = 'active'
                 ORDER BY trust_score DESC, avg_latency_ms ASC, node_id ASC"
            ))?;
            let nodes = stmt
                .query_map(params![identity], map_node)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(nodes)
        })
    }

    /// Candidate relays: active, trusted above `min_trust`, spare capacity,
    /// and owned by neither endpoint identity. Geography is filtered by the
    /// caller; `limit` bounds the working set.
    pub fn active_relay_candidates(
        &self,
        min_trust: f64,
        exclude_source: &str,
        exclude_dest: &str,
        limit: usize,
    ) -> Result<Vec<MeshNode>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NODE_COLUMNS} FROM mesh_nodes
                 WHERE status = 'active'
                   AND trust_score > ?1
                   AND current_connections < max_connections
                   AND identity NOT IN (?2, ?3)
                 ORDER BY trust_score DESC, avg_latency_ms ASC, node_id ASC
                 LIMIT ?4"
            ))?;
            let nodes = stmt
                .query_map(
                    params![min_trust, exclude_source, exclude_dest, limit as i64],
                    map_node,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(nodes)
        })
    }

    /// Denormalize a freshly computed trust total onto the node row.
    pub fn set_node_trust(&self, node_id: &str, trust_score: f64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE mesh_nodes SET trust_score = ?1 WHERE node_id = ?2",
                params![trust_score, node_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Apply a clamped reputation delta and return `(previous, new)`, or
    /// `None` for an unknown node. The connection lock makes the
    /// before/after pair a consistent snapshot for the event ledger.
    pub fn adjust_node_reputation(
        &self,
        node_id: &str,
        delta: f64,
    ) -> Result<Option<(f64, f64)>> {
        self.with_conn(|conn| {
            let previous: Option<f64> = conn
                .query_row(
                    "SELECT reputation_score FROM mesh_nodes WHERE node_id = ?1",
                    params![node_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(previous) = previous else {
                return Ok(None);
            };
            let new: f64 = conn.query_row(
                "UPDATE mesh_nodes
                 SET reputation_score = max(0.0, min(100.0, reputation_score + ?1))
                 WHERE node_id = ?2
                 RETURNING reputation_score",
                params![delta, node_id],
                |row| row.get(0),
            )?;
            Ok(Some((previous, new)))
        })
    }

    /// Hard-delete a node. Explicit deregistration is the only path here.
    pub fn delete_node(&self, node_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM mesh_nodes WHERE node_id = ?1",
                params![node_id],
            )?;
            Ok(changed > 0)
        })
    }
}
