//! Domain entities for the mesh routing and trust subsystem.

use loomnet_core::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum number of hops in a stored route path.
pub const MIN_PATH_HOPS: usize = 1;
/// Maximum number of hops in a stored route path.
pub const MAX_PATH_HOPS: usize = 3;

/// Clamp a composite score into the canonical `[0, 100]` range.
pub fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

/// Identity visibility policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    Public,
    Friends,
    Private,
}

impl PrivacyLevel {
    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::Public => "public",
            PrivacyLevel::Friends => "friends",
            PrivacyLevel::Private => "private",
        }
    }
}

impl FromStr for PrivacyLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(PrivacyLevel::Public),
            "friends" => Ok(PrivacyLevel::Friends),
            "private" => Ok(PrivacyLevel::Private),
            other => Err(Error::invalid(format!("unknown privacy level: {other}"))),
        }
    }
}

/// Role a mesh node plays in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Peer,
    Relay,
    Edge,
    SuperNode,
}

impl NodeType {
    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Peer => "peer",
            NodeType::Relay => "relay",
            NodeType::Edge => "edge",
            NodeType::SuperNode => "super_node",
        }
    }
}

impl FromStr for NodeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "peer" => Ok(NodeType::Peer),
            "relay" => Ok(NodeType::Relay),
            "edge" => Ok(NodeType::Edge),
            "super_node" => Ok(NodeType::SuperNode),
            other => Err(Error::invalid(format!("unknown node type: {other}"))),
        }
    }
}

/// Node liveness state. Only the maintenance scan moves a node to
/// `Offline`; ordinary request handling never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Active,
    Offline,
}

impl NodeStatus {
    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Active => "active",
            NodeStatus::Offline => "offline",
        }
    }
}

impl FromStr for NodeStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(NodeStatus::Active),
            "offline" => Ok(NodeStatus::Offline),
            other => Err(Error::invalid(format!("unknown node status: {other}"))),
        }
    }
}

/// What kind of entity a trust score or reputation event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Identity,
    Node,
}

impl EntityType {
    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Identity => "identity",
            EntityType::Node => "node",
        }
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" => Ok(EntityType::Identity),
            "node" => Ok(EntityType::Node),
            other => Err(Error::invalid(format!("unknown entity type: {other}"))),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trust classification, a pure function of the total score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Verified,
    Trusted,
    Established,
    New,
    Caution,
}

impl TrustLevel {
    /// Classify a total score. Boundaries are inclusive: exactly 20.0 is
    /// `New`, exactly 80.0 is `Verified`.
    pub fn for_score(total: f64) -> TrustLevel {
        if total >= 80.0 {
            TrustLevel::Verified
        } else if total >= 60.0 {
            TrustLevel::Trusted
        } else if total >= 40.0 {
            TrustLevel::Established
        } else if total >= 20.0 {
            TrustLevel::New
        } else {
            TrustLevel::Caution
        }
    }

    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLevel::Verified => "verified",
            TrustLevel::Trusted => "trusted",
            TrustLevel::Established => "established",
            TrustLevel::New => "new",
            TrustLevel::Caution => "caution",
        }
    }
}

impl FromStr for TrustLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verified" => Ok(TrustLevel::Verified),
            "trusted" => Ok(TrustLevel::Trusted),
            "established" => Ok(TrustLevel::Established),
            "new" => Ok(TrustLevel::New),
            "caution" => Ok(TrustLevel::Caution),
            other => Err(Error::invalid(format!("unknown trust level: {other}"))),
        }
    }
}

/// Identity verification channel, each worth a fixed trust bonus once
/// verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    Email,
    Phone,
    Document,
    Social,
    Biometric,
}

impl VerificationMethod {
    /// Fixed bonus contributed by a verified record of this method.
    pub fn bonus(&self) -> f64 {
        match self {
            VerificationMethod::Email => 10.0,
            VerificationMethod::Phone => 15.0,
            VerificationMethod::Document => 25.0,
            VerificationMethod::Social => 5.0,
            VerificationMethod::Biometric => 20.0,
        }
    }

    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationMethod::Email => "email",
            VerificationMethod::Phone => "phone",
            VerificationMethod::Document => "document",
            VerificationMethod::Social => "social",
            VerificationMethod::Biometric => "biometric",
        }
    }
}

impl FromStr for VerificationMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(VerificationMethod::Email),
            "phone" => Ok(VerificationMethod::Phone),
            "document" => Ok(VerificationMethod::Document),
            "social" => Ok(VerificationMethod::Social),
            "biometric" => Ok(VerificationMethod::Biometric),
            other => Err(Error::invalid(format!(
                "unknown verification method: {other}"
            ))),
        }
    }
}

/// Lifecycle of a verification record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Expired,
    Failed,
}

impl VerificationStatus {
    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Expired => "expired",
            VerificationStatus::Failed => "failed",
        }
    }
}

impl FromStr for VerificationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VerificationStatus::Pending),
            "verified" => Ok(VerificationStatus::Verified),
            "expired" => Ok(VerificationStatus::Expired),
            "failed" => Ok(VerificationStatus::Failed),
            other => Err(Error::invalid(format!(
                "unknown verification status: {other}"
            ))),
        }
    }
}

/// Lifecycle of an abuse report. Reports that are not dismissed count
/// against the reported entity's trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Dismissed => "dismissed",
        }
    }
}

impl FromStr for ReportStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "resolved" => Ok(ReportStatus::Resolved),
            "dismissed" => Ok(ReportStatus::Dismissed),
            other => Err(Error::invalid(format!("unknown report status: {other}"))),
        }
    }
}

/// Lifecycle of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Unread,
    Acknowledged,
    Expired,
}

impl NotificationStatus {
    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Unread => "unread",
            NotificationStatus::Acknowledged => "acknowledged",
            NotificationStatus::Expired => "expired",
        }
    }
}

impl FromStr for NotificationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unread" => Ok(NotificationStatus::Unread),
            "acknowledged" => Ok(NotificationStatus::Acknowledged),
            "expired" => Ok(NotificationStatus::Expired),
            other => Err(Error::invalid(format!(
                "unknown notification status: {other}"
            ))),
        }
    }
}

/// A network identity. One identity may own several mesh nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub handle: String,
    pub privacy_level: PrivacyLevel,
    pub discoverable: bool,
    pub created_at: i64,
}

/// Result of resolving an identity handle, the shape consumed by the
/// external signaling layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityResolution {
    pub exists: bool,
    pub privacy_level: Option<PrivacyLevel>,
    pub discoverable: bool,
}

impl IdentityResolution {
    /// Resolution for a handle with no backing record.
    pub fn missing() -> Self {
        Self {
            exists: false,
            privacy_level: None,
            discoverable: false,
        }
    }
}

/// A mesh network endpoint capable of relaying or terminating traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshNode {
    pub node_id: String,
    /// Owning identity handle.
    pub identity: String,
    /// Socket address the node listens on.
    pub address: String,
    pub node_type: NodeType,
    pub latitude: f64,
    pub longitude: f64,
    pub region: String,
    pub max_connections: u32,
    pub current_connections: u32,
    pub bandwidth_capacity_mbps: f64,
    pub bandwidth_usage_mbps: f64,
    pub avg_latency_ms: f64,
    pub packet_loss_rate: f64,
    /// Derived availability telemetry, 0–100.
    pub uptime_percentage: f64,
    /// Behavioral telemetry evolved by reputation events, 0–100.
    pub reputation_score: f64,
    /// Denormalized from the trust ledger on every recompute.
    pub trust_score: f64,
    /// Whether the node supports the external bandwidth-compression codec.
    pub aic_capable: bool,
    pub status: NodeStatus,
    pub last_heartbeat: i64,
    pub created_at: i64,
}

impl MeshNode {
    /// Whether the node can accept another connection.
    pub fn has_spare_capacity(&self) -> bool {
        self.current_connections < self.max_connections
    }
}

/// Static capabilities supplied at node registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCapabilities {
    pub latitude: f64,
    pub longitude: f64,
    pub region: String,
    pub max_connections: u32,
    pub bandwidth_capacity_mbps: f64,
    pub aic_capable: bool,
}

/// Live telemetry carried by a heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatMetrics {
    pub current_connections: u32,
    pub bandwidth_usage_mbps: f64,
    pub avg_latency_ms: f64,
    pub packet_loss_rate: f64,
}

/// Composite 0–100 trust snapshot for an identity or node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustScore {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub base_score: f64,
    pub verification_bonus: f64,
    pub behavior_score: f64,
    pub penalty_score: f64,
    pub total_score: f64,
    pub trust_level: TrustLevel,
    pub last_calculated_at: i64,
}

impl TrustScore {
    /// Snapshot for an entity with no backing record: fully untrusted.
    pub fn untrusted(entity_type: EntityType, entity_id: &str, now_ms: i64) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.to_string(),
            base_score: 0.0,
            verification_bonus: 0.0,
            behavior_score: 0.0,
            penalty_score: 0.0,
            total_score: 0.0,
            trust_level: TrustLevel::Caution,
            last_calculated_at: now_ms,
        }
    }
}

/// An immutable entry in the reputation ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationEvent {
    pub event_id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub event_type: String,
    pub severity: u8,
    pub score_delta: f64,
    pub previous_score: f64,
    pub new_score: f64,
    pub description: String,
    pub created_at: i64,
}

/// A report filed against an identity or node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbuseReport {
    pub report_id: String,
    pub reporter: String,
    pub reported_entity_type: EntityType,
    pub reported_entity_id: String,
    pub report_type: String,
    pub severity: u8,
    pub status: ReportStatus,
    pub description: String,
    pub evidence: serde_json::Value,
    pub created_at: i64,
    pub resolved_at: Option<i64>,
}

/// A verification attempt for an identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub verification_id: String,
    pub identity: String,
    pub method: VerificationMethod,
    pub status: VerificationStatus,
    /// Pending records past this deadline are expired by maintenance.
    pub deadline: i64,
    pub created_at: i64,
    pub verified_at: Option<i64>,
}

/// A user-facing notification subject to expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: String,
    pub identity: String,
    pub kind: String,
    pub body: String,
    pub status: NotificationStatus,
    pub created_at: i64,
    pub expires_at: i64,
}

/// A selected path between two identities.
///
/// `path` lists the nodes traffic traverses after leaving the source
/// identity's egress node: `[dst]` for a direct route, up to
/// `[relay_a, relay_b, dst]` for a two-relay route. `hop_count` always
/// equals `path.len()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,
    pub source_identity: String,
    pub dest_identity: String,
    pub path: Vec<String>,
    pub hop_count: u32,
    pub predicted_latency_ms: f64,
    pub predicted_bandwidth_mbps: f64,
    pub ai_score: f64,
    pub supports_aic: bool,
    pub is_optimal: bool,
    pub is_active: bool,
    pub expires_at: i64,
    pub usage_count: i64,
    pub success_rate: f64,
    pub created_at: i64,
}

/// A cached `(source, dest) -> route` mapping with a fixed TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteCacheEntry {
    pub source_identity: String,
    pub dest_identity: String,
    pub route_id: String,
    pub hit_count: i64,
    pub created_at: i64,
    pub last_used_at: i64,
    pub expires_at: i64,
}

/// Route description returned to the external call-signaling layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResponse {
    pub route_id: String,
    pub path_nodes: Vec<String>,
    pub predicted_latency_ms: f64,
    pub predicted_bandwidth_mbps: f64,
    pub ai_score: f64,
    pub supports_aic: bool,
    pub is_optimal: bool,
}

impl From<&Route> for RouteResponse {
    fn from(route: &Route) -> Self {
        Self {
            route_id: route.route_id.clone(),
            path_nodes: route.path.clone(),
            predicted_latency_ms: route.predicted_latency_ms,
            predicted_bandwidth_mbps: route.predicted_bandwidth_mbps,
            ai_score: route.ai_score,
            supports_aic: route.supports_aic,
            is_optimal: route.is_optimal,
        }
    }
}
