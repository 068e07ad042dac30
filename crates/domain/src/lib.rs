//! Loomnet domain model.
//!
//! Entity types shared by the registry, trust, routing, and maintenance
//! crates, plus the pure functions that classify them. Nothing here touches
//! storage; persistence lives in `loomnet-store`.

pub mod id;
pub mod model;

pub use id::new_id;
pub use model::{
    clamp_score, AbuseReport, EntityType, HeartbeatMetrics, Identity, IdentityResolution,
    MeshNode, NodeCapabilities, NodeStatus, NodeType, Notification, NotificationStatus,
    PrivacyLevel, ReportStatus, ReputationEvent, Route, RouteCacheEntry, RouteResponse,
    TrustLevel, TrustScore, VerificationMethod, VerificationRecord, VerificationStatus,
    MAX_PATH_HOPS, MIN_PATH_HOPS,
};
