//! Relational schema.
//!
//! All timestamps are milliseconds since the Unix epoch. Booleans are
//! stored as 0/1 integers, enum values as their stable string form.

use rusqlite::Connection;

use loomnet_core::error::Result;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS identities (
    handle        TEXT PRIMARY KEY,
    privacy_level TEXT NOT NULL,
    discoverable  INTEGER NOT NULL DEFAULT 1,
    created_at    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS mesh_nodes (
    node_id                 TEXT PRIMARY KEY,
    identity                TEXT NOT NULL,
    address                 TEXT NOT NULL,
    node_type               TEXT NOT NULL,
    latitude                REAL NOT NULL,
    longitude               REAL NOT NULL,
    region                  TEXT NOT NULL,
    max_connections         INTEGER NOT NULL,
    current_connections     INTEGER NOT NULL DEFAULT 0,
    bandwidth_capacity_mbps REAL NOT NULL,
    bandwidth_usage_mbps    REAL NOT NULL DEFAULT 0,
    avg_latency_ms          REAL NOT NULL DEFAULT 0,
    packet_loss_rate        REAL NOT NULL DEFAULT 0,
    uptime_percentage       REAL NOT NULL DEFAULT 100,
    reputation_score        REAL NOT NULL DEFAULT 50,
    trust_score             REAL NOT NULL DEFAULT 50,
    aic_capable             INTEGER NOT NULL DEFAULT 0,
    status                  TEXT NOT NULL DEFAULT 'active',
    last_heartbeat          INTEGER NOT NULL,
    created_at              INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_nodes_identity ON mesh_nodes(identity, status);
CREATE INDEX IF NOT EXISTS idx_nodes_status_heartbeat ON mesh_nodes(status, last_heartbeat);
CREATE INDEX IF NOT EXISTS idx_nodes_trust ON mesh_nodes(trust_score);

CREATE TABLE IF NOT EXISTS trust_scores (
    entity_type        TEXT NOT NULL,
    entity_id          TEXT NOT NULL,
    base_score         REAL NOT NULL,
    verification_bonus REAL NOT NULL,
    behavior_score     REAL NOT NULL,
    penalty_score      REAL NOT NULL,
    total_score        REAL NOT NULL,
    trust_level        TEXT NOT NULL,
    last_calculated_at INTEGER NOT NULL,
    PRIMARY KEY (entity_type, entity_id)
);

CREATE TABLE IF NOT EXISTS reputation_events (
    event_id       TEXT PRIMARY KEY,
    entity_type    TEXT NOT NULL,
    entity_id      TEXT NOT NULL,
    event_type     TEXT NOT NULL,
    severity       INTEGER NOT NULL,
    score_delta    REAL NOT NULL,
    previous_score REAL NOT NULL,
    new_score      REAL NOT NULL,
    description    TEXT NOT NULL,
    created_at     INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_entity
    ON reputation_events(entity_type, entity_id, created_at);

CREATE TABLE IF NOT EXISTS abuse_reports (
    report_id            TEXT PRIMARY KEY,
    reporter             TEXT NOT NULL,
    reported_entity_type TEXT NOT NULL,
    reported_entity_id   TEXT NOT NULL,
    report_type          TEXT NOT NULL,
    severity             INTEGER NOT NULL,
    status               TEXT NOT NULL DEFAULT 'pending',
    description          TEXT NOT NULL,
    evidence             TEXT NOT NULL,
    created_at           INTEGER NOT NULL,
    resolved_at          INTEGER
);
CREATE INDEX IF NOT EXISTS idx_reports_entity
    ON abuse_reports(reported_entity_type, reported_entity_id, status);

CREATE TABLE IF NOT EXISTS verifications (
    verification_id TEXT PRIMARY KEY,
    identity        TEXT NOT NULL,
    method          TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'pending',
    deadline        INTEGER NOT NULL,
    created_at      INTEGER NOT NULL,
    verified_at     INTEGER
);
CREATE INDEX IF NOT EXISTS idx_verifications_identity ON verifications(identity, status);
CREATE INDEX IF NOT EXISTS idx_verifications_deadline ON verifications(status, deadline);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    identity        TEXT NOT NULL,
    kind            TEXT NOT NULL,
    body            TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'unread',
    created_at      INTEGER NOT NULL,
    expires_at      INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notifications_expiry ON notifications(status, expires_at);

CREATE TABLE IF NOT EXISTS routes (
    route_id                 TEXT PRIMARY KEY,
    source_identity          TEXT NOT NULL,
    dest_identity            TEXT NOT NULL,
    path                     TEXT NOT NULL,
    hop_count                INTEGER NOT NULL,
    predicted_latency_ms     REAL NOT NULL,
    predicted_bandwidth_mbps REAL NOT NULL,
    ai_score                 REAL NOT NULL,
    supports_aic             INTEGER NOT NULL,
    is_optimal               INTEGER NOT NULL,
    is_active                INTEGER NOT NULL DEFAULT 1,
    expires_at               INTEGER NOT NULL,
    usage_count              INTEGER NOT NULL DEFAULT 0,
    success_rate             REAL NOT NULL DEFAULT 1.0,
    created_at               INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_routes_pair ON routes(source_identity, dest_identity);

CREATE TABLE IF NOT EXISTS route_cache (
    source_identity TEXT NOT NULL,
    dest_identity   TEXT NOT NULL,
    route_id        TEXT NOT NULL,
    hit_count       INTEGER NOT NULL DEFAULT 0,
    created_at      INTEGER NOT NULL,
    last_used_at    INTEGER NOT NULL,
    expires_at      INTEGER NOT NULL,
    PRIMARY KEY (source_identity, dest_identity)
);
CREATE INDEX IF NOT EXISTS idx_route_cache_expiry ON route_cache(expires_at);
CREATE INDEX IF NOT EXISTS idx_route_cache_route ON route_cache(route_id);
";

/// Create all tables and indexes if they do not exist yet.
pub(crate) fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
