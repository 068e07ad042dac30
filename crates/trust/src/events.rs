//! Append-only reputation event ledger.
//!
//! Every scoring-relevant occurrence lands here as an immutable row with
//! the before/after scores it observed. Node events also fold their delta
//! into the node's behavioral telemetry through one clamped atomic update,
//! so a replay of the ledger plus current telemetry always reproduces the
//! trust state.

use tracing::debug;

use loomnet_core::error::{Error, Result};
use loomnet_core::time::now_ms;
use loomnet_domain::{new_id, EntityType, ReputationEvent};
use loomnet_store::Store;

/// Reputation delta applied to each path node after a successful route
/// performance report.
pub const ROUTE_SUCCESS_DELTA: f64 = 1.0;

/// Reputation delta applied to each path node after a failed route
/// performance report.
pub const ROUTE_FAILURE_DELTA: f64 = -2.0;

/// Lowest accepted event/report severity.
pub const MIN_SEVERITY: u8 = 1;

/// Highest accepted event/report severity.
pub const MAX_SEVERITY: u8 = 5;

/// Reject severities outside the accepted range.
pub fn validate_severity(severity: u8) -> Result<()> {
    if !(MIN_SEVERITY..=MAX_SEVERITY).contains(&severity) {
        return Err(Error::invalid(format!(
            "severity {severity} out of range [{MIN_SEVERITY}, {MAX_SEVERITY}]"
        )));
    }
    Ok(())
}

/// Writer for the reputation ledger.
pub struct ReputationEventLog {
    store: Store,
}

impl ReputationEventLog {
    /// Create a ledger writer over the shared store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Record a ledger row with the before/after scores the caller
    /// observed around its own atomic update.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        event_type: &str,
        severity: u8,
        score_delta: f64,
        previous_score: f64,
        new_score: f64,
        description: &str,
    ) -> Result<ReputationEvent> {
        validate_severity(severity)?;
        let event = ReputationEvent {
            event_id: new_id("ev"),
            entity_type,
            entity_id: entity_id.to_string(),
            event_type: event_type.to_string(),
            severity,
            score_delta,
            previous_score,
            new_score,
            description: description.to_string(),
            created_at: now_ms(),
        };
        self.store.insert_reputation_event(&event)?;
        debug!(
            entity = %event.entity_id,
            event_type = %event.event_type,
            delta = event.score_delta,
            "reputation event recorded"
        );
        Ok(event)
    }

    /// Apply a clamped delta to a node's behavioral telemetry and record
    /// the resulting transition. Returns `None` for a node that no longer
    /// exists (deregistered mid-flight), which callers skip silently.
    pub fn apply_node_delta(
        &self,
        node_id: &str,
        event_type: &str,
        severity: u8,
        delta: f64,
        description: &str,
    ) -> Result<Option<ReputationEvent>> {
        validate_severity(severity)?;
        let Some((previous, new)) = self.store.adjust_node_reputation(node_id, delta)? else {
            debug!(node_id = %node_id, "reputation delta dropped, node gone");
            return Ok(None);
        };
        let event = self.record(
            EntityType::Node,
            node_id,
            event_type,
            severity,
            delta,
            previous,
            new,
            description,
        )?;
        Ok(Some(event))
    }

    /// Most recent ledger rows for an entity, newest first.
    pub fn events_for(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        limit: usize,
    ) -> Result<Vec<ReputationEvent>> {
        self.store.events_for_entity(entity_type, entity_id, limit)
    }
}
