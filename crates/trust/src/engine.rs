//! Trust score computation.
//!
//! A score is a pure function of current state — verified records, node
//! telemetry, undismissed abuse reports — so recomputation is idempotent:
//! concurrent callers write identical snapshots and the last writer wins.

use tracing::debug;

use loomnet_core::error::{Error, Result};
use loomnet_core::time::now_ms;
use loomnet_domain::{
    clamp_score, new_id, EntityType, TrustLevel, TrustScore, VerificationMethod,
    VerificationRecord, VerificationStatus,
};
use loomnet_store::Store;

use crate::events::ReputationEventLog;

/// Starting score for every known entity.
pub const BASE_SCORE: f64 = 50.0;

/// Penalty per abuse report that has not been dismissed.
pub const ABUSE_REPORT_PENALTY: f64 = 20.0;

/// Computes and persists trust snapshots.
pub struct TrustScoreEngine {
    store: Store,
    events: ReputationEventLog,
}

impl TrustScoreEngine {
    /// Create an engine over the shared store.
    pub fn new(store: Store) -> Self {
        let events = ReputationEventLog::new(store.clone());
        Self { store, events }
    }

    /// Compute the current trust snapshot for an entity and persist it.
    ///
    /// An unknown entity id yields an unpersisted zero snapshot — fully
    /// untrusted, but not an error.
    pub fn calculate(&self, entity_type: EntityType, entity_id: &str) -> Result<TrustScore> {
        match entity_type {
            EntityType::Identity => self.calculate_identity(entity_id),
            EntityType::Node => self.calculate_node(entity_id),
        }
    }

    fn calculate_identity(&self, identity: &str) -> Result<TrustScore> {
        let now = now_ms();
        if !self.store.identity_exists(identity)? {
            return Ok(TrustScore::untrusted(EntityType::Identity, identity, now));
        }

        let verification_bonus = self.store.verification_bonus(identity)?;
        let penalty_score = -ABUSE_REPORT_PENALTY
            * self
                .store
                .count_undismissed_reports(EntityType::Identity, identity)? as f64;
        let total_score = clamp_score(BASE_SCORE + verification_bonus + penalty_score);

        let score = TrustScore {
            entity_type: EntityType::Identity,
            entity_id: identity.to_string(),
            base_score: BASE_SCORE,
            verification_bonus,
            behavior_score: 0.0,
            penalty_score,
            total_score,
            trust_level: TrustLevel::for_score(total_score),
            last_calculated_at: now,
        };
        self.store.upsert_trust_score(&score)?;
        debug!(identity = %identity, total = total_score, "identity trust recomputed");
        Ok(score)
    }

    fn calculate_node(&self, node_id: &str) -> Result<TrustScore> {
        let now = now_ms();
        let Some(node) = self.store.get_node(node_id)? else {
            return Ok(TrustScore::untrusted(EntityType::Node, node_id, now));
        };

        let behavior_score = node.uptime_percentage / 5.0 + node.reputation_score / 5.0;
        let penalty_score = -ABUSE_REPORT_PENALTY
            * self
                .store
                .count_undismissed_reports(EntityType::Node, node_id)? as f64;
        let total_score = clamp_score(BASE_SCORE + behavior_score + penalty_score);

        let score = TrustScore {
            entity_type: EntityType::Node,
            entity_id: node_id.to_string(),
            base_score: BASE_SCORE,
            verification_bonus: 0.0,
            behavior_score,
            penalty_score,
            total_score,
            trust_level: TrustLevel::for_score(total_score),
            last_calculated_at: now,
        };
        self.store.upsert_trust_score(&score)?;
        self.store.set_node_trust(node_id, total_score)?;
        debug!(node_id = %node_id, total = total_score, "node trust recomputed");
        Ok(score)
    }

    /// Open a verification attempt for an identity. The record stays
    /// pending until confirmed or expired by maintenance.
    pub fn request_verification(
        &self,
        identity: &str,
        method: VerificationMethod,
        deadline_ms: i64,
    ) -> Result<VerificationRecord> {
        if !self.store.identity_exists(identity)? {
            return Err(Error::not_found("identity", identity));
        }
        let record = VerificationRecord {
            verification_id: new_id("vr"),
            identity: identity.to_string(),
            method,
            status: VerificationStatus::Pending,
            deadline: deadline_ms,
            created_at: now_ms(),
            verified_at: None,
        };
        self.store.insert_verification(&record)?;
        Ok(record)
    }

    /// Confirm a pending verification and fold the bonus into the
    /// identity's trust. A record already settled (confirmed elsewhere or
    /// expired by maintenance) surfaces as [`Error::StaleWrite`].
    pub fn confirm_verification(&self, verification_id: &str) -> Result<TrustScore> {
        let Some(record) = self.store.get_verification(verification_id)? else {
            return Err(Error::not_found("verification", verification_id));
        };

        let previous = self
            .store
            .get_trust_score(EntityType::Identity, &record.identity)?
            .map(|s| s.total_score)
            .unwrap_or(BASE_SCORE);

        let changed =
            self.store
                .settle_verification(verification_id, VerificationStatus::Verified, Some(now_ms()))?;
        if changed == 0 {
            return Err(Error::StaleWrite(format!(
                "verification {verification_id} already settled"
            )));
        }

        let score = self.calculate_identity(&record.identity)?;
        self.events.record(
            EntityType::Identity,
            &record.identity,
            "verification_completed",
            1,
            score.total_score - previous,
            previous,
            score.total_score,
            &format!("{} verification confirmed", record.method.as_str()),
        )?;
        Ok(score)
    }
}
