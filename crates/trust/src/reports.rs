//! Abuse report lifecycle.
//!
//! Reports are filed pending and weigh on the reported entity's penalty
//! from that moment; settlement is a single conditional update so exactly
//! one moderator outcome wins, and the winner triggers the trust recompute
//! and the ledger entry.

use tracing::info;

use loomnet_core::error::{Error, Result};
use loomnet_core::time::now_ms;
use loomnet_domain::{
    new_id, AbuseReport, EntityType, Notification, NotificationStatus, ReportStatus,
};
use loomnet_store::Store;

use crate::engine::{TrustScoreEngine, BASE_SCORE};
use crate::events::{validate_severity, ReputationEventLog};

/// How long a resolution notice stays acknowledgeable.
const RESOLUTION_NOTICE_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// An abuse report as submitted by a reporter.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NewAbuseReport {
    pub reporter: String,
    pub reported_entity_type: EntityType,
    pub reported_entity_id: String,
    pub report_type: String,
    pub severity: u8,
    pub description: String,
    pub evidence: serde_json::Value,
}

/// Moderator outcome for a pending report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportResolution {
    /// The report was confirmed; the penalty stays.
    Resolved,
    /// The report was rejected; it stops counting against the entity.
    Dismissed,
}

impl ReportResolution {
    fn status(self) -> ReportStatus {
        match self {
            ReportResolution::Resolved => ReportStatus::Resolved,
            ReportResolution::Dismissed => ReportStatus::Dismissed,
        }
    }
}

/// Ingests and settles abuse reports.
pub struct AbuseReportManager {
    store: Store,
    engine: TrustScoreEngine,
    events: ReputationEventLog,
}

impl AbuseReportManager {
    /// Create a manager over the shared store.
    pub fn new(store: Store) -> Self {
        let engine = TrustScoreEngine::new(store.clone());
        let events = ReputationEventLog::new(store.clone());
        Self {
            store,
            engine,
            events,
        }
    }

    /// File a report. The reporter must resolve to a known identity.
    pub fn ingest(&self, new: NewAbuseReport) -> Result<AbuseReport> {
        validate_severity(new.severity)?;
        if !self.store.identity_exists(&new.reporter)? {
            return Err(Error::not_found("identity", &new.reporter));
        }

        let report = AbuseReport {
            report_id: new_id("ar"),
            reporter: new.reporter,
            reported_entity_type: new.reported_entity_type,
            reported_entity_id: new.reported_entity_id,
            report_type: new.report_type,
            severity: new.severity,
            status: ReportStatus::Pending,
            description: new.description,
            evidence: new.evidence,
            created_at: now_ms(),
            resolved_at: None,
        };
        self.store.insert_abuse_report(&report)?;
        info!(
            report_id = %report.report_id,
            reported = %report.reported_entity_id,
            severity = report.severity,
            "abuse report filed"
        );
        Ok(report)
    }

    /// Settle a pending report and recompute the reported entity's trust.
    ///
    /// A report that was already settled surfaces as [`Error::StaleWrite`];
    /// the first outcome stands.
    pub fn resolve(&self, report_id: &str, resolution: ReportResolution) -> Result<AbuseReport> {
        let Some(report) = self.store.get_abuse_report(report_id)? else {
            return Err(Error::not_found("abuse report", report_id));
        };

        let previous = self
            .store
            .get_trust_score(report.reported_entity_type, &report.reported_entity_id)?
            .map(|s| s.total_score)
            .unwrap_or(BASE_SCORE);

        let changed = self
            .store
            .settle_abuse_report(report_id, resolution.status(), now_ms())?;
        if changed == 0 {
            return Err(Error::StaleWrite(format!(
                "abuse report {report_id} already settled"
            )));
        }

        let score = self
            .engine
            .calculate(report.reported_entity_type, &report.reported_entity_id)?;
        let event_type = match resolution {
            ReportResolution::Resolved => "abuse_report_resolved",
            ReportResolution::Dismissed => "abuse_report_dismissed",
        };
        self.events.record(
            report.reported_entity_type,
            &report.reported_entity_id,
            event_type,
            report.severity,
            score.total_score - previous,
            previous,
            score.total_score,
            &report.report_type,
        )?;

        let now = now_ms();
        self.store.insert_notification(&Notification {
            notification_id: new_id("nt"),
            identity: report.reporter.clone(),
            kind: "abuse_report_settled".to_string(),
            body: format!("report {report_id} was {}", resolution.status().as_str()),
            status: NotificationStatus::Unread,
            created_at: now,
            expires_at: now + RESOLUTION_NOTICE_TTL_MS,
        })?;

        info!(
            report_id = %report_id,
            outcome = resolution.status().as_str(),
            trust = score.total_score,
            "abuse report settled"
        );
        self.store
            .get_abuse_report(report_id)?
            .ok_or_else(|| Error::not_found("abuse report", report_id))
    }
}
