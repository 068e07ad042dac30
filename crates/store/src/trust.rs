//! Trust ledger persistence: score snapshots, the append-only reputation
//! event log, and abuse reports.

use rusqlite::{params, OptionalExtension, Row};

use loomnet_core::error::Result;
use loomnet_domain::{AbuseReport, EntityType, ReportStatus, ReputationEvent, TrustScore};

use crate::{parse_text, Store};

fn map_trust_score(row: &Row<'_>) -> rusqlite::Result<TrustScore> {
    Ok(TrustScore {
        entity_type: parse_text(0, row.get::<_, String>(0)?)?,
        entity_id: row.get(1)?,
        base_score: row.get(2)?,
        verification_bonus: row.get(3)?,
        behavior_score: row.get(4)?,
        penalty_score: row.get(5)?,
        total_score: row.get(6)?,
        trust_level: parse_text(7, row.get::<_, String>(7)?)?,
        last_calculated_at: row.get(8)?,
    })
}

fn map_event(row: &Row<'_>) -> rusqlite::Result<ReputationEvent> {
    Ok(ReputationEvent {
        event_id: row.get(0)?,
        entity_type: parse_text(1, row.get::<_, String>(1)?)?,
        entity_id: row.get(2)?,
        event_type: row.get(3)?,
        severity: row.get(4)?,
        score_delta: row.get(5)?,
        previous_score: row.get(6)?,
        new_score: row.get(7)?,
        description: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn map_report(row: &Row<'_>) -> rusqlite::Result<AbuseReport> {
    let evidence_raw: String = row.get(8)?;
    let evidence = serde_json::from_str(&evidence_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })?;
    Ok(AbuseReport {
        report_id: row.get(0)?,
        reporter: row.get(1)?,
        reported_entity_type: parse_text(2, row.get::<_, String>(2)?)?,
        reported_entity_id: row.get(3)?,
        report_type: row.get(4)?,
        severity: row.get(5)?,
        status: parse_text(6, row.get::<_, String>(6)?)?,
        description: row.get(7)?,
        evidence,
        created_at: row.get(9)?,
        resolved_at: row.get(10)?,
    })
}

impl Store {
    /// Write a trust snapshot. The upsert is a single statement, so
    /// concurrent recomputations settle last-writer-wins with no torn rows.
    pub fn upsert_trust_score(&self, score: &TrustScore) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO trust_scores (entity_type, entity_id, base_score, \
                 verification_bonus, behavior_score, penalty_score, total_score, \
                 trust_level, last_calculated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(entity_type, entity_id) DO UPDATE SET
                     base_score = excluded.base_score,
                     verification_bonus = excluded.verification_bonus,
                     behavior_score = excluded.behavior_score,
                     penalty_score = excluded.penalty_score,
                     total_score = excluded.total_score,
                     trust_level = excluded.trust_level,
                     last_calculated_at = excluded.last_calculated_at",
                params![
                    score.entity_type.as_str(),
                    score.entity_id,
                    score.base_score,
                    score.verification_bonus,
                    score.behavior_score,
                    score.penalty_score,
                    score.total_score,
                    score.trust_level.as_str(),
                    score.last_calculated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Fetch the stored trust snapshot for an entity.
    pub fn get_trust_score(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Option<TrustScore>> {
        self.with_conn(|conn| {
            let score = conn
                .query_row(
                    "SELECT entity_type, entity_id, base_score, verification_bonus, \
                     behavior_score, penalty_score, total_score, trust_level, \
                     last_calculated_at
                     FROM trust_scores WHERE entity_type = ?1 AND entity_id = ?2",
                    params![entity_type.as_str(), entity_id],
                    map_trust_score,
                )
                .optional()?;
            Ok(score)
        })
    }

    /// Append a row to the reputation ledger. Rows are never updated.
    pub fn insert_reputation_event(&self, event: &ReputationEvent) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reputation_events (event_id, entity_type, entity_id, \
                 event_type, severity, score_delta, previous_score, new_score, \
                 description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    event.event_id,
                    event.entity_type.as_str(),
                    event.entity_id,
                    event.event_type,
                    event.severity,
                    event.score_delta,
                    event.previous_score,
                    event.new_score,
                    event.description,
                    event.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Most recent ledger rows for an entity, newest first.
    pub fn events_for_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        limit: usize,
    ) -> Result<Vec<ReputationEvent>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT event_id, entity_type, entity_id, event_type, severity, \
                 score_delta, previous_score, new_score, description, created_at
                 FROM reputation_events
                 WHERE entity_type = ?1 AND entity_id = ?2
                 ORDER BY created_at DESC, event_id DESC
                 LIMIT ?3",
            )?;
            let events = stmt
                .query_map(
                    params![entity_type.as_str(), entity_id, limit as i64],
                    map_event,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(events)
        })
    }

    /// File a new abuse report.
    pub fn insert_abuse_report(&self, report: &AbuseReport) -> Result<()> {
        let evidence = serde_json::to_string(&report.evidence)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO abuse_reports (report_id, reporter, reported_entity_type, \
                 reported_entity_id, report_type, severity, status, description, \
                 evidence, created_at, resolved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    report.report_id,
                    report.reporter,
                    report.reported_entity_type.as_str(),
                    report.reported_entity_id,
                    report.report_type,
                    report.severity,
                    report.status.as_str(),
                    report.description,
                    evidence,
                    report.created_at,
                    report.resolved_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Fetch an abuse report by id.
    pub fn get_abuse_report(&self, report_id: &str) -> Result<Option<AbuseReport>> {
        self.with_conn(|conn| {
            let report = conn
                .query_row(
                    "SELECT report_id, reporter, reported_entity_type, reported_entity_id, \
                     report_type, severity, status, description, evidence, created_at, \
                     resolved_at
                     FROM abuse_reports WHERE report_id = ?1",
                    params![report_id],
                    map_report,
                )
                .optional()?;
            Ok(report)
        })
    }

    /// Settle a pending report. Returns the number of rows updated: zero
    /// means a concurrent caller settled it first.
    pub fn settle_abuse_report(
        &self,
        report_id: &str,
        status: ReportStatus,
        resolved_at: i64,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE abuse_reports SET status = ?1, resolved_at = ?2
                 WHERE report_id = ?3 AND status = 'pending'",
                params![status.as_str(), resolved_at, report_id],
            )?;
            Ok(changed)
        })
    }

    /// Count reports against an entity that still weigh on its trust
    /// (pending and resolved both count; dismissed does not).
    pub fn count_undismissed_reports(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM abuse_reports
                 WHERE reported_entity_type = ?1 AND reported_entity_id = ?2
                   AND status != 'dismissed'",
                params![entity_type.as_str(), entity_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loomnet_core::time::now_ms;
    use loomnet_domain::{new_id, TrustLevel};

    fn snapshot(entity_id: &str, total: f64) -> TrustScore {
        TrustScore {
            entity_type: EntityType::Node,
            entity_id: entity_id.to_string(),
            base_score: 50.0,
            verification_bonus: 0.0,
            behavior_score: 30.0,
            penalty_score: 0.0,
            total_score: total,
            trust_level: TrustLevel::for_score(total),
            last_calculated_at: now_ms(),
        }
    }

    fn report(id: &str, against: &str, status: ReportStatus) -> AbuseReport {
        AbuseReport {
            report_id: id.to_string(),
            reporter: "carol".to_string(),
            reported_entity_type: EntityType::Node,
            reported_entity_id: against.to_string(),
            report_type: "spam".to_string(),
            severity: 3,
            status,
            description: "unsolicited traffic".to_string(),
            evidence: serde_json::json!({"packets": 120}),
            created_at: now_ms(),
            resolved_at: None,
        }
    }

    #[test]
    fn test_trust_upsert_is_last_writer_wins() {
        let store = Store::open_in_memory().unwrap();

        store.upsert_trust_score(&snapshot("mn-1", 80.0)).unwrap();
        store.upsert_trust_score(&snapshot("mn-1", 65.0)).unwrap();

        let stored = store
            .get_trust_score(EntityType::Node, "mn-1")
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_score, 65.0);
        assert_eq!(stored.trust_level, TrustLevel::Trusted);
    }

    #[test]
    fn test_event_ledger_is_append_only_and_ordered() {
        let store = Store::open_in_memory().unwrap();

        for (i, delta) in [1.0, -2.0, 1.0].iter().enumerate() {
            let event = ReputationEvent {
                event_id: new_id("ev"),
                entity_type: EntityType::Node,
                entity_id: "mn-1".to_string(),
                event_type: "route_feedback".to_string(),
                severity: 1,
                score_delta: *delta,
                previous_score: 50.0,
                new_score: 50.0 + delta,
                description: format!("sample {i}"),
                created_at: now_ms() + i as i64,
            };
            store.insert_reputation_event(&event).unwrap();
        }

        let events = store
            .events_for_entity(EntityType::Node, "mn-1", 10)
            .unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].description, "sample 2");

        let limited = store
            .events_for_entity(EntityType::Node, "mn-1", 2)
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_settle_report_only_once() {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_abuse_report(&report("ar-1", "mn-1", ReportStatus::Pending))
            .unwrap();

        let first = store
            .settle_abuse_report("ar-1", ReportStatus::Resolved, now_ms())
            .unwrap();
        let second = store
            .settle_abuse_report("ar-1", ReportStatus::Dismissed, now_ms())
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 0);
        let stored = store.get_abuse_report("ar-1").unwrap().unwrap();
        assert_eq!(stored.status, ReportStatus::Resolved);
        assert!(stored.resolved_at.is_some());
    }

    #[test]
    fn test_undismissed_count_ignores_dismissed() {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_abuse_report(&report("ar-1", "mn-1", ReportStatus::Pending))
            .unwrap();
        store
            .insert_abuse_report(&report("ar-2", "mn-1", ReportStatus::Resolved))
            .unwrap();
        store
            .insert_abuse_report(&report("ar-3", "mn-1", ReportStatus::Dismissed))
            .unwrap();

        let count = store
            .count_undismissed_reports(EntityType::Node, "mn-1")
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_evidence_round_trips_as_json() {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_abuse_report(&report("ar-1", "mn-1", ReportStatus::Pending))
            .unwrap();

        let stored = store.get_abuse_report("ar-1").unwrap().unwrap();
        assert_eq!(stored.evidence["packets"], 120);
    }
}
