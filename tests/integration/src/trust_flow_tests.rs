//! Trust evolution scenarios across verifications, abuse reports, and
//! route selection.

use crate::test_utils::*;
use loomnet_core::time::now_ms;
use loomnet_core::Error;
use loomnet_domain::{EntityType, TrustLevel, VerificationMethod};
use loomnet_trust::{NewAbuseReport, ReportResolution};

#[test]
fn test_verification_ladder_to_trusted() {
    let mesh = TestMesh::new(&["alice"]);
    let deadline = now_ms() + 60_000;

    let email = mesh
        .engine
        .request_verification("alice", VerificationMethod::Email, deadline)
        .unwrap();
    let phone = mesh
        .engine
        .request_verification("alice", VerificationMethod::Phone, deadline)
        .unwrap();

    // Pending records contribute nothing yet.
    let score = mesh.engine.calculate(EntityType::Identity, "alice").unwrap();
    assert_eq!(score.total_score, 50.0);

    mesh.engine.confirm_verification(&email.verification_id).unwrap();
    let score = mesh.engine.confirm_verification(&phone.verification_id).unwrap();

    assert_eq!(score.verification_bonus, 25.0);
    assert_eq!(score.total_score, 75.0);
    assert_eq!(score.trust_level, TrustLevel::Trusted);

    // The ledger carries both confirmations.
    let events = mesh
        .store
        .events_for_entity(EntityType::Identity, "alice", 10)
        .unwrap();
    assert_eq!(events.len(), 2);
}

#[test]
fn test_abuse_reports_pull_a_node_to_the_boundary() {
    let mesh = TestMesh::new(&["alice", "carol"]);
    let node = mesh.register_node("alice", "10.0.0.1:4600", BERLIN, false);

    // Three reports, none dismissed: -60 against base 50 + behavior 30.
    for _ in 0..3 {
        mesh.reports
            .ingest(NewAbuseReport {
                reporter: "carol".to_string(),
                reported_entity_type: EntityType::Node,
                reported_entity_id: node.node_id.clone(),
                report_type: "flooding".to_string(),
                severity: 3,
                description: "relay abuse".to_string(),
                evidence: serde_json::json!({"pps": 9000}),
            })
            .unwrap();
    }

    let score = mesh.engine.calculate(EntityType::Node, &node.node_id).unwrap();
    assert_eq!(score.total_score, 20.0);
    assert_eq!(score.trust_level, TrustLevel::New);
}

#[test]
fn test_dismissed_report_lifts_the_penalty() {
    let mesh = TestMesh::new(&["alice", "carol"]);
    let node = mesh.register_node("alice", "10.0.0.1:4600", BERLIN, false);

    let report = mesh
        .reports
        .ingest(NewAbuseReport {
            reporter: "carol".to_string(),
            reported_entity_type: EntityType::Node,
            reported_entity_id: node.node_id.clone(),
            report_type: "spam".to_string(),
            severity: 2,
            description: "suspected spam relay".to_string(),
            evidence: serde_json::json!({}),
        })
        .unwrap();

    // Pending: the penalty applies on the next recompute.
    let score = mesh.engine.calculate(EntityType::Node, &node.node_id).unwrap();
    assert_eq!(score.total_score, 60.0);

    // Dismissal restores the score and notifies the reporter.
    mesh.reports
        .resolve(&report.report_id, ReportResolution::Dismissed)
        .unwrap();
    let score = mesh.engine.calculate(EntityType::Node, &node.node_id).unwrap();
    assert_eq!(score.total_score, 80.0);
    assert_eq!(mesh.store.unread_notifications_for("carol").unwrap().len(), 1);
}

#[test]
fn test_settlement_is_single_winner() {
    let mesh = TestMesh::new(&["alice", "carol"]);
    let node = mesh.register_node("alice", "10.0.0.1:4600", BERLIN, false);

    let report = mesh
        .reports
        .ingest(NewAbuseReport {
            reporter: "carol".to_string(),
            reported_entity_type: EntityType::Node,
            reported_entity_id: node.node_id.clone(),
            report_type: "spam".to_string(),
            severity: 2,
            description: String::new(),
            evidence: serde_json::json!({}),
        })
        .unwrap();

    mesh.reports
        .resolve(&report.report_id, ReportResolution::Resolved)
        .unwrap();
    let err = mesh
        .reports
        .resolve(&report.report_id, ReportResolution::Dismissed)
        .unwrap_err();
    assert!(matches!(err, Error::StaleWrite(_)));
}

#[test]
fn test_low_trust_node_is_skipped_as_relay() {
    let mesh = TestMesh::new(&["alice", "bob", "carrier"]);
    mesh.register_node("alice", "10.0.0.1:4600", BERLIN, false);
    mesh.register_node("bob", "10.0.0.2:4600", PARIS, false);
    let relay = mesh.register_node("carrier", "10.0.0.3:4600", FRANKFURT, false);

    // Tank the relay's trust below the 70 floor with abuse reports.
    mesh.reports
        .ingest(NewAbuseReport {
            reporter: "bob".to_string(),
            reported_entity_type: EntityType::Node,
            reported_entity_id: relay.node_id.clone(),
            report_type: "tampering".to_string(),
            severity: 5,
            description: "payload inspection suspected".to_string(),
            evidence: serde_json::json!({}),
        })
        .unwrap();
    mesh.engine.calculate(EntityType::Node, &relay.node_id).unwrap();

    let candidates = mesh
        .store
        .active_relay_candidates(mesh.config.routing.relay_min_trust, "alice", "bob", 16)
        .unwrap();
    assert!(candidates.is_empty());
}

#[test]
fn test_unknown_entities_are_untrusted_not_errors() {
    let mesh = TestMesh::new(&[]);

    let identity = mesh.engine.calculate(EntityType::Identity, "ghost").unwrap();
    let node = mesh.engine.calculate(EntityType::Node, "mn-ghost").unwrap();

    assert_eq!(identity.total_score, 0.0);
    assert_eq!(node.total_score, 0.0);
    assert_eq!(node.trust_level, TrustLevel::Caution);
}
