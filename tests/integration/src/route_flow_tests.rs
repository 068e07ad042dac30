//! End-to-end route lifecycle scenarios.

use crate::test_utils::*;
use loomnet_core::{Config, Error};
use loomnet_domain::{HeartbeatMetrics, RouteResponse};
use std::thread;
use std::time::Duration;

#[test]
fn test_route_selection_round_trip() {
    let mesh = TestMesh::new(&["alice", "bob"]);
    mesh.register_node("alice", "10.0.0.1:4600", BERLIN, true);
    let dst = mesh.register_node("bob", "10.0.0.2:4600", PARIS, true);

    let route = mesh
        .selector
        .find_optimal_route("alice", "bob", "audio", false)
        .unwrap();

    assert_eq!(route.hop_count, 1);
    assert_eq!(route.path, vec![dst.node_id.clone()]);
    assert!(route.supports_aic);
    assert!(route.predicted_latency_ms > 0.0);
    assert!((0.0..=100.0).contains(&route.ai_score));

    // The wire shape handed to the signaling layer mirrors the route.
    let response = RouteResponse::from(&route);
    assert_eq!(response.route_id, route.route_id);
    assert_eq!(response.path_nodes, route.path);

    // Within the TTL the same route comes back and the hit is counted.
    let again = mesh
        .selector
        .find_optimal_route("alice", "bob", "audio", false)
        .unwrap();
    assert_eq!(again.route_id, route.route_id);
    let entry = mesh.store.cache_entry("alice", "bob").unwrap().unwrap();
    assert_eq!(entry.hit_count, 1);

    // The reverse direction is its own cache key and gets its own route.
    let reverse = mesh
        .selector
        .find_optimal_route("bob", "alice", "audio", false)
        .unwrap();
    assert_ne!(reverse.route_id, route.route_id);
}

#[test]
fn test_expired_cache_triggers_recomputation() {
    let mut config = Config::default_config();
    config.routing.cache_ttl_secs = 0;
    let mesh = TestMesh::with_config(&["alice", "bob"], config);
    mesh.register_node("alice", "10.0.0.1:4600", BERLIN, false);
    mesh.register_node("bob", "10.0.0.2:4600", PARIS, false);

    let first = mesh
        .selector
        .find_optimal_route("alice", "bob", "audio", false)
        .unwrap();
    thread::sleep(Duration::from_millis(15));

    // The entry is expired but not yet evicted: the lookup must recompute
    // rather than serve it.
    assert!(mesh.store.cache_entry("alice", "bob").unwrap().is_some());
    let second = mesh
        .selector
        .find_optimal_route("alice", "bob", "audio", false)
        .unwrap();
    assert_ne!(first.route_id, second.route_id);
    // Same snapshot, so the recomputation lands on the same path.
    assert_eq!(first.path, second.path);
}

#[test]
fn test_feedback_loop_evolves_trust_and_replaces_route() {
    let mesh = TestMesh::new(&["alice", "bob"]);
    mesh.register_node("alice", "10.0.0.1:4600", BERLIN, false);
    let dst = mesh.register_node("bob", "10.0.0.2:4600", PARIS, false);
    let baseline_trust = mesh.store.get_node(&dst.node_id).unwrap().unwrap().trust_score;

    let route = mesh
        .selector
        .find_optimal_route("alice", "bob", "video", false)
        .unwrap();

    // Sustained failures: EMA 1.0 -> 0.8 -> 0.64 -> 0.512 -> 0.4096.
    for _ in 0..4 {
        mesh.selector
            .report_route_performance(&route.route_id, 250.0, 15.0, false)
            .unwrap();
    }

    let stored = mesh.store.get_route(&route.route_id).unwrap().unwrap();
    assert!(!stored.is_active);
    assert_eq!(stored.usage_count, 4);

    // Path nodes lost reputation, and trust followed.
    let node = mesh.store.get_node(&dst.node_id).unwrap().unwrap();
    assert!(node.reputation_score < 50.0);
    assert!(node.trust_score < baseline_trust);

    // The dead route is not served again.
    let replacement = mesh
        .selector
        .find_optimal_route("alice", "bob", "video", false)
        .unwrap();
    assert_ne!(replacement.route_id, route.route_id);
    assert!(replacement.is_active);
}

#[test]
fn test_require_aic_end_to_end() {
    let mesh = TestMesh::new(&["alice", "bob"]);
    mesh.register_node("alice", "10.0.0.1:4600", BERLIN, true);
    mesh.register_node("bob", "10.0.0.2:4600", PARIS, false);
    let aic_dst = mesh.register_node("bob", "10.0.0.3:4600", FRANKFURT, true);

    let route = mesh
        .selector
        .find_optimal_route("alice", "bob", "video", true)
        .unwrap();
    assert_eq!(route.path, vec![aic_dst.node_id]);
    assert!(route.supports_aic);
}

#[test]
fn test_offline_nodes_leave_the_candidate_pool() {
    let mesh = TestMesh::new(&["alice", "bob"]);
    let src = mesh.register_node("alice", "10.0.0.1:4600", BERLIN, false);
    mesh.register_node("bob", "10.0.0.2:4600", PARIS, false);

    // Only the source node goes stale; the scan takes it offline.
    thread::sleep(Duration::from_millis(40));
    mesh.registry
        .heartbeat(
            &mesh.store.active_nodes_for_identity("bob").unwrap()[0].node_id,
            &HeartbeatMetrics {
                current_connections: 0,
                bandwidth_usage_mbps: 0.0,
                avg_latency_ms: 20.0,
                packet_loss_rate: 0.0,
            },
        )
        .unwrap();
    let marked = mesh
        .registry
        .mark_offline_stale(Duration::from_millis(20))
        .unwrap();
    assert_eq!(marked, 1);
    let offline = mesh.registry.node(&src.node_id).unwrap().unwrap();
    assert_eq!(offline.status, loomnet_domain::NodeStatus::Offline);

    let err = mesh
        .selector
        .find_optimal_route("alice", "bob", "audio", false)
        .unwrap_err();
    assert!(matches!(err, Error::NoRouteAvailable { .. }));
}
