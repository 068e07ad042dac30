//! Maintenance sweeps over realistic shared state.

use crate::test_utils::*;
use loomnet_core::time::now_ms;
use loomnet_core::Config;
use loomnet_domain::{
    HeartbeatMetrics, NodeStatus, Notification, NotificationStatus, VerificationMethod,
};
use loomnet_maintenance::{MaintenanceScheduler, Task};
use std::thread;
use std::time::Duration;

fn heartbeat() -> HeartbeatMetrics {
    HeartbeatMetrics {
        current_connections: 1,
        bandwidth_usage_mbps: 5.0,
        avg_latency_ms: 18.0,
        packet_loss_rate: 0.0,
    }
}

#[test]
fn test_full_cycle_over_live_state() {
    let mut config = Config::default_config();
    config.routing.cache_ttl_secs = 0;
    config.registry.offline_threshold_secs = 0;
    let mesh = TestMesh::with_config(&["alice", "bob"], config.clone());

    mesh.register_node("alice", "10.0.0.1:4600", BERLIN, false);
    mesh.register_node("bob", "10.0.0.2:4600", PARIS, false);

    // A route whose cache entry will be expired by the zero TTL.
    mesh.selector
        .find_optimal_route("alice", "bob", "audio", false)
        .unwrap();
    // An overdue verification and notification.
    mesh.engine
        .request_verification("alice", VerificationMethod::Document, now_ms() - 1_000)
        .unwrap();
    mesh.store
        .insert_notification(&Notification {
            notification_id: "nt-1".to_string(),
            identity: "bob".to_string(),
            kind: "welcome".to_string(),
            body: String::new(),
            status: NotificationStatus::Unread,
            created_at: now_ms() - 2_000,
            expires_at: now_ms() - 1_000,
        })
        .unwrap();

    thread::sleep(Duration::from_millis(15));
    let scheduler = MaintenanceScheduler::new(mesh.store.clone(), &config);
    let reports = scheduler.run_all();

    assert_eq!(reports.len(), 4);
    for report in &reports {
        assert!(report.error.is_none(), "task {} failed", report.task);
    }
    // One overdue verification, one expired cache entry, one stale
    // notification, and both nodes stale under the zero threshold.
    let items: Vec<(&str, usize)> = reports
        .iter()
        .map(|r| (r.task, r.items_processed))
        .collect();
    assert_eq!(
        items,
        vec![
            ("expire_verifications", 1),
            ("evict_route_cache", 1),
            ("expire_notifications", 1),
            ("mark_stale_nodes", 2),
        ]
    );

    let second = scheduler.run_all();
    for report in &second {
        assert_eq!(report.items_processed, 0, "rerun of {}", report.task);
    }
}

#[test]
fn test_heartbeat_keeps_node_alive_through_sweep() {
    let mut config = Config::default_config();
    config.registry.offline_threshold_secs = 0;
    let mesh = TestMesh::with_config(&["alice"], config.clone());
    let node = mesh.register_node("alice", "10.0.0.1:4600", BERLIN, false);

    thread::sleep(Duration::from_millis(20));

    // The heartbeat lands between sweep scheduling and execution; the
    // conditional update must leave the node active.
    mesh.registry.heartbeat(&node.node_id, &heartbeat()).unwrap();
    let scheduler = MaintenanceScheduler::new(mesh.store.clone(), &config);
    scheduler.run(Task::MarkStaleNodes);

    let stored = mesh.store.get_node(&node.node_id).unwrap().unwrap();
    assert_eq!(stored.status, NodeStatus::Active);
}

#[test]
fn test_sweeps_do_not_disturb_live_entries() {
    let config = Config::default_config();
    let mesh = TestMesh::with_config(&["alice", "bob"], config.clone());
    mesh.register_node("alice", "10.0.0.1:4600", BERLIN, false);
    mesh.register_node("bob", "10.0.0.2:4600", PARIS, false);

    let route = mesh
        .selector
        .find_optimal_route("alice", "bob", "audio", false)
        .unwrap();
    mesh.engine
        .request_verification("alice", VerificationMethod::Email, now_ms() + 60_000)
        .unwrap();

    let scheduler = MaintenanceScheduler::new(mesh.store.clone(), &config);
    let reports = scheduler.run_all();
    for report in &reports {
        assert_eq!(report.items_processed, 0, "task {}", report.task);
    }

    // The cached route is still served afterwards.
    let cached = mesh.cache.get("alice", "bob").unwrap().unwrap();
    assert_eq!(cached.route_id, route.route_id);
}
