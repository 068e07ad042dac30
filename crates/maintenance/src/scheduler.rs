//! Maintenance task execution and reporting.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use loomnet_core::config::Config;
use loomnet_core::error::Result;
use loomnet_core::time::now_ms;
use loomnet_store::Store;

/// The maintenance tasks, in their canonical execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Expire pending verifications past their deadline.
    ExpireVerifications,
    /// Delete route-cache entries past their expiry.
    EvictRouteCache,
    /// Expire unacknowledged notifications past their deadline.
    ExpireNotifications,
    /// Mark active nodes with stale heartbeats offline.
    MarkStaleNodes,
}

impl Task {
    /// Every task, in execution order.
    pub const ALL: [Task; 4] = [
        Task::ExpireVerifications,
        Task::EvictRouteCache,
        Task::ExpireNotifications,
        Task::MarkStaleNodes,
    ];

    /// Stable task name used in reports and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Task::ExpireVerifications => "expire_verifications",
            Task::EvictRouteCache => "evict_route_cache",
            Task::ExpireNotifications => "expire_notifications",
            Task::MarkStaleNodes => "mark_stale_nodes",
        }
    }
}

/// Outcome of one maintenance task.
#[derive(Debug, Clone)]
pub struct TaskReport {
    /// Task name.
    pub task: &'static str,
    /// Rows affected by the sweep.
    pub items_processed: usize,
    /// Wall-clock duration of the sweep.
    pub duration_ms: u64,
    /// Captured failure, if the task errored. Other tasks still run.
    pub error: Option<String>,
}

/// Runs the maintenance sweeps against the shared store.
#[derive(Clone)]
pub struct MaintenanceScheduler {
    store: Store,
    offline_threshold: Duration,
    task_budget: Duration,
}

impl MaintenanceScheduler {
    /// Create a scheduler over the shared store.
    pub fn new(store: Store, config: &Config) -> Self {
        Self {
            store,
            offline_threshold: config.registry.offline_threshold(),
            task_budget: config.maintenance.task_budget(),
        }
    }

    /// Run every task in order, capture-and-continue: one task's failure
    /// never blocks the rest.
    pub fn run_all(&self) -> Vec<TaskReport> {
        Task::ALL.iter().map(|task| self.run(*task)).collect()
    }

    /// Run a single task and report it.
    pub fn run(&self, task: Task) -> TaskReport {
        let started = Instant::now();
        let outcome = self.execute(task);
        let duration = started.elapsed();

        if duration > self.task_budget {
            warn!(
                task = task.name(),
                duration_ms = duration.as_millis() as u64,
                budget_ms = self.task_budget.as_millis() as u64,
                "maintenance task exceeded its budget"
            );
        }

        let report = match outcome {
            Ok(items_processed) => TaskReport {
                task: task.name(),
                items_processed,
                duration_ms: duration.as_millis() as u64,
                error: None,
            },
            Err(e) => TaskReport {
                task: task.name(),
                items_processed: 0,
                duration_ms: duration.as_millis() as u64,
                error: Some(e.to_string()),
            },
        };
        match &report.error {
            None => info!(
                task = report.task,
                items = report.items_processed,
                duration_ms = report.duration_ms,
                "maintenance task finished"
            ),
            Some(error) => warn!(task = report.task, error = %error, "maintenance task failed"),
        }
        report
    }

    fn execute(&self, task: Task) -> Result<usize> {
        let now = now_ms();
        match task {
            Task::ExpireVerifications => self.store.expire_pending_verifications(now),
            Task::EvictRouteCache => self.store.evict_expired_cache(now),
            Task::ExpireNotifications => self.store.expire_notifications(now),
            Task::MarkStaleNodes => {
                let cutoff = now - self.offline_threshold.as_millis() as i64;
                self.store.mark_offline_stale(cutoff)
            }
        }
    }
}
