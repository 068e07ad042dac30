//! Loomnet maintenance node.
//!
//! Long-running service that opens the shared store and drives the
//! maintenance scheduler on a fixed interval. Each task runs on the
//! blocking pool under its own wall-clock budget, so a wedged sweep
//! cannot stall the loop or the tasks after it.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use loomnet_core::{logging, Config};
use loomnet_maintenance::{MaintenanceScheduler, Task};
use loomnet_store::Store;

const NODE_PROTOCOL_VERSION: u32 = 1;
const NODE_RUNTIME_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct NodeVersionHandshake {
    version: &'static str,
    runtime_version: u32,
    protocol_version: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--version-json") {
        let handshake = NodeVersionHandshake {
            version: env!("CARGO_PKG_VERSION"),
            runtime_version: NODE_RUNTIME_VERSION,
            protocol_version: NODE_PROTOCOL_VERSION,
        };
        println!("{}", serde_json::to_string(&handshake)?);
        return Ok(());
    }

    let config = match parse_config_path(&args)? {
        Some(path) => Config::from_file(path)?,
        None => Config::default_config(),
    };
    logging::init();

    let data_dir = PathBuf::from(&config.node.data_dir);
    std::fs::create_dir_all(&data_dir)?;
    let store = Store::open(data_dir.join("loomnet.db"))?;
    let scheduler = MaintenanceScheduler::new(store, &config);

    info!(
        node_id = %config.node.node_id,
        data_dir = %config.node.data_dir,
        interval_secs = config.node.maintenance_interval_secs,
        "loomnet node started"
    );

    let budget = config.maintenance.task_budget();
    let mut ticker =
        tokio::time::interval(Duration::from_secs(config.node.maintenance_interval_secs.max(1)));
    loop {
        ticker.tick().await;
        run_cycle(&scheduler, budget).await;
    }
}

/// Run one maintenance cycle, each task individually budgeted.
async fn run_cycle(scheduler: &MaintenanceScheduler, budget: Duration) {
    for task in Task::ALL {
        let scheduler = scheduler.clone();
        let handle = tokio::task::spawn_blocking(move || scheduler.run(task));
        match tokio::time::timeout(budget, handle).await {
            Ok(Ok(report)) => {
                if let Some(err) = report.error {
                    warn!(task = report.task, error = %err, "maintenance task failed");
                }
            }
            Ok(Err(join_err)) => error!(task = task.name(), error = %join_err, "task panicked"),
            Err(_) => warn!(
                task = task.name(),
                budget_ms = budget.as_millis() as u64,
                "task exceeded its budget, moving on"
            ),
        }
    }
}

fn parse_config_path(args: &[String]) -> anyhow::Result<Option<PathBuf>> {
    let mut args_iter = args.iter();
    while let Some(arg) = args_iter.next() {
        if arg == "--config" {
            if let Some(path) = args_iter.next() {
                return Ok(Some(PathBuf::from(path)));
            }
            anyhow::bail!("--config was provided without a path");
        }
    }
    Ok(None)
}
