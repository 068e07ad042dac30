//! Background maintenance for the routing and trust subsystem.
//!
//! Four independent, idempotent sweeps: expire overdue verifications,
//! evict expired route-cache entries, expire unacknowledged notifications,
//! and mark stale nodes offline. Each is a single conditional
//! update/delete, so the tasks are safe to run concurrently with live
//! traffic and safe to re-run after an interruption.

pub mod scheduler;

pub use scheduler::{MaintenanceScheduler, Task, TaskReport};
