//! Loomnet Mesh - Route optimization across peer nodes
//!
//! Selects the best path (direct or relayed, 1-3 hops) between two network
//! identities, weighing latency, bandwidth, trust, hop count, AIC
//! capability, and uptime.
//!
//! # Core Components
//!
//! - **Node Registry**: Mesh-node lifecycle - registration, heartbeat
//!   ingestion, offline detection
//! - **Route Cache**: TTL-bounded store of previously computed routes
//! - **Route Selector**: Candidate construction, weighted scoring, and
//!   performance feedback
//!
//! # Design Principles
//!
//! 1. **Estimates, not probes**: selection reasons only from stored
//!    telemetry; the hot path never blocks on peer availability
//! 2. **Atomic writes**: every mutation is a conditional update, so racing
//!    heartbeats, scans, and recomputes compose by last-writer-wins
//! 3. **Best-effort connectivity**: capacity shortage degrades the
//!    candidate pool instead of failing the request
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use loomnet_core::Config;
//! use loomnet_mesh::RouteSelector;
//! use loomnet_store::Store;
//!
//! # fn main() -> loomnet_core::Result<()> {
//! let store = Store::open("loomnet.db")?;
//! let selector = RouteSelector::new(store, &Config::default_config());
//!
//! let route = selector.find_optimal_route("alice", "bob", "audio", false)?;
//! println!("selected path: {:?}", route.path);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod geo;
pub mod registry;
pub mod score;
pub mod selector;

pub use cache::RouteCache;
pub use registry::NodeRegistry;
pub use score::{score_candidate, CandidateMetrics};
pub use selector::RouteSelector;
