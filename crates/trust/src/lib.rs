//! Trust and reputation subsystem.
//!
//! Computes 0–100 composite trust scores for identities and nodes from
//! verification bonuses, behavioral telemetry, and abuse penalties, and
//! keeps the append-only reputation ledger those scores can be replayed
//! from. Scores evolve from three signal sources: verification events,
//! abuse reports, and live route-performance feedback.

pub mod engine;
pub mod events;
pub mod reports;

pub use engine::{TrustScoreEngine, ABUSE_REPORT_PENALTY, BASE_SCORE};
pub use events::{
    ReputationEventLog, MAX_SEVERITY, MIN_SEVERITY, ROUTE_FAILURE_DELTA, ROUTE_SUCCESS_DELTA,
};
pub use reports::{AbuseReportManager, NewAbuseReport, ReportResolution};
