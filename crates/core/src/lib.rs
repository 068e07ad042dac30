//! Loomnet core utilities.
//!
//! Shared foundation for the route-optimization and trust subsystem:
//! configuration loading, structured logging initialization, the common
//! error taxonomy, and clock helpers.

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use config::Config;
pub use error::{Error, Result};
