//! # Localvolts - 5-minute interval poller
//!
//! Polls the Localvolts customer interval API, tracks the newest finalized
//! 5-minute interval and keeps day-to-date and month-to-date cost totals.
//!
//! ## Architecture
//!
//! - `time`: UTC wire format, interval length and window starts
//! - `reading`: interval records and their quality marker
//! - `quality`: final-reading selection and cost summation
//! - `client`: windowed HTTP fetch with retry and response classification
//! - `tracker`: fetch-or-skip decision and elapsed-into-interval time
//! - `aggregate`: fault-isolated day and month cost totals
//! - `coordinator`: one update tick over an explicitly owned state
//! - `runtime`: fixed-period polling loop publishing snapshots
//! - `config`: YAML configuration with environment overrides
//! - `logging`: structured logging and tracing
//! - `error`: error taxonomy shared by all of the above

pub mod aggregate;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod quality;
pub mod reading;
pub mod runtime;
pub mod time;
pub mod tracker;

/// Build version, with the git SHA appended on nightly builds
pub const APP_VERSION: &str = env!("APP_VERSION");

// Re-export commonly used types
pub use client::{IntervalClient, IntervalSource};
pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorSnapshot, CoordinatorState};
pub use error::{LocalvoltsError, Result};
pub use reading::{IntervalReading, Quality};
pub use runtime::PollRuntime;
