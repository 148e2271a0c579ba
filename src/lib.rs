//! # Charge APT - charging session aggregation and reporting
//!
//! Turns the raw stream of periodic power/energy samples recorded by a shared
//! EV charger into per-session measurements, calendar rollups and usage
//! analytics, and infers the live station status from a periodically polled
//! meter snapshot.
//!
//! ## Architecture
//!
//! - `sample`: tolerant decoding of the sample document
//! - `grouping`: keyed partitioning of samples
//! - `session`: per-session reduction (energy, duration, power, cost)
//! - `aggregate`: monthly, yearly and hour-of-day rollups
//! - `usage`: sample-window usage analytics
//! - `report`: composition of the views above
//! - `status`: live status inference from the meter snapshot
//! - `poller`: cancellable periodic task driving the status inference
//! - `source`: HTTP and file sources for samples and snapshots
//! - `web`: HTTP server and REST API
//! - `config`, `logging`, `error`: ambient plumbing

pub mod aggregate;
pub mod config;
pub mod error;
pub mod grouping;
pub mod logging;
pub mod poller;
pub mod report;
pub mod sample;
pub mod session;
pub mod source;
pub mod status;
pub mod usage;
pub mod web;

#[cfg(test)]
mod web_tests;

// Re-export commonly used types
pub use config::Config;
pub use error::{ChargeError, Result};
pub use report::{Report, ReportAssembler, ReportOptions};
pub use sample::{Sample, SampleBatch};
pub use session::SessionMeasurement;
pub use status::{LiveStatus, StationStatus};
