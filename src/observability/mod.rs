//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → whatever subscriber / recorder the host application installs
//! ```
//!
//! # Design Decisions
//! - The library never installs a subscriber or exporter; the binary does
//! - Request ID flows through every attempt of a call
//! - Metrics are cheap (atomic increments, no-op without a recorder)

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
