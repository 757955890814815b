//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and gauges via the `metrics` facade)
//!
//! Consumers:
//!     → stdout/stderr (fmt layer, filtered by RUST_LOG or config)
//!     → whatever metrics recorder the embedding shell installs
//! ```
//!
//! # Design Decisions
//! - Structured fields, never interpolated secrets
//! - Logging is never the only surface of a failure; errors are returned
//! - Without an installed recorder, metric updates are no-ops

pub mod logging;
pub mod metrics;
