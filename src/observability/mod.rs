//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! providers / orchestrator / unlock loop / assembler produce:
//!     → tracing events with structured fields (provider, operation, error)
//!     → metrics.rs counters
//!
//! host process:
//!     → logging.rs installs the subscriber (EnvFilter + fmt, optional JSON)
//!     → installs its own metrics exporter, if any
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
