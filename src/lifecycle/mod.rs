//! Call lifecycle primitives.
//!
//! # Data Flow
//! ```text
//! caller creates CancelToken (cancel.rs)
//!     → passed down through CallOptions
//!     → orchestrator / adapters / unlock loop race each await against it
//!
//! retry loops suspend through Clock (clock.rs)
//!     → TokioClock in production, a manual clock in tests
//! ```

pub mod cancel;
pub mod clock;

pub use cancel::CancelToken;
pub use clock::{Clock, TokioClock};
