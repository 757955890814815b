//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → background loops stop → tracker unwatches → subscriptions disposed
//! ```
//!
//! # Design Decisions
//! - One broadcast channel reaches every background loop
//! - No deadline: disposal is synchronous, so shutdown cannot hang on it

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
