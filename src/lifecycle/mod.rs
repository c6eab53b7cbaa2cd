//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT / SIGTERM → resolve wait_for_signal
//!
//! Shutdown (shutdown.rs):
//!     trigger → sweeper, admin server and daemon loop observe it → exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
