//! Synchronization building blocks shared by both directions.
//!
//! - [`barrier`]: reconfiguration barrier between streaming calls and setup
//! - [`park`]: pluggable wait/signal primitive the barrier suspends on
//! - [`section`]: short interrupt-safe critical section for the transmit
//!   ring's fill count

pub mod barrier;
pub mod park;
pub mod section;

pub use barrier::{BarrierState, ReconfigBarrier, ReconfigureGuard, StreamGuard};
pub use park::{DefaultParker, Parker, SpinParker};
pub use section::{CriticalSection, DefaultSection, SpinSection};

#[cfg(feature = "std")]
pub use park::ThreadParker;
#[cfg(feature = "std")]
pub use section::MutexSection;
