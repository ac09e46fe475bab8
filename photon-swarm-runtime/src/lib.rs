//! # PhotonSwarm Runtime
//!
//! Execution plumbing around the single-threaded optimization loop:
//! - [`dispatch::Dispatcher`]: sequential or worker-pool evaluation of one
//!   swarm batch
//! - [`StopSignal`]: cooperative cancellation checked at iteration boundaries
//! - [`Clock`]: time source for run time limits, with a mock for tests
//!
//! ## Feature Flags
//!
//! - `tokio` (default): ctrl-c bridge into a [`StopSignal`]

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub mod dispatch;

/// Monotonic time source
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary, fixed origin
    fn now_ms(&self) -> u64;
}

/// Wall clock measured from its creation
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Manually advanced clock for testing
#[derive(Debug, Default)]
pub struct MockClock {
    current_time_ms: AtomicU64,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the mock clock
    pub fn advance(&self, duration: Duration) {
        self.current_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_time_ms.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop at the next iteration boundary
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Trigger this signal when the process receives ctrl-c.
    #[cfg(feature = "tokio")]
    pub async fn trigger_on_ctrl_c(self) -> std::io::Result<()> {
        tokio::signal::ctrl_c().await?;
        tracing::warn!("ctrl-c received, stopping after the current iteration");
        self.trigger();
        Ok(())
    }
}
