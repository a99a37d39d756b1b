//! Throttle/debounce limiter for bursty updates
//!
//! Ranging engines report samples many times per second. UI-facing state does
//! not need every one of them, so sample-driven publishing goes through a
//! [`Limiter`]:
//!
//! - **Throttle**: the first call runs right away (on its own task) and opens a
//!   cooldown. Calls during the cooldown are dropped.
//! - **Debounce**: every call restarts the deadline. Only the last call runs,
//!   one full duration after it was submitted.
//!
//! Each limiter owns its scheduled tasks. Superseded debounce tasks are aborted
//! explicitly, and dropping the limiter aborts whatever is still pending.
//! Tasks are spawned on the runtime [`Handle`] the limiter was built with, so
//! `submit` may be called from any thread.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

/// Coalescing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimiterPolicy {
    /// Run the first call, drop the rest until the cooldown ends
    Throttle,
    /// Run only the last call, after the duration elapses
    Debounce,
}

impl fmt::Display for LimiterPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Throttle => f.write_str("throttle"),
            Self::Debounce => f.write_str("debounce"),
        }
    }
}

#[derive(Default)]
struct Pending {
    /// End of the current throttle cooldown
    cooldown_until: Option<Instant>,
    /// Most recently scheduled operation
    operation: Option<JoinHandle<()>>,
}

/// Async throttle/debounce primitive
pub struct Limiter {
    policy: LimiterPolicy,
    duration: Duration,
    runtime: Handle,
    pending: Mutex<Pending>,
}

impl fmt::Debug for Limiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Limiter")
            .field("policy", &self.policy)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

impl Limiter {
    /// Create a limiter with the given policy and window, scheduling its
    /// work on `runtime`
    pub fn new(policy: LimiterPolicy, duration: Duration, runtime: Handle) -> Self {
        Self {
            policy,
            duration,
            runtime,
            pending: Mutex::new(Pending::default()),
        }
    }

    /// Throttling limiter
    pub fn throttle(duration: Duration, runtime: Handle) -> Self {
        Self::new(LimiterPolicy::Throttle, duration, runtime)
    }

    /// Debouncing limiter
    pub fn debounce(duration: Duration, runtime: Handle) -> Self {
        Self::new(LimiterPolicy::Debounce, duration, runtime)
    }

    /// Configured policy
    pub fn policy(&self) -> LimiterPolicy {
        self.policy
    }

    /// Configured window
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Submit an operation. Returns `false` if a throttle dropped it.
    pub fn submit<F>(&self, operation: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.policy {
            LimiterPolicy::Throttle => self.throttle_submit(operation),
            LimiterPolicy::Debounce => {
                self.debounce_submit(operation);
                true
            }
        }
    }

    /// Abort anything scheduled and reopen the throttle gate
    pub fn cancel(&self) {
        let mut pending = self.pending.lock();
        if let Some(task) = pending.operation.take() {
            task.abort();
        }
        pending.cooldown_until = None;
    }

    fn throttle_submit<F>(&self, operation: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let now = Instant::now();
        let mut pending = self.pending.lock();

        if let Some(until) = pending.cooldown_until {
            if now < until {
                trace!(policy = %self.policy, "Limiter dropped call during cooldown");
                return false;
            }
        }

        pending.cooldown_until = Some(now + self.duration);
        pending.operation = Some(self.runtime.spawn(operation));
        true
    }

    fn debounce_submit<F>(&self, operation: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let duration = self.duration;
        let mut pending = self.pending.lock();

        if let Some(previous) = pending.operation.take() {
            previous.abort();
            trace!(policy = %self.policy, "Limiter superseded pending call");
        }

        pending.operation = Some(self.runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            operation.await;
        }));
    }
}

impl Drop for Limiter {
    fn drop(&mut self) {
        if let Some(task) = self.pending.get_mut().operation.take() {
            task.abort();
        }
    }
}
