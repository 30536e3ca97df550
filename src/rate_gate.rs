//! Request pacing shared across all concurrent tasks
//!
//! The RateGate enforces a minimum, jittered interval between any two
//! outbound calls to the media source, across every running task. It is
//! the process-wide request budget: one shared clock and one lock, never
//! one per task.

use rand::Rng;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Global pacing gate shared across all tasks
///
/// [`acquire`](Self::acquire) blocks the caller until at least
/// `min_delay + jitter` has elapsed since the last call admitted by
/// *any* caller, then records the new last-call time and returns.
///
/// The internal mutex is intentionally held across the pacing sleep:
/// admitting a call is a global critical section, and concurrent callers
/// must queue behind it rather than race the shared clock. The gate has
/// its own lock, deliberately decoupled from the task registry, so
/// pacing delays never block task reads.
#[derive(Clone)]
pub struct RateGate {
    last_call: std::sync::Arc<Mutex<Option<Instant>>>,
}

impl RateGate {
    /// Create a new gate; the first acquisition does not wait
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_call: std::sync::Arc::new(Mutex::new(None)),
        }
    }

    /// Wait until the pacing interval has elapsed, then claim the slot
    ///
    /// # Arguments
    ///
    /// * `min_delay` - Minimum interval since the previous admitted call
    /// * `jitter_min` / `jitter_max` - Bounds of the uniform random
    ///   offset added to `min_delay` on every wait
    pub async fn acquire(&self, min_delay: Duration, jitter_min: Duration, jitter_max: Duration) {
        let mut last_call = self.last_call.lock().await;

        if let Some(previous) = *last_call {
            let target = min_delay + random_jitter(jitter_min, jitter_max);
            let elapsed = previous.elapsed();
            if elapsed < target {
                tokio::time::sleep(target - elapsed).await;
            }
        }

        *last_call = Some(Instant::now());
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Uniform random duration in `min..=max` (empty range yields `min`)
pub(crate) fn random_jitter(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let mut rng = rand::thread_rng();
    let millis = rng.gen_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(millis)
}
