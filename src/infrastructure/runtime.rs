//! Scheduling primitives: sleeping, spawning detached tasks and bounded
//! retries. Injected everywhere so tests can drive them deterministically.

use crate::domain::logging::{LogComponent, get_logger};
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Suspends the current task for a duration.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// Runs a detached task on the local (single-threaded) executor.
pub trait TaskSpawner {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);
}

/// Browser timer based sleeper.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct GlooSleeper;

#[cfg(target_arch = "wasm32")]
impl Sleeper for GlooSleeper {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        use futures::FutureExt;
        gloo_timers::future::sleep(duration).boxed_local()
    }
}

/// Spawns onto the browser microtask queue.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct WasmSpawner;

#[cfg(target_arch = "wasm32")]
impl TaskSpawner for WasmSpawner {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

impl TaskSpawner for futures::executor::LocalSpawner {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        use futures::task::LocalSpawnExt;
        if let Err(e) = self.spawn_local(task) {
            get_logger().error(
                LogComponent::Infrastructure("Runtime"),
                &format!("Failed to spawn task: {e}"),
            );
        }
    }
}

/// Bounded retry with linear backoff: the wait after attempt `n` is
/// `n * base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 100,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
        }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Runs `operation` until it succeeds or `policy.max_attempts` is reached.
///
/// `operation` receives the 1-based attempt number. The last error is
/// returned unchanged.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: RetryPolicy,
    sleeper: &dyn Sleeper,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                get_logger().warn(
                    LogComponent::Infrastructure("Retry"),
                    &format!(
                        "Attempt {attempt}/{max_attempts} failed: {e}; retrying in {}ms",
                        delay.as_millis()
                    ),
                );
                sleeper.sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
