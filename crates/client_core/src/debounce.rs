//! Trailing-edge debouncing of field input.

use std::time::Duration;

use tokio::{task::JoinHandle, time::Instant};
use tracing::trace;

/// Owns the single pending-timer slot of one field.
///
/// Every [`schedule`](Self::schedule) replaces the previous timer, so a burst of
/// calls closer together than `delay` produces exactly one `on_fire`, carrying
/// the last value. Dropping the controller cancels the armed timer.
#[derive(Debug, Default)]
pub struct DebounceController {
    pending: Option<JoinHandle<()>>,
}

impl DebounceController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels any armed timer, then arms a new one for `value`.
    ///
    /// A zero `delay` does not arm a real timer: `on_fire` runs on the next
    /// scheduler turn, never inside this call. `on_fire` is synchronous; work it
    /// spawns is not cancelled by a later [`cancel`](Self::cancel).
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<T, F>(&mut self, value: T, delay: Duration, on_fire: F)
    where
        T: Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        self.cancel();
        let task = if delay.is_zero() {
            tokio::spawn(async move { on_fire(value) })
        } else {
            let deadline = Instant::now() + delay;
            tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                on_fire(value);
            })
        };
        trace!(delay_ms = delay.as_millis() as u64, "debounce: timer armed");
        self.pending = Some(task);
    }

    /// Clears the armed timer, if any. Safe to call when idle.
    pub fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            if !task.is_finished() {
                trace!("debounce: timer cancelled");
            }
            task.abort();
        }
    }

    /// Whether a timer is armed and has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for DebounceController {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[path = "tests/debounce_tests.rs"]
mod tests;
