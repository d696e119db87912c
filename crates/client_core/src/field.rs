//! A single form input: raw value, validators, debounce and published verdict.

use std::{
    pin::pin,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
    time::Duration,
};

use shared::domain::ValidationState;
use tokio::sync::Notify;
use tracing::debug;

use crate::{
    debounce::DebounceController,
    observable::{Observable, SubscriptionId},
    validation::{Validator, ValidatorPipeline},
};

struct FieldState {
    value: String,
    pipeline: ValidatorPipeline,
    debounce: DebounceController,
}

struct FieldInner {
    delay: Duration,
    generation: AtomicU64,
    applied: AtomicU64,
    torn_down: AtomicBool,
    state: Mutex<FieldState>,
    validation: Observable<ValidationState>,
    settled: Notify,
}

impl FieldInner {
    fn state(&self) -> MutexGuard<'_, FieldState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self, generation: u64) -> bool {
        !self.torn_down.load(Ordering::SeqCst)
            && self.generation.load(Ordering::SeqCst) == generation
    }

    /// Publishes a pipeline result unless a newer generation exists.
    fn apply(&self, generation: u64, result: ValidationState) -> bool {
        let published = self.validation.set_if(result, |_| {
            if self.current(generation) {
                self.applied.store(generation, Ordering::SeqCst);
                true
            } else {
                false
            }
        });
        if published {
            self.settled.notify_waiters();
        } else {
            debug!(
                generation,
                current = self.generation.load(Ordering::SeqCst),
                "validation: dropping stale result"
            );
        }
        published
    }
}

/// One input field.
///
/// Every [`input`](Self::input) bumps the generation and re-arms the field's
/// debounce timer. A pipeline run publishes its verdict only while its
/// generation is still the newest, so a slow check for an old value can never
/// overwrite a newer one. Clones share the same field.
#[derive(Clone)]
pub struct Field {
    inner: Arc<FieldInner>,
}

impl Field {
    pub fn new(validators: impl IntoIterator<Item = Validator>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(FieldInner {
                delay,
                generation: AtomicU64::new(0),
                applied: AtomicU64::new(0),
                torn_down: AtomicBool::new(false),
                state: Mutex::new(FieldState {
                    value: String::new(),
                    pipeline: ValidatorPipeline::new(validators),
                    debounce: DebounceController::new(),
                }),
                validation: Observable::new(ValidationState::Unknown),
                settled: Notify::new(),
            }),
        }
    }

    pub fn value(&self) -> String {
        self.inner.state().value.clone()
    }

    pub fn validation(&self) -> ValidationState {
        self.inner.validation.get()
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    pub fn subscribe(
        &self,
        subscriber: impl Fn(&ValidationState) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner.validation.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.validation.unsubscribe(id)
    }

    /// Records a keystroke and schedules validation of the new value.
    ///
    /// With a non-zero delay the field reads `Unknown` until the debounced run
    /// settles. Ignored after [`teardown`](Self::teardown). Must be called from
    /// within a tokio runtime.
    pub fn input(&self, value: impl Into<String>) {
        if self.inner.torn_down.load(Ordering::SeqCst) {
            return;
        }
        let value = value.into();
        let delay = self.inner.delay;

        let generation = {
            let mut state = self.inner.state();
            state.value.clone_from(&value);
            self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        // `Unknown` must land before the run can be armed, so a fast run is
        // never overwritten by it.
        if !delay.is_zero() {
            self.inner
                .validation
                .set_if(ValidationState::Unknown, |_| self.inner.current(generation));
        }

        let mut state = self.inner.state();
        if !self.inner.current(generation) {
            return;
        }
        let pipeline = state.pipeline.clone();
        let field = Arc::downgrade(&self.inner);
        state.debounce.schedule(value, delay, move |value| {
            spawn_run(field, pipeline, value, generation);
        });
    }

    /// Validates the current value right away, skipping the debounce.
    ///
    /// Supersedes any armed timer and any run still in flight. Returns the
    /// verdict the field holds afterwards.
    pub async fn validate_now(&self) -> ValidationState {
        if self.inner.torn_down.load(Ordering::SeqCst) {
            return self.validation();
        }
        let (value, pipeline, generation) = {
            let mut state = self.inner.state();
            state.debounce.cancel();
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            (state.value.clone(), state.pipeline.clone(), generation)
        };

        let result = pipeline.run(&value).await;
        self.inner.apply(generation, result);
        self.validation()
    }

    /// Replaces the validators. The next input or
    /// [`validate_now`](Self::validate_now) uses the new set.
    pub fn set_validators(&self, validators: impl IntoIterator<Item = Validator>) {
        self.inner.state().pipeline = ValidatorPipeline::new(validators);
    }

    /// Waits until the newest generation has published its verdict.
    ///
    /// Returns immediately for a field that was never edited or was torn down.
    pub async fn settled(&self) -> ValidationState {
        loop {
            let mut notified = pin!(self.inner.settled.notified());
            notified.as_mut().enable();
            let generation = self.inner.generation.load(Ordering::SeqCst);
            if self.inner.torn_down.load(Ordering::SeqCst)
                || self.inner.applied.load(Ordering::SeqCst) == generation
            {
                return self.validation();
            }
            notified.await;
        }
    }

    /// Cancels the armed timer and discards every in-flight run.
    ///
    /// Nothing is published after this returns.
    pub fn teardown(&self) {
        if self.inner.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.state().debounce.cancel();
        self.inner.settled.notify_waiters();
        debug!("validation: field torn down");
    }
}

fn spawn_run(field: Weak<FieldInner>, pipeline: ValidatorPipeline, value: String, generation: u64) {
    tokio::spawn(async move {
        let result = pipeline.run(&value).await;
        match field.upgrade() {
            Some(field) => {
                field.apply(generation, result);
            }
            None => debug!(generation, "validation: field dropped before result"),
        }
    });
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("value", &self.value())
            .field("validation", &self.validation())
            .field("generation", &self.generation())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/field_tests.rs"]
mod tests;
