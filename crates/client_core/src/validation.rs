//! Concurrent validator composition.

use std::{
    fmt,
    future::Future,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use futures::{future::join_all, FutureExt};
use shared::domain::ValidationState;
use tracing::{debug, warn};

/// One asynchronous check against a field value.
#[async_trait]
pub trait Validate: Send + Sync {
    async fn validate(&self, value: &str) -> Result<ValidationState>;
}

/// Adapts an async closure taking the owned value.
pub struct FnValidator<F>(F);

#[async_trait]
impl<F, Fut> Validate for FnValidator<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ValidationState>> + Send + 'static,
{
    async fn validate(&self, value: &str) -> Result<ValidationState> {
        (self.0)(value.to_string()).await
    }
}

pub fn validator_fn<F, Fut>(check: F) -> Validator
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ValidationState>> + Send + 'static,
{
    Validator::plain(FnValidator(check))
}

/// Receives a validator's own result, independent of the aggregate verdict.
pub type Effect = Arc<dyn Fn(ValidationState) + Send + Sync>;

#[derive(Clone)]
pub enum Validator {
    Plain(Arc<dyn Validate>),
    WithCallback(Arc<dyn Validate>, Effect),
}

impl Validator {
    pub fn plain(check: impl Validate + 'static) -> Self {
        Self::Plain(Arc::new(check))
    }

    pub fn with_callback(
        check: impl Validate + 'static,
        effect: impl Fn(ValidationState) + Send + Sync + 'static,
    ) -> Self {
        Self::WithCallback(Arc::new(check), Arc::new(effect))
    }

    /// Attaches `effect`, replacing any callback already present.
    pub fn with_effect(self, effect: impl Fn(ValidationState) + Send + Sync + 'static) -> Self {
        let check = match self {
            Self::Plain(check) | Self::WithCallback(check, _) => check,
        };
        Self::WithCallback(check, Arc::new(effect))
    }

    fn normalized(&self) -> (Arc<dyn Validate>, Effect) {
        match self {
            Self::Plain(check) => {
                let noop: Effect = Arc::new(|_: ValidationState| {});
                (Arc::clone(check), noop)
            }
            Self::WithCallback(check, effect) => (Arc::clone(check), Arc::clone(effect)),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Validator::Plain"),
            Self::WithCallback(_, _) => f.write_str("Validator::WithCallback"),
        }
    }
}

/// Runs every validator concurrently and reduces their verdicts.
///
/// An absent or empty list is `Valid`. Otherwise any `Invalid` wins, then any
/// `Unknown`, regardless of completion order. A validator that errors or panics
/// counts as `Invalid` without disturbing its siblings, and its callback is
/// skipped. Callbacks of the others fire as each one settles. A panicking
/// callback is logged and leaves the validator's own verdict in place.
pub async fn run_validators(value: &str, validators: Option<&[Validator]>) -> ValidationState {
    let Some(validators) = validators.filter(|validators| !validators.is_empty()) else {
        return ValidationState::Valid;
    };

    let checks = validators.iter().enumerate().map(|(index, validator)| {
        let (check, effect) = validator.normalized();
        async move {
            match AssertUnwindSafe(check.validate(value)).catch_unwind().await {
                Ok(Ok(state)) => {
                    if panic::catch_unwind(AssertUnwindSafe(|| effect(state))).is_err() {
                        warn!(index, "validation: callback panicked");
                    }
                    state
                }
                Ok(Err(err)) => {
                    warn!(index, "validation: validator failed: {err:#}");
                    ValidationState::Invalid
                }
                Err(_) => {
                    warn!(index, "validation: validator panicked");
                    ValidationState::Invalid
                }
            }
        }
    });

    let aggregate = join_all(checks)
        .await
        .into_iter()
        .fold(ValidationState::Valid, ValidationState::combine);
    debug!(validators = validators.len(), %aggregate, "validation: pipeline settled");
    aggregate
}

/// An immutable, cheaply cloned set of validators.
#[derive(Clone)]
pub struct ValidatorPipeline {
    validators: Arc<[Validator]>,
}

impl Default for ValidatorPipeline {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl fmt::Debug for ValidatorPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.validators.iter()).finish()
    }
}

impl ValidatorPipeline {
    pub fn new(validators: impl IntoIterator<Item = Validator>) -> Self {
        Self {
            validators: validators.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub async fn run(&self, value: &str) -> ValidationState {
        run_validators(value, Some(&*self.validators)).await
    }
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
