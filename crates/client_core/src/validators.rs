//! Ready-made validators for credential forms.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::ValidationState,
    protocol::{PasswordValidation, UsernameValidation},
};
use tracing::debug;

use crate::{
    bridge::CommandBridge,
    field::Field,
    observable::Observable,
    validation::{validator_fn, Validate, Validator},
};

/// Checks the character count against optional inclusive bounds.
pub fn length_validator(min: impl Into<Option<usize>>, max: impl Into<Option<usize>>) -> Validator {
    let (min, max) = (min.into(), max.into());
    validator_fn(move |value: String| async move {
        let length = value.chars().count();
        let too_short = min.is_some_and(|min| length < min);
        let too_long = max.is_some_and(|max| length > max);
        Ok(ValidationState::from_bool(!too_short && !too_long))
    })
}

/// Rejects any value in `excluded`.
pub fn exclusion_validator<S: Into<String>>(excluded: impl IntoIterator<Item = S>) -> Validator {
    let excluded: Arc<[String]> = excluded.into_iter().map(Into::into).collect();
    validator_fn(move |value: String| {
        let excluded = Arc::clone(&excluded);
        async move { Ok(ValidationState::from_bool(!excluded.contains(&value))) }
    })
}

struct UserExists {
    bridge: Arc<dyn CommandBridge>,
    expected: bool,
}

#[async_trait]
impl Validate for UserExists {
    async fn validate(&self, value: &str) -> Result<ValidationState> {
        let exists = self.bridge.user_exists(value).await?;
        Ok(ValidationState::from_bool(exists == self.expected))
    }
}

pub fn user_exists_validator(bridge: Arc<dyn CommandBridge>) -> Validator {
    Validator::plain(UserExists {
        bridge,
        expected: true,
    })
}

pub fn user_does_not_exist_validator(bridge: Arc<dyn CommandBridge>) -> Validator {
    Validator::plain(UserExists {
        bridge,
        expected: false,
    })
}

/// Publishes only the answer to the most recent check, so a slow reply for
/// an old value cannot replace a newer one.
struct LatestHint<T> {
    hints: Observable<Option<T>>,
    issued: AtomicU64,
}

impl<T: Clone + Send + 'static> LatestHint<T> {
    fn new(hints: Observable<Option<T>>) -> Self {
        Self {
            hints,
            issued: AtomicU64::new(0),
        }
    }

    fn ticket(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn publish(&self, ticket: u64, hint: T) {
        let published = self
            .hints
            .set_if(Some(hint), |_| self.issued.load(Ordering::SeqCst) == ticket);
        if !published {
            debug!(ticket, "validation: dropping superseded hint");
        }
    }
}

struct UsernameAvailable {
    bridge: Arc<dyn CommandBridge>,
    hint: LatestHint<bool>,
}

#[async_trait]
impl Validate for UsernameAvailable {
    async fn validate(&self, value: &str) -> Result<ValidationState> {
        let ticket = self.hint.ticket();
        let available = !self.bridge.user_exists(value).await?;
        self.hint.publish(ticket, available);
        Ok(ValidationState::from_bool(available))
    }
}

/// Like [`user_does_not_exist_validator`], also publishing whether the name
/// was free to `available`.
pub fn username_available_validator(
    bridge: Arc<dyn CommandBridge>,
    available: Observable<Option<bool>>,
) -> Validator {
    Validator::plain(UsernameAvailable {
        bridge,
        hint: LatestHint::new(available),
    })
}

struct UsernameRules {
    bridge: Arc<dyn CommandBridge>,
    hint: LatestHint<UsernameValidation>,
}

#[async_trait]
impl Validate for UsernameRules {
    async fn validate(&self, value: &str) -> Result<ValidationState> {
        let ticket = self.hint.ticket();
        let validation = self.bridge.validate_username(value).await?;
        debug!(?validation, "validation: username rules checked");
        self.hint.publish(ticket, validation);
        Ok(ValidationState::from_bool(validation.is_valid()))
    }
}

/// Asks the bridge for the username rules and publishes the criteria to `hints`.
pub fn username_rules_validator(
    bridge: Arc<dyn CommandBridge>,
    hints: Observable<Option<UsernameValidation>>,
) -> Validator {
    Validator::plain(UsernameRules {
        bridge,
        hint: LatestHint::new(hints),
    })
}

struct PasswordRules {
    bridge: Arc<dyn CommandBridge>,
    hint: LatestHint<PasswordValidation>,
}

#[async_trait]
impl Validate for PasswordRules {
    async fn validate(&self, value: &str) -> Result<ValidationState> {
        let ticket = self.hint.ticket();
        let validation = self.bridge.validate_password(value).await?;
        self.hint.publish(ticket, validation);
        Ok(ValidationState::from_bool(validation.is_valid()))
    }
}

/// Like [`username_rules_validator`], for passwords.
pub fn password_rules_validator(
    bridge: Arc<dyn CommandBridge>,
    hints: Observable<Option<PasswordValidation>>,
) -> Validator {
    Validator::plain(PasswordRules {
        bridge,
        hint: LatestHint::new(hints),
    })
}

/// Valid when the value equals `other`'s current value.
///
/// An empty value is `Unknown` so an untouched confirmation box is not shown
/// as a mismatch.
pub fn matches_validator(other: Field) -> Validator {
    validator_fn(move |value: String| {
        let expected = other.value();
        async move {
            if value.is_empty() {
                Ok(ValidationState::Unknown)
            } else {
                Ok(ValidationState::from_bool(value == expected))
            }
        }
    })
}

#[cfg(test)]
#[path = "tests/validators_tests.rs"]
mod tests;
