//! Login and registration controllers built from [`Field`]s.

use std::{sync::Arc, time::Duration};

use shared::{
    domain::UserId,
    protocol::{
        CreateUserResult, LoginResult, PasswordCriteria, PasswordValidation, UsernameCriteria,
        UsernameValidation,
    },
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    auth_gate::{return_path, AuthGate, Navigator},
    bridge::CommandBridge,
    field::Field,
    observable::Observable,
    validators::{
        length_validator, matches_validator, password_rules_validator,
        username_available_validator, username_rules_validator,
    },
};

#[derive(Debug, Error)]
pub enum FormError {
    #[error("registration form has invalid or unchecked fields")]
    Incomplete,
    #[error(transparent)]
    Bridge(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authorized { target: String },
    Unauthorized,
    UserDoesNotExist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created { id: UserId, target: String },
    AlreadyLoggedIn,
    UsernameAlreadyExists,
    InvalidUsername(UsernameCriteria),
    InvalidPassword(PasswordCriteria),
}

pub struct LoginForm {
    bridge: Arc<dyn CommandBridge>,
    navigator: Arc<dyn Navigator>,
    gate: Option<Arc<AuthGate>>,
    redirect: Option<String>,
    username: Field,
    password: Field,
}

impl LoginForm {
    pub fn new(
        bridge: Arc<dyn CommandBridge>,
        navigator: Arc<dyn Navigator>,
        redirect: Option<String>,
    ) -> Self {
        Self {
            bridge,
            navigator,
            gate: None,
            redirect,
            username: Field::new([length_validator(4, 16)], Duration::ZERO),
            password: Field::new([length_validator(8, None)], Duration::ZERO),
        }
    }

    /// Forgets `gate`'s memoized verdict after a successful login, so the
    /// redirect target is checked again instead of bouncing back here.
    pub fn with_gate(mut self, gate: Arc<AuthGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn username(&self) -> &Field {
        &self.username
    }

    pub fn password(&self) -> &Field {
        &self.password
    }

    /// Validates both fields as they are, like a freshly opened form.
    pub async fn validate_all(&self) {
        futures::join!(self.username.validate_now(), self.password.validate_now());
    }

    pub fn can_submit(&self) -> bool {
        self.username.validation().is_valid() && self.password.validation().is_valid()
    }

    /// Sends the credentials whatever the field verdicts; the server decides.
    pub async fn submit(&self) -> Result<LoginOutcome, FormError> {
        let username = self.username.value();
        let result = self.bridge.login(&username, &self.password.value()).await?;
        match result {
            LoginResult::Authorized => {
                let target = return_path(self.redirect.as_deref());
                info!(%username, %target, "auth: login succeeded");
                if let Some(gate) = &self.gate {
                    gate.invalidate();
                }
                self.navigator.navigate(&target);
                Ok(LoginOutcome::Authorized { target })
            }
            LoginResult::Unauthorized => Ok(LoginOutcome::Unauthorized),
            LoginResult::UserDoesNotExist => Ok(LoginOutcome::UserDoesNotExist),
        }
    }

    pub fn teardown(&self) {
        self.username.teardown();
        self.password.teardown();
    }
}

pub struct RegisterForm {
    bridge: Arc<dyn CommandBridge>,
    navigator: Arc<dyn Navigator>,
    gate: Option<Arc<AuthGate>>,
    redirect: Option<String>,
    username: Field,
    password: Field,
    confirm: Field,
    username_hints: Observable<Option<UsernameValidation>>,
    username_unique: Observable<Option<bool>>,
    password_hints: Observable<Option<PasswordValidation>>,
}

impl RegisterForm {
    /// `cooldown` debounces the username and password checks; the
    /// confirmation is checked on every keystroke.
    pub fn new(
        bridge: Arc<dyn CommandBridge>,
        navigator: Arc<dyn Navigator>,
        redirect: Option<String>,
        cooldown: Duration,
    ) -> Self {
        let username_hints = Observable::new(None);
        let username_unique = Observable::new(None);
        let password_hints = Observable::new(None);

        let username = Field::new(
            [
                username_rules_validator(Arc::clone(&bridge), username_hints.clone()),
                username_available_validator(Arc::clone(&bridge), username_unique.clone()),
            ],
            cooldown,
        );
        let password = Field::new(
            [password_rules_validator(Arc::clone(&bridge), password_hints.clone())],
            cooldown,
        );
        let confirm = Field::new([matches_validator(password.clone())], Duration::ZERO);

        Self {
            bridge,
            navigator,
            gate: None,
            redirect,
            username,
            password,
            confirm,
            username_hints,
            username_unique,
            password_hints,
        }
    }

    pub fn username(&self) -> &Field {
        &self.username
    }

    pub fn password(&self) -> &Field {
        &self.password
    }

    /// See [`LoginForm::with_gate`].
    pub fn with_gate(mut self, gate: Arc<AuthGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn confirm(&self) -> &Field {
        &self.confirm
    }

    /// Last username criteria reported by the bridge, for hint rendering.
    pub fn username_hints(&self) -> &Observable<Option<UsernameValidation>> {
        &self.username_hints
    }

    /// Whether the last checked username was free; `None` until checked.
    pub fn username_unique(&self) -> &Observable<Option<bool>> {
        &self.username_unique
    }

    pub fn password_hints(&self) -> &Observable<Option<PasswordValidation>> {
        &self.password_hints
    }

    pub async fn validate_all(&self) {
        futures::join!(
            self.username.validate_now(),
            self.password.validate_now(),
            self.confirm.validate_now()
        );
    }

    /// All three fields valid, and the confirmation still equals the password.
    pub fn can_submit(&self) -> bool {
        self.username.validation().is_valid()
            && self.password.validation().is_valid()
            && self.confirm.validation().is_valid()
            && self.confirm.value() == self.password.value()
    }

    pub async fn submit(&self) -> Result<RegisterOutcome, FormError> {
        if !self.can_submit() {
            warn!("auth: registration refused, form incomplete");
            return Err(FormError::Incomplete);
        }

        let username = self.username.value();
        let result = self
            .bridge
            .create_user(&username, &self.password.value())
            .await?;
        let outcome = match result {
            CreateUserResult::Success(created) => {
                let target = return_path(self.redirect.as_deref());
                info!(%username, user_id = %created.id, "auth: account created");
                if let Some(gate) = &self.gate {
                    gate.invalidate();
                }
                self.navigator.navigate(&target);
                RegisterOutcome::Created {
                    id: created.id,
                    target,
                }
            }
            CreateUserResult::AlreadyLoggedIn => RegisterOutcome::AlreadyLoggedIn,
            CreateUserResult::UsernameAlreadyExists => RegisterOutcome::UsernameAlreadyExists,
            CreateUserResult::InvalidUsername(criteria) => {
                RegisterOutcome::InvalidUsername(criteria)
            }
            CreateUserResult::InvalidPassword(criteria) => {
                RegisterOutcome::InvalidPassword(criteria)
            }
        };
        Ok(outcome)
    }

    pub fn teardown(&self) {
        self.username.teardown();
        self.password.teardown();
        self.confirm.teardown();
    }
}

#[cfg(test)]
#[path = "tests/forms_tests.rs"]
mod tests;
