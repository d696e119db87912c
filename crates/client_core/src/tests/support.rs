//! Scriptable CommandBridge for unit tests.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::UserId,
    protocol::{
        CreateUserResult, LoginResult, MyInfoResult, PasswordValidation, UsernameValidation,
        VerifyTokenResult,
    },
};
use tokio::sync::Mutex;

use crate::{
    bridge::CommandBridge,
    credentials::{validate_password, validate_username},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Calls {
    pub verify_token: usize,
    pub my_info: usize,
    pub user_exists: usize,
    pub validate_username: usize,
    pub validate_password: usize,
    pub login: usize,
    pub create_user: usize,
}

/// `None` in `verify` or `info` makes that call fail like a dropped connection.
/// A successful login or registration makes later `verify_token` calls
/// authorized. Checks for the value in `slow` take the extra delay.
pub(crate) struct FakeBridge {
    pub verify: Option<VerifyTokenResult>,
    pub info: Option<MyInfoResult>,
    pub existing: Vec<String>,
    pub lookup_fails: bool,
    pub login_result: LoginResult,
    pub create_result: CreateUserResult,
    pub latency: Duration,
    pub slow: Option<(String, Duration)>,
    pub logged_in: AtomicBool,
    pub calls: Mutex<Calls>,
    pub submitted: Mutex<Vec<(String, String)>>,
}

impl Default for FakeBridge {
    fn default() -> Self {
        Self {
            verify: Some(VerifyTokenResult::NotLoggedIn),
            info: Some(MyInfoResult::Failure),
            existing: Vec::new(),
            lookup_fails: false,
            login_result: LoginResult::Unauthorized,
            create_result: CreateUserResult::UsernameAlreadyExists,
            latency: Duration::ZERO,
            slow: None,
            logged_in: AtomicBool::new(false),
            calls: Mutex::new(Calls::default()),
            submitted: Mutex::new(Vec::new()),
        }
    }
}

impl FakeBridge {
    pub fn authorized(id: i64, username: &str) -> Self {
        Self {
            verify: Some(VerifyTokenResult::Authorized),
            info: Some(MyInfoResult::Success {
                id: UserId(id),
                username: username.to_string(),
            }),
            ..Self::default()
        }
    }

    pub fn with_users(users: &[&str]) -> Self {
        Self {
            existing: users.iter().map(|user| user.to_string()).collect(),
            ..Self::default()
        }
    }

    pub async fn calls(&self) -> Calls {
        *self.calls.lock().await
    }

    pub async fn submitted(&self) -> Vec<(String, String)> {
        self.submitted.lock().await.clone()
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    async fn lag(&self, value: &str) {
        if let Some((slow, delay)) = &self.slow {
            if slow == value {
                tokio::time::sleep(*delay).await;
            }
        }
    }
}

#[async_trait]
impl CommandBridge for FakeBridge {
    async fn verify_token(&self) -> Result<VerifyTokenResult> {
        self.calls.lock().await.verify_token += 1;
        self.pause().await;
        let verify = self.verify.ok_or_else(|| anyhow!("connection refused"))?;
        if self.logged_in.load(Ordering::SeqCst) {
            return Ok(VerifyTokenResult::Authorized);
        }
        Ok(verify)
    }

    async fn my_info(&self) -> Result<MyInfoResult> {
        self.calls.lock().await.my_info += 1;
        self.info.clone().ok_or_else(|| anyhow!("connection reset"))
    }

    async fn user_exists(&self, username: &str) -> Result<bool> {
        self.calls.lock().await.user_exists += 1;
        self.pause().await;
        self.lag(username).await;
        if self.lookup_fails {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.existing.iter().any(|existing| existing == username))
    }

    async fn validate_username(&self, username: &str) -> Result<UsernameValidation> {
        self.calls.lock().await.validate_username += 1;
        self.lag(username).await;
        Ok(validate_username(username))
    }

    async fn validate_password(&self, password: &str) -> Result<PasswordValidation> {
        self.calls.lock().await.validate_password += 1;
        self.lag(password).await;
        Ok(validate_password(password))
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResult> {
        self.calls.lock().await.login += 1;
        self.submitted
            .lock()
            .await
            .push((username.to_string(), password.to_string()));
        if self.login_result == LoginResult::Authorized {
            self.logged_in.store(true, Ordering::SeqCst);
        }
        Ok(self.login_result)
    }

    async fn create_user(&self, username: &str, password: &str) -> Result<CreateUserResult> {
        self.calls.lock().await.create_user += 1;
        self.submitted
            .lock()
            .await
            .push((username.to_string(), password.to_string()));
        if matches!(self.create_result, CreateUserResult::Success(_)) {
            self.logged_in.store(true, Ordering::SeqCst);
        }
        Ok(self.create_result.clone())
    }
}
