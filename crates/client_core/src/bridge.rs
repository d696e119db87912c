//! Identity and credential operations the core consumes.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use shared::{
    domain::UserId,
    error::{ApiException, ErrorCode},
    protocol::{
        AuthenticationSuccessResponse, BadRequestBody, CreateUserResult, CredentialsRequest,
        LoginResult, MyInfoResult, PasswordValidation, UsernameRequest, UsernameValidation,
        VerifyTokenResult,
    },
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::credentials::{
    password_criteria, username_criteria, validate_password, validate_username,
};

#[async_trait]
pub trait CommandBridge: Send + Sync {
    async fn verify_token(&self) -> Result<VerifyTokenResult>;
    async fn my_info(&self) -> Result<MyInfoResult>;
    async fn user_exists(&self, username: &str) -> Result<bool>;
    async fn validate_username(&self, username: &str) -> Result<UsernameValidation>;
    async fn validate_password(&self, password: &str) -> Result<PasswordValidation>;
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult>;
    async fn create_user(&self, username: &str, password: &str) -> Result<CreateUserResult>;
}

pub struct MissingCommandBridge;

#[async_trait]
impl CommandBridge for MissingCommandBridge {
    async fn verify_token(&self) -> Result<VerifyTokenResult> {
        Err(anyhow!("command bridge is unavailable"))
    }

    async fn my_info(&self) -> Result<MyInfoResult> {
        Err(anyhow!("command bridge is unavailable"))
    }

    async fn user_exists(&self, username: &str) -> Result<bool> {
        Err(anyhow!(
            "command bridge is unavailable; cannot look up user {username}"
        ))
    }

    async fn validate_username(&self, _username: &str) -> Result<UsernameValidation> {
        Err(anyhow!("command bridge is unavailable"))
    }

    async fn validate_password(&self, _password: &str) -> Result<PasswordValidation> {
        Err(anyhow!("command bridge is unavailable"))
    }

    async fn login(&self, username: &str, _password: &str) -> Result<LoginResult> {
        Err(anyhow!("command bridge is unavailable; cannot log in {username}"))
    }

    async fn create_user(&self, username: &str, _password: &str) -> Result<CreateUserResult> {
        Err(anyhow!(
            "command bridge is unavailable; cannot create user {username}"
        ))
    }
}

#[derive(Debug, Default)]
struct BridgeSession {
    token: Option<String>,
    user_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    id: UserId,
    username: String,
}

/// CommandBridge backed by the HTTP API, holding the bearer token locally.
pub struct HttpCommandBridge {
    http: Client,
    api_url: String,
    session: Mutex<BridgeSession>,
}

impl HttpCommandBridge {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.into(),
            session: Mutex::new(BridgeSession::default()),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub async fn token(&self) -> Option<String> {
        self.session.lock().await.token.clone()
    }

    pub async fn user_id(&self) -> Option<UserId> {
        self.session.lock().await.user_id
    }

    pub async fn is_logged_in(&self) -> bool {
        self.session.lock().await.token.is_some()
    }

    /// Drops the local token and user id.
    pub async fn logout(&self) {
        let mut guard = self.session.lock().await;
        guard.token = None;
        guard.user_id = None;
    }

    async fn store_session(&self, response: &AuthenticationSuccessResponse) {
        let mut guard = self.session.lock().await;
        guard.token = Some(response.token.clone());
        guard.user_id = Some(response.id);
    }

    async fn bad_request_kind(response: reqwest::Response) -> Result<String> {
        let body: BadRequestBody = response
            .json()
            .await
            .map_err(|_| ApiException::new(ErrorCode::Internal, "malformed bad request body"))?;
        Ok(body.kind)
    }
}

fn unexpected_status(operation: &str, status: StatusCode) -> anyhow::Error {
    ApiException::new(
        ErrorCode::Internal,
        format!("unexpected server response to {operation}: {status}"),
    )
    .into()
}

#[async_trait]
impl CommandBridge for HttpCommandBridge {
    async fn verify_token(&self) -> Result<VerifyTokenResult> {
        let Some(token) = self.token().await else {
            return Ok(VerifyTokenResult::NotLoggedIn);
        };

        let response = self
            .http
            .get(self.endpoint("/auth/verify"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| ApiException::new(ErrorCode::Transport, err.to_string()))?;

        match response.status() {
            StatusCode::OK => Ok(VerifyTokenResult::Authorized),
            StatusCode::BAD_REQUEST => {
                Err(ApiException::new(ErrorCode::MalformedToken, "malformed token").into())
            }
            StatusCode::UNAUTHORIZED => {
                info!("bridge: token expired; dropping local session");
                self.logout().await;
                Ok(VerifyTokenResult::Expired)
            }
            other => Err(unexpected_status("verify_token", other)),
        }
    }

    async fn my_info(&self) -> Result<MyInfoResult> {
        let Some(token) = self.token().await else {
            return Ok(MyInfoResult::Failure);
        };

        let response = self
            .http
            .get(self.endpoint("/user/me"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| ApiException::new(ErrorCode::Transport, err.to_string()))?;

        match response.status() {
            StatusCode::OK => match response.json::<MeResponse>().await {
                Ok(me) => Ok(MyInfoResult::Success {
                    id: me.id,
                    username: me.username,
                }),
                Err(err) => {
                    warn!("bridge: malformed identity response: {err}");
                    Ok(MyInfoResult::Failure)
                }
            },
            StatusCode::BAD_REQUEST => {
                // the server no longer knows the token's user
                self.logout().await;
                Ok(MyInfoResult::Failure)
            }
            other => {
                debug!(status = %other, "bridge: identity lookup failed");
                Ok(MyInfoResult::Failure)
            }
        }
    }

    async fn user_exists(&self, username: &str) -> Result<bool> {
        if !validate_username(username).is_valid() {
            return Ok(false);
        }

        let response = self
            .http
            .get(self.endpoint("/user/getid"))
            .json(&UsernameRequest {
                username: username.to_string(),
            })
            .send()
            .await
            .map_err(|err| ApiException::new(ErrorCode::Transport, err.to_string()))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            other => Err(unexpected_status("user_exists", other)),
        }
    }

    async fn validate_username(&self, username: &str) -> Result<UsernameValidation> {
        Ok(validate_username(username))
    }

    async fn validate_password(&self, password: &str) -> Result<PasswordValidation> {
        Ok(validate_password(password))
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResult> {
        let response = self
            .http
            .get(self.endpoint("/auth/login"))
            .json(&CredentialsRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(|err| ApiException::new(ErrorCode::Transport, err.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body: AuthenticationSuccessResponse = response.json().await.map_err(|_| {
                    ApiException::new(ErrorCode::Internal, "malformed login response")
                })?;
                self.store_session(&body).await;
                info!(user_id = body.id.0, "bridge: logged in");
                Ok(LoginResult::Authorized)
            }
            StatusCode::UNAUTHORIZED => Ok(LoginResult::Unauthorized),
            StatusCode::BAD_REQUEST => match Self::bad_request_kind(response).await?.as_str() {
                "USER" => Ok(LoginResult::UserDoesNotExist),
                other => Err(ApiException::new(
                    ErrorCode::from_bad_request_kind(other),
                    format!("login rejected: {other}"),
                )
                .into()),
            },
            other => Err(unexpected_status("login", other)),
        }
    }

    async fn create_user(&self, username: &str, password: &str) -> Result<CreateUserResult> {
        if self.is_logged_in().await {
            return Ok(CreateUserResult::AlreadyLoggedIn);
        }

        let response = self
            .http
            .post(self.endpoint("/auth/create"))
            .json(&CredentialsRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(|err| ApiException::new(ErrorCode::Transport, err.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body: AuthenticationSuccessResponse = response.json().await.map_err(|_| {
                    ApiException::new(ErrorCode::Internal, "malformed create user response")
                })?;
                self.store_session(&body).await;
                info!(user_id = body.id.0, "bridge: user created");
                Ok(CreateUserResult::Success(body))
            }
            StatusCode::BAD_REQUEST => match Self::bad_request_kind(response).await?.as_str() {
                "USERALREADYEXISTS" | "DUPLICATE" => Ok(CreateUserResult::UsernameAlreadyExists),
                "USERNAME" => Ok(CreateUserResult::InvalidUsername(username_criteria(username))),
                "PASSWORD" => Ok(CreateUserResult::InvalidPassword(password_criteria(password))),
                other => Err(ApiException::new(
                    ErrorCode::from_bad_request_kind(other),
                    format!("create user rejected: {other}"),
                )
                .into()),
            },
            other => Err(unexpected_status("create_user", other)),
        }
    }
}

#[cfg(test)]
#[path = "tests/bridge_tests.rs"]
mod tests;
