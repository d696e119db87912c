use serde::{Deserialize, Serialize};

use crate::domain::{AuthSession, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "result")]
pub enum VerifyTokenResult {
    #[serde(alias = "unauthorized")]
    NotLoggedIn,
    Authorized,
    Expired,
}

impl VerifyTokenResult {
    pub fn is_authorized(self) -> bool {
        self == Self::Authorized
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum MyInfoResult {
    Success { id: UserId, username: String },
    Failure,
}

impl MyInfoResult {
    pub fn into_session(self) -> Option<AuthSession> {
        match self {
            Self::Success { id, username } => Some(AuthSession { id, username }),
            Self::Failure => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameCriteria {
    pub length: bool,
    pub charset: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "result")]
pub enum UsernameValidation {
    Valid,
    Invalid(UsernameCriteria),
}

impl UsernameValidation {
    pub fn new(criteria: UsernameCriteria) -> Self {
        if criteria.length && criteria.charset {
            Self::Valid
        } else {
            Self::Invalid(criteria)
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordCriteria {
    pub charset: bool,
    pub length: bool,
    pub alpha: bool,
    pub digit: bool,
    pub upper: bool,
    pub lower: bool,
    pub special: bool,
}

impl PasswordCriteria {
    fn all_met(&self) -> bool {
        self.charset
            && self.length
            && self.alpha
            && self.digit
            && self.upper
            && self.lower
            && self.special
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "result")]
pub enum PasswordValidation {
    Valid,
    Invalid(PasswordCriteria),
}

impl PasswordValidation {
    pub fn new(criteria: PasswordCriteria) -> Self {
        if criteria.all_met() {
            Self::Valid
        } else {
            Self::Invalid(criteria)
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "result")]
pub enum LoginResult {
    Authorized,
    Unauthorized,
    UserDoesNotExist,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationSuccessResponse {
    pub id: UserId,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "result")]
pub enum CreateUserResult {
    Success(AuthenticationSuccessResponse),
    AlreadyLoggedIn,
    UsernameAlreadyExists,
    InvalidPassword(PasswordCriteria),
    InvalidUsername(UsernameCriteria),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsernameRequest {
    pub username: String,
}

/// Body the API attaches to `400 Bad Request` responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadRequestBody {
    #[serde(rename = "type")]
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_token_result_accepts_unauthorized_alias() {
        let parsed: VerifyTokenResult =
            serde_json::from_str(r#"{"result":"unauthorized"}"#).expect("json");
        assert_eq!(parsed, VerifyTokenResult::NotLoggedIn);
        let encoded = serde_json::to_string(&VerifyTokenResult::NotLoggedIn).expect("json");
        assert_eq!(encoded, r#"{"result":"notLoggedIn"}"#);
    }

    #[test]
    fn my_info_success_carries_session() {
        let parsed: MyInfoResult =
            serde_json::from_str(r#"{"type":"success","id":7,"username":"ada"}"#).expect("json");
        assert_eq!(
            parsed.into_session(),
            Some(AuthSession {
                id: UserId(7),
                username: "ada".into()
            })
        );
    }

    #[test]
    fn password_validation_is_tagged_with_criteria() {
        let criteria = PasswordCriteria {
            charset: true,
            length: false,
            alpha: true,
            digit: false,
            upper: true,
            lower: true,
            special: false,
        };
        let encoded = serde_json::to_value(PasswordValidation::new(criteria)).expect("json");
        assert_eq!(encoded["result"], "invalid");
        assert_eq!(encoded["length"], false);
        assert_eq!(encoded["upper"], true);
    }
}
