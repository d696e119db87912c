use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);

/// Identity of the signed-in user. Only exists while authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub id: UserId,
    pub username: String,
}

/// Tri-state verdict for a field value.
///
/// `Unknown` means the check is pending or indeterminate. It is never shown as
/// a failure and never blocks another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    Valid,
    Invalid,
    #[default]
    Unknown,
}

impl ValidationState {
    /// Swaps `Valid` and `Invalid`; `Unknown` stays `Unknown`.
    pub fn invert(self) -> Self {
        match self {
            Self::Valid => Self::Invalid,
            Self::Invalid => Self::Valid,
            Self::Unknown => Self::Unknown,
        }
    }

    /// Collapses `Unknown` into `Invalid`.
    pub fn exclude_unknown(self) -> Self {
        match self {
            Self::Unknown => Self::Invalid,
            other => other,
        }
    }

    /// Folds two verdicts: `Invalid` wins over `Unknown`, which wins over `Valid`.
    pub fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Invalid, _) | (_, Self::Invalid) => Self::Invalid,
            (Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
            _ => Self::Valid,
        }
    }

    pub fn is_valid(self) -> bool {
        self == Self::Valid
    }

    pub fn from_bool(valid: bool) -> Self {
        if valid {
            Self::Valid
        } else {
            Self::Invalid
        }
    }
}

impl fmt::Display for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}
