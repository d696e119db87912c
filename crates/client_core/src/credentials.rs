//! Local username and password rules.

use shared::protocol::{PasswordCriteria, PasswordValidation, UsernameCriteria, UsernameValidation};

const SPECIAL_USERNAME_CHARS: &str = "-_";
pub const MIN_USERNAME_LENGTH: usize = 4;
pub const MAX_USERNAME_LENGTH: usize = 24;

const SPECIAL_PASSWORD_CHARS: &str = "~!@#$%^&*()_+~`! @#$%^&*()_-+={[}]|\\:;\"'<,>.?/";
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 512;

fn is_valid_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || SPECIAL_USERNAME_CHARS.contains(c)
}

fn is_valid_password_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || SPECIAL_PASSWORD_CHARS.contains(c)
}

pub fn username_criteria(username: &str) -> UsernameCriteria {
    UsernameCriteria {
        length: (MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&username.len()),
        charset: username.chars().all(is_valid_username_char),
    }
}

pub fn validate_username(username: &str) -> UsernameValidation {
    UsernameValidation::new(username_criteria(username))
}

pub fn password_criteria(password: &str) -> PasswordCriteria {
    let mut criteria = PasswordCriteria {
        charset: true,
        length: (MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&password.len()),
        alpha: false,
        digit: false,
        upper: false,
        lower: false,
        special: false,
    };

    for c in password.chars() {
        criteria.charset &= is_valid_password_char(c);
        criteria.upper |= c.is_ascii_uppercase();
        criteria.lower |= c.is_ascii_lowercase();
        criteria.digit |= c.is_numeric();
        criteria.alpha |= c.is_alphabetic();
        criteria.special |= SPECIAL_PASSWORD_CHARS.contains(c);
    }

    criteria
}

pub fn validate_password(password: &str) -> PasswordValidation {
    PasswordValidation::new(password_criteria(password))
}
