//! Validation rules for the sign-in and sign-up forms.
//!
//! Length limits follow the OWASP Authentication cheat sheet. Messages are
//! meant to be shown next to the field as-is.

use crate::validation::{ValidationResult, Validator};

/// Minimum password length accepted on sign-up.
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Maximum password length to allow passphrases.
pub const PASSWORD_MAX_LENGTH: usize = 128;

/// Maximum email length (RFC 5321 path limit).
pub const EMAIL_MAX_LENGTH: usize = 254;

/// Minimum username length.
pub const USERNAME_MIN_LENGTH: usize = 3;

/// Maximum username length.
pub const USERNAME_MAX_LENGTH: usize = 20;

/// Rejects blank values.
#[derive(Debug, Clone)]
pub struct RequiredValidator {
    message: String,
}

impl RequiredValidator {
    /// Creates a rule reporting `message` for blank input.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for RequiredValidator {
    fn default() -> Self {
        Self::new("this field is required")
    }
}

impl Validator for RequiredValidator {
    fn validate(&self, value: &str) -> ValidationResult {
        if value.trim().is_empty() {
            return ValidationResult::invalid(self.message.as_str());
        }

        ValidationResult::valid()
    }
}

/// Structural email check: one `@`, non-empty local part, dotted domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailValidator;

/// Misspelled mail domains and their likely intended spelling.
static DOMAIN_TYPOS: &[(&str, &str)] = &[
    ("gmial.com", "gmail.com"),
    ("gmai.com", "gmail.com"),
    ("gmail.co", "gmail.com"),
    ("gamil.com", "gmail.com"),
    ("yahooo.com", "yahoo.com"),
    ("yaho.com", "yahoo.com"),
    ("hotmial.com", "hotmail.com"),
    ("hotmai.com", "hotmail.com"),
    ("outlok.com", "outlook.com"),
    ("outloo.com", "outlook.com"),
];

impl Validator for EmailValidator {
    fn validate(&self, value: &str) -> ValidationResult {
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return ValidationResult::invalid("email address is required");
        }

        if trimmed.chars().count() > EMAIL_MAX_LENGTH {
            return ValidationResult::invalid(format!(
                "email address must not exceed {EMAIL_MAX_LENGTH} characters"
            ));
        }

        if trimmed.chars().any(char::is_whitespace) {
            return ValidationResult::invalid("email address must not contain spaces");
        }

        let Some((local, domain)) = trimmed.split_once('@') else {
            return ValidationResult::invalid("email address must contain '@'");
        };

        if domain.contains('@') {
            return ValidationResult::invalid("email address must contain exactly one '@'");
        }

        if local.is_empty() {
            return ValidationResult::invalid("email local part must not be empty");
        }

        let labels_ok = domain.split('.').all(|label| !label.is_empty());
        if !domain.contains('.') || !labels_ok {
            return ValidationResult::invalid("email domain is not valid")
                .with_suggestions(["use a domain such as example.com"]);
        }

        let lowered = domain.to_ascii_lowercase();
        if let Some((_, intended)) = DOMAIN_TYPOS.iter().find(|(typo, _)| *typo == lowered) {
            return ValidationResult::invalid("email domain looks misspelled")
                .with_suggestions([format!("did you mean {local}@{intended}?")]);
        }

        ValidationResult::valid()
    }
}

/// Password strength rule.
///
/// Length is a hard requirement; every missing character class adds a
/// suggestion and fails the rule.
#[derive(Debug, Clone, Copy)]
pub struct PasswordValidator {
    min_length: usize,
}

impl PasswordValidator {
    /// Creates a rule with a custom minimum length.
    #[must_use]
    pub fn with_min_length(min_length: usize) -> Self {
        Self { min_length }
    }
}

impl Default for PasswordValidator {
    fn default() -> Self {
        Self::with_min_length(PASSWORD_MIN_LENGTH)
    }
}

impl Validator for PasswordValidator {
    fn validate(&self, value: &str) -> ValidationResult {
        let char_count = value.chars().count();

        if char_count == 0 {
            return ValidationResult::invalid("password is required");
        }

        if char_count < self.min_length {
            return ValidationResult::invalid(format!(
                "password must be at least {} characters",
                self.min_length
            ));
        }

        if char_count > PASSWORD_MAX_LENGTH {
            return ValidationResult::invalid(format!(
                "password must not exceed {PASSWORD_MAX_LENGTH} characters"
            ));
        }

        if is_common_password(value) {
            return ValidationResult::invalid(
                "this password is too common and has appeared in data breaches",
            )
            .with_suggestions(["choose a passphrase that is unique to this site"]);
        }

        let mut missing = Vec::new();
        if !value.chars().any(char::is_uppercase) {
            missing.push("add an uppercase letter");
        }
        if !value.chars().any(char::is_lowercase) {
            missing.push("add a lowercase letter");
        }
        if !value.chars().any(|character| character.is_ascii_digit()) {
            missing.push("add a number");
        }
        if !value.chars().any(|character| !character.is_alphanumeric()) {
            missing.push("add a symbol such as ! or #");
        }

        if missing.is_empty() {
            return ValidationResult::valid();
        }

        ValidationResult::invalid("password is too weak").with_suggestions(missing)
    }
}

fn is_common_password(password: &str) -> bool {
    let lowered = password.to_lowercase();
    COMMON_PASSWORDS.iter().any(|entry| *entry == lowered)
}

/// Top breached passwords that satisfy the minimum length.
static COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "password1!",
    "12345678",
    "123456789",
    "1234567890",
    "qwerty123",
    "qwertyuiop",
    "iloveyou",
    "sunshine1",
    "princess1",
    "football1",
    "welcome1",
    "welcome123",
    "admin123",
    "letmein1",
    "p@ssw0rd",
    "passw0rd",
    "abc12345",
];

/// Username rule: starts with a letter, then ASCII letters, digits or `_`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsernameValidator;

impl Validator for UsernameValidator {
    fn validate(&self, value: &str) -> ValidationResult {
        let trimmed = value.trim();
        let char_count = trimmed.chars().count();

        if char_count == 0 {
            return ValidationResult::invalid("username is required");
        }

        if char_count < USERNAME_MIN_LENGTH {
            return ValidationResult::invalid(format!(
                "username must be at least {USERNAME_MIN_LENGTH} characters"
            ));
        }

        if char_count > USERNAME_MAX_LENGTH {
            return ValidationResult::invalid(format!(
                "username must not exceed {USERNAME_MAX_LENGTH} characters"
            ));
        }

        if !trimmed
            .chars()
            .next()
            .is_some_and(|first| first.is_ascii_alphabetic())
        {
            return ValidationResult::invalid("username must start with a letter");
        }

        if !trimmed
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || character == '_')
        {
            let cleaned: String = trimmed
                .chars()
                .filter(|character| character.is_ascii_alphanumeric() || *character == '_')
                .collect();
            return ValidationResult::invalid(
                "username may only contain letters, numbers and underscores",
            )
            .with_suggestions([format!("try {cleaned}")]);
        }

        ValidationResult::valid()
    }
}
