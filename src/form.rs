//! Form state and validation
//!
//! Validation runs synchronously on every submit attempt, before any feature
//! vector is built. It never looks at capture state.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const EMAIL_PATTERN: &str = r"\S+@\S+\.\S+";

static EMAIL_SHAPE: Lazy<Option<Regex>> = Lazy::new(|| match Regex::new(EMAIL_PATTERN) {
    Ok(re) => Some(re),
    Err(e) => {
        tracing::error!(pattern = EMAIL_PATTERN, error = %e, "email pattern failed to compile");
        None
    }
});

fn looks_like_email(email: &str) -> bool {
    EMAIL_SHAPE.as_ref().is_some_and(|re| re.is_match(email))
}

pub const EMAIL_REQUIRED: &str = "Please enter your email address";
pub const EMAIL_INVALID: &str = "Please enter a valid email address";
pub const PASSWORD_REQUIRED: &str = "Please enter your password";

/// Form fields that can carry a validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Email,
    Password,
}

/// Field-keyed validation messages; empty means valid
pub type ValidationErrors = BTreeMap<Field, String>;

/// Result of one validation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "errors", rename_all = "snake_case")]
pub enum Validation {
    Valid,
    Invalid(ValidationErrors),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }
}

/// Credentials entered by the user plus the errors of the last attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormState {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_deserializing)]
    errors: ValidationErrors,
}

impl FormState {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            errors: ValidationErrors::new(),
        }
    }

    /// Recompute errors from scratch; errors from earlier attempts never survive
    pub fn validate(&mut self) -> Validation {
        self.errors = check_fields(&self.email, &self.password);
        if self.errors.is_empty() {
            Validation::Valid
        } else {
            Validation::Invalid(self.errors.clone())
        }
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn error(&self, field: Field) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }
}

fn check_fields(email: &str, password: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if email.trim().is_empty() {
        errors.insert(Field::Email, EMAIL_REQUIRED.to_string());
    } else if !looks_like_email(email) {
        errors.insert(Field::Email, EMAIL_INVALID.to_string());
    }

    if password.trim().is_empty() {
        errors.insert(Field::Password, PASSWORD_REQUIRED.to_string());
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_email_pattern_compiles() {
        assert!(Regex::new(EMAIL_PATTERN).is_ok());
        assert!(EMAIL_SHAPE.is_some());
        assert!(looks_like_email("a@b.co"));
        assert!(!looks_like_email("a@b"));
    }

    #[test]
    fn test_valid_credentials() {
        let mut form = FormState::new("user@example.com", "hunter2");
        assert_eq!(form.validate(), Validation::Valid);
        assert!(form.errors().is_empty());
    }

    #[test]
    fn test_blank_email_and_password() {
        let mut form = FormState::new("", "");
        let validation = form.validate();

        assert!(!validation.is_valid());
        assert_eq!(form.error(Field::Email), Some(EMAIL_REQUIRED));
        assert_eq!(form.error(Field::Password), Some(PASSWORD_REQUIRED));
    }

    #[test]
    fn test_whitespace_counts_as_blank() {
        let mut form = FormState::new("   ", " \t");
        form.validate();
        assert_eq!(form.error(Field::Email), Some(EMAIL_REQUIRED));
        assert_eq!(form.error(Field::Password), Some(PASSWORD_REQUIRED));
    }

    #[test]
    fn test_malformed_email() {
        let mut form = FormState::new("not-an-email", "secret");
        match form.validate() {
            Validation::Invalid(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[&Field::Email], EMAIL_INVALID);
            }
            Validation::Valid => panic!("expected invalid email"),
        }

        for email in ["user@domain", "@example.com", "user@.com"] {
            let mut form = FormState::new(email, "secret");
            assert!(!form.validate().is_valid(), "{email} should be rejected");
        }
    }

    #[test]
    fn test_errors_are_recomputed_each_attempt() {
        let mut form = FormState::new("", "");
        form.validate();
        assert_eq!(form.errors().len(), 2);

        form.email = "user@example.com".to_string();
        form.validate();
        assert_eq!(form.error(Field::Email), None);
        assert_eq!(form.error(Field::Password), Some(PASSWORD_REQUIRED));

        form.password = "hunter2".to_string();
        assert!(form.validate().is_valid());
        assert!(form.errors().is_empty());
    }

    #[test]
    fn test_validation_serialization() {
        let mut form = FormState::new("", "pw");
        let json = serde_json::to_value(form.validate()).unwrap();
        assert_eq!(json["status"], "invalid");
        assert_eq!(json["errors"]["email"], EMAIL_REQUIRED);

        let json = serde_json::to_value(Validation::Valid).unwrap();
        assert_eq!(json["status"], "valid");
    }
}
