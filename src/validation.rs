//! Input checks that run before anything is written.

use rust_decimal::Decimal;

use crate::error::{ApiError, FieldErrors};

/// Collects per-field problems and turns them into one 400 response.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        self.errors.entry(field.to_string()).or_insert_with(|| message.into());
        self
    }

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.add(field, "This field is required");
        }
        self
    }

    /// Optional values are only checked when present.
    pub fn required_opt(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.required(field, value);
        }
        self
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        if value.chars().count() > max {
            self.add(field, format!("Must be at most {} characters", max));
        }
        self
    }

    pub fn non_negative(&mut self, field: &str, value: Option<Decimal>) -> &mut Self {
        if value.is_some_and(|v| v.is_sign_negative() && !v.is_zero()) {
            self.add(field, "Must not be negative");
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        let valid = value
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid {
            self.add(field, "Must be a valid email address");
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self, message: &str) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation_error(message, Some(self.errors)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_first_error_per_field() {
        let mut v = Validator::new();
        v.required("title", "  ").max_len("title", "  ", 1).email("email", "nobody");
        match v.finish("Invalid input") {
            Err(ApiError::ValidationError { field_errors: Some(fields), .. }) => {
                assert_eq!(fields["title"], "This field is required");
                assert!(fields.contains_key("email"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let mut v = Validator::new();
        v.non_negative("budget", Some(Decimal::new(-5, 0)));
        assert!(!v.is_valid());

        let mut v = Validator::new();
        v.non_negative("budget", Some(Decimal::ZERO)).non_negative("rate", None);
        assert!(v.finish("ok").is_ok());
    }
}
