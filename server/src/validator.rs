use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    pub static ref EMAIL_RX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    )
    .expect("email regex compiles");
}

pub const NUL_MESSAGE: &str = "This field cannot contain null characters";

/// Accumulated result of validating one submitted form.
///
/// Field errors are keyed by the form field name and keep only the first
/// message recorded for a field. Non-field errors are shown above the form.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Validator {
    pub non_field_errors: Vec<String>,
    pub field_errors: BTreeMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid(&self) -> bool {
        self.field_errors.is_empty() && self.non_field_errors.is_empty()
    }

    pub fn add_field_error(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.field_errors
            .entry(key.into())
            .or_insert_with(|| message.into());
    }

    pub fn add_non_field_error(&mut self, message: impl Into<String>) {
        self.non_field_errors.push(message.into());
    }

    pub fn field_error(&self, key: &str) -> Option<&str> {
        self.field_errors.get(key).map(String::as_str)
    }
}

impl From<garde::Report> for Validator {
    fn from(report: garde::Report) -> Self {
        let mut validator = Validator::new();
        for (path, error) in report.iter() {
            validator.add_field_error(path.to_string(), error.message());
        }
        validator
    }
}

pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Text columns reject the NUL character, so it never passes as input.
pub fn no_nul(value: &str) -> bool {
    !value.contains('\0')
}

pub fn max_chars(value: &str, n: usize) -> bool {
    value.chars().count() <= n
}

pub fn min_chars(value: &str, n: usize) -> bool {
    value.chars().count() >= n
}

pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.contains(value)
}

pub fn matches(value: &str, rx: &Regex) -> bool {
    rx.is_match(value)
}
