//! Form checks a screen runs before handing fields to the store.
//!
//! The store sends whatever it is given; these rules only mirror what the
//! edit form enforces so bad input never costs a round-trip.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::ContactFields;

pub const NAME_MAX_CHARS: usize = 50;
pub const EMAIL_MAX_CHARS: usize = 60;
pub const PHONE_DIGITS: usize = 10;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    Name,
    Email,
    Phone,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Phone => "phone",
        }
    }
}

/// Every rule that failed, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<(Field, String)>,
}

impl ValidationErrors {
    fn push(&mut self, field: Field, message: impl Into<String>) {
        self.errors.push((field, message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.errors
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, message)| message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.errors.iter().map(|(field, message)| (*field, message.as_str()))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .iter()
            .map(|(field, message)| format!("{}: {message}", field.as_str()))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&rendered)
    }
}

impl std::error::Error for ValidationErrors {}

impl ContactFields {
    /// Check the form rules. An empty phone counts as absent.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let name = self.name.trim();
        let name_len = name.chars().count();
        if name_len == 0 {
            errors.push(Field::Name, "name is required");
        } else if name_len > NAME_MAX_CHARS {
            errors.push(Field::Name, format!("name must be at most {NAME_MAX_CHARS} characters"));
        } else if name.chars().any(char::is_numeric) {
            errors.push(Field::Name, "name must not contain digits");
        }

        let email = self.email.trim();
        if email.is_empty() {
            errors.push(Field::Email, "email is required");
        } else if email.chars().count() > EMAIL_MAX_CHARS {
            errors.push(Field::Email, format!("email must be at most {EMAIL_MAX_CHARS} characters"));
        } else if !EMAIL.is_match(email) {
            errors.push(Field::Email, "email is invalid");
        }

        if let Some(phone) = self.phone.as_deref().filter(|p| !p.is_empty()) {
            if phone.len() != PHONE_DIGITS || !phone.bytes().all(|b| b.is_ascii_digit()) {
                errors.push(Field::Phone, format!("phone must be exactly {PHONE_DIGITS} digits"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
