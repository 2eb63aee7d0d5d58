//! Domain DTOs for the contacts API.
//!
//! # Design
//! The server calls the resource `User`; the client calls it `Contact`. Wire
//! shapes are decoded directly into these types, so nullable wire fields are
//! `Option` here: `null` and a missing key both become `None`, while an empty
//! string stays `Some("")`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server-assigned contact identifier.
pub type ContactId = i64;

/// A single contact returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// URL of the remotely hosted avatar.
    #[serde(default)]
    pub image: Option<String>,
}

/// `GET /users` response. `links` and `meta` carry pagination metadata that
/// is parsed but otherwise passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactListEnvelope {
    pub data: Vec<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

/// Single-contact response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactEnvelope {
    pub data: Contact,
}

/// Editable contact fields, sent on update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactFields {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ContactFields {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// Registration payload. The password is only sent when present and is
/// mirrored into `password_confirmation`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewContact {
    #[serde(flatten)]
    pub fields: ContactFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl NewContact {
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

impl From<ContactFields> for NewContact {
    fn from(fields: ContactFields) -> Self {
        Self {
            fields,
            password: None,
        }
    }
}
