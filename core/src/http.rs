//! HTTP transport types shared by the mapper and the transport.
//!
//! # Design
//! Requests and responses are plain data. `ContactClient` builds
//! `HttpRequest` values and parses `HttpResponse` values without touching the
//! network; a `Transport` executes the round-trip in between. Multipart bodies
//! stay as a list of named parts so the mapper remains pure and the transport
//! decides how to encode and stream them.

use std::path::PathBuf;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// One part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    /// A file read from disk when the request is executed.
    File {
        name: String,
        path: PathBuf,
        file_name: String,
        content_type: String,
    },
}

impl FormPart {
    pub fn text(name: &str, value: impl Into<String>) -> Self {
        FormPart::Text {
            name: name.to_string(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

/// Request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HttpBody {
    #[default]
    Empty,
    Multipart(Vec<FormPart>),
}

impl HttpBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, HttpBody::Empty)
    }

    /// Value of the text part called `name`, if any.
    pub fn text_part(&self, name: &str) -> Option<&str> {
        match self {
            HttpBody::Empty => None,
            HttpBody::Multipart(parts) => parts.iter().find_map(|part| match part {
                FormPart::Text { name: n, value } if n == name => Some(value.as_str()),
                _ => None,
            }),
        }
    }

    pub fn parts(&self) -> &[FormPart] {
        match self {
            HttpBody::Empty => &[],
            HttpBody::Multipart(parts) => parts,
        }
    }
}

/// An HTTP request described as plain data.
///
/// Built by `ContactClient::build_*` methods and executed by a `Transport`.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: HttpBody,
}

/// An HTTP response described as plain data.
///
/// Produced by a `Transport`, then passed to `ContactClient::parse_*` methods.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
