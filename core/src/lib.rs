//! Client core for the contacts service.
//!
//! # Overview
//! Talks to a REST API exposing a `User` resource (called `Contact` here)
//! and keeps the state a contacts screen renders from: the list, the
//! selected contact, a loading flag and the last error.
//!
//! # Design
//! - `ContactClient` is stateless and does no I/O: `build_*` produces an
//!   `HttpRequest`, `parse_*` consumes an `HttpResponse`.
//! - A `Transport` executes requests; `ReqwestTransport` is the production
//!   one. `ContactApi` ties the two together.
//! - `ContactStore` sequences commands through `ContactApi` and publishes
//!   `StoreState` over a `watch` channel.
//! - Picked images are copied into temporary files by `Stager` before
//!   upload; the resulting `PendingUpload` deletes its file on drop.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod staging;
pub mod store;
pub mod transport;
pub mod types;
pub mod validation;

pub use api::ContactApi;
pub use client::ContactClient;
pub use config::{ClientConfig, ImageFailurePolicy};
pub use error::{ApiError, ConfigError, FieldErrors, ServerError, StagingError};
pub use http::{FormPart, HttpBody, HttpMethod, HttpRequest, HttpResponse};
pub use staging::{BytesSource, FileSource, ImageSource, PendingUpload, Stager};
pub use store::{Command, ContactStore, Outcome, StoreState};
pub use transport::{ReqwestTransport, Transport};
pub use types::{Contact, ContactEnvelope, ContactFields, ContactId, ContactListEnvelope, NewContact};
pub use validation::{Field, ValidationErrors};
