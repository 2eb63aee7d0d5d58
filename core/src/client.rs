//! Stateless request builder and response parser for the contacts API.
//!
//! # Design
//! `ContactClient` holds only a `base_url` and carries no mutable state
//! between calls. Each operation is split into a `build_*` method that
//! produces an `HttpRequest` and a `parse_*` method that consumes an
//! `HttpResponse`, so the mapping between wire shapes and `Contact` stays
//! deterministic and free of I/O.
//!
//! Mutations travel as `multipart/form-data` because they may carry an
//! avatar. Updates are a `POST` with a `_method=PUT` text part, which is how
//! the server routes form-encoded updates.

use serde::de::DeserializeOwned;

use crate::error::{ApiError, ServerError};
use crate::http::{FormPart, HttpBody, HttpMethod, HttpRequest, HttpResponse};
use crate::staging::PendingUpload;
use crate::types::{Contact, ContactEnvelope, ContactFields, ContactId, ContactListEnvelope, NewContact};

/// Multipart field name of the avatar part.
pub const IMAGE_PART: &str = "image";

/// Synchronous, stateless client for the contacts API.
#[derive(Debug, Clone)]
pub struct ContactClient {
    base_url: String,
}

impl ContactClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }

    pub fn build_list_contacts(&self) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: self.url("users"),
            headers: accept_json(),
            body: HttpBody::Empty,
        }
    }

    pub fn build_get_contact(&self, id: ContactId) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: self.url(&format!("users/{id}")),
            headers: accept_json(),
            body: HttpBody::Empty,
        }
    }

    pub fn build_create_contact(&self, input: &NewContact, image: Option<&PendingUpload>) -> HttpRequest {
        let fields = &input.fields;
        let mut parts = vec![
            FormPart::text("name", fields.name.as_str()),
            FormPart::text("email", fields.email.as_str()),
        ];
        if let Some(password) = &input.password {
            parts.push(FormPart::text("password", password.as_str()));
            parts.push(FormPart::text("password_confirmation", password.as_str()));
        }
        parts.push(phone_part(fields));
        parts.extend(image.map(image_part));

        HttpRequest {
            method: HttpMethod::Post,
            path: self.url("register"),
            headers: accept_json(),
            body: HttpBody::Multipart(parts),
        }
    }

    pub fn build_update_contact(
        &self,
        id: ContactId,
        fields: &ContactFields,
        image: Option<&PendingUpload>,
    ) -> HttpRequest {
        let mut parts = vec![
            FormPart::text("name", fields.name.as_str()),
            FormPart::text("email", fields.email.as_str()),
            phone_part(fields),
            FormPart::text("_method", "PUT"),
        ];
        parts.extend(image.map(image_part));

        HttpRequest {
            method: HttpMethod::Post,
            path: self.url(&format!("users/{id}")),
            headers: accept_json(),
            body: HttpBody::Multipart(parts),
        }
    }

    pub fn build_delete_contact(&self, id: ContactId) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Delete,
            path: self.url(&format!("users/{id}")),
            headers: accept_json(),
            body: HttpBody::Empty,
        }
    }

    pub fn parse_list_contacts(&self, response: HttpResponse) -> Result<ContactListEnvelope, ApiError> {
        check_status(&response)?;
        decode(&response.body)
    }

    pub fn parse_get_contact(&self, response: HttpResponse) -> Result<Contact, ApiError> {
        parse_single(response)
    }

    pub fn parse_create_contact(&self, response: HttpResponse) -> Result<Contact, ApiError> {
        parse_single(response)
    }

    pub fn parse_update_contact(&self, response: HttpResponse) -> Result<Contact, ApiError> {
        parse_single(response)
    }

    pub fn parse_delete_contact(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }
}

fn accept_json() -> Vec<(String, String)> {
    vec![("accept".to_string(), "application/json".to_string())]
}

/// The server expects the field even when the contact has no phone.
fn phone_part(fields: &ContactFields) -> FormPart {
    FormPart::text("phone", fields.phone.clone().unwrap_or_default())
}

fn image_part(upload: &PendingUpload) -> FormPart {
    FormPart::File {
        name: IMAGE_PART.to_string(),
        path: upload.path().to_path_buf(),
        file_name: upload.file_name(),
        content_type: upload.mime_type().to_string(),
    }
}

fn parse_single(response: HttpResponse) -> Result<Contact, ApiError> {
    check_status(&response)?;
    decode::<ContactEnvelope>(&response.body).map(|envelope| envelope.data)
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// Map non-2xx responses to `ApiError::Server`.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::Server(ServerError::from_body(
        response.status,
        &response.body,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ContactClient {
        ContactClient::new("http://localhost:8000")
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn ana() -> NewContact {
        NewContact::from(ContactFields::new("Ana", "ana@x.com").with_phone("5551234567"))
    }

    #[test]
    fn build_list_contacts_produces_correct_request() {
        let req = client().build_list_contacts();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:8000/api/users");
        assert!(req.body.is_empty());
    }

    #[test]
    fn build_get_contact_produces_correct_request() {
        let req = client().build_get_contact(7);
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:8000/api/users/7");
    }

    #[test]
    fn build_create_contact_without_password_or_image() {
        let req = client().build_create_contact(&ana(), None);
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:8000/api/register");
        let names: Vec<&str> = req.body.parts().iter().map(FormPart::name).collect();
        assert_eq!(names, ["name", "email", "phone"]);
        assert_eq!(req.body.text_part("phone"), Some("5551234567"));
    }

    #[test]
    fn build_create_contact_mirrors_password_confirmation() {
        let req = client().build_create_contact(&ana().with_password("hunter22"), None);
        assert_eq!(req.body.text_part("password"), Some("hunter22"));
        assert_eq!(req.body.text_part("password_confirmation"), Some("hunter22"));
        assert!(req.body.text_part("_method").is_none());
    }

    #[test]
    fn build_update_contact_uses_method_override() {
        let fields = ContactFields::new("Ana", "ana@x.com");
        let req = client().build_update_contact(5, &fields, None);
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:8000/api/users/5");
        assert_eq!(req.body.text_part("_method"), Some("PUT"));
        assert_eq!(req.body.text_part("phone"), Some(""));
        assert!(req.body.text_part("password").is_none());
        assert!(!req.body.parts().iter().any(|p| p.name() == IMAGE_PART));
    }

    #[test]
    fn build_delete_contact_produces_correct_request() {
        let req = client().build_delete_contact(9);
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.path, "http://localhost:8000/api/users/9");
        assert!(req.body.is_empty());
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = ContactClient::new("http://localhost:8000/");
        assert_eq!(client.build_list_contacts().path, "http://localhost:8000/api/users");
    }

    #[test]
    fn parse_list_contacts_keeps_server_order() {
        let body = r#"{"data":[
            {"id":3,"name":"Zoe","email":"z@x.com","phone":null,"image":null},
            {"id":1,"name":"Ana","email":"ana@x.com","phone":"5551234567","image":"http://img/1.png"}
        ]}"#;
        let envelope = client().parse_list_contacts(response(200, body)).unwrap();
        let ids: Vec<ContactId> = envelope.data.iter().map(|c| c.id).collect();
        assert_eq!(ids, [3, 1]);
        assert_eq!(envelope.data[1].image.as_deref(), Some("http://img/1.png"));
    }

    #[test]
    fn parse_get_contact_unwraps_envelope() {
        let body = r#"{"data":{"id":4,"name":"Bo","email":"bo@x.com"}}"#;
        let contact = client().parse_get_contact(response(200, body)).unwrap();
        assert_eq!(contact.id, 4);
        assert_eq!(contact.phone, None);
    }

    #[test]
    fn parse_create_contact_accepts_201() {
        let body = r#"{"data":{"id":10,"name":"Ana","email":"ana@x.com","phone":"5551234567"}}"#;
        let contact = client().parse_create_contact(response(201, body)).unwrap();
        assert_eq!(contact.id, 10);
    }

    #[test]
    fn parse_update_contact_validation_error() {
        let body = r#"{"message":"Validation failed","errors":{"email":["invalid"]}}"#;
        let err = client().parse_update_contact(response(422, body)).unwrap_err();
        assert_eq!(err.status(), Some(422));
        assert_eq!(err.to_string(), "Validation failed: email: invalid");
    }

    #[test]
    fn parse_get_contact_not_found() {
        let err = client()
            .parse_get_contact(response(404, r#"{"message":"User not found."}"#))
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "User not found.");
    }

    #[test]
    fn parse_delete_contact_ignores_body() {
        assert!(client().parse_delete_contact(response(204, "")).is_ok());
        assert!(client().parse_delete_contact(response(200, "{}")).is_ok());
    }

    #[test]
    fn parse_list_contacts_bad_json() {
        let err = client().parse_list_contacts(response(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn parse_wrong_status_with_raw_body() {
        let err = client()
            .parse_create_contact(response(500, "internal error"))
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Server(ServerError::Unparsed { status: 500, .. })
        ));
    }
}
