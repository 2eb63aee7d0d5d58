use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub image: Option<String>,
}

#[derive(Clone, Debug)]
struct StoredImage {
    content_type: String,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct Directory {
    users: BTreeMap<i64, User>,
    images: HashMap<String, StoredImage>,
    last_id: i64,
}

pub type Db = Arc<RwLock<Directory>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Directory::default()));
    Router::new()
        .route("/api/users", get(list_users))
        .route(
            "/api/users/{id}",
            get(get_user).post(update_user).delete(delete_user),
        )
        .route("/api/register", post(register))
        .route("/storage/{file}", get(get_image))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// JSON error body in the `{message, errors?}` shape the client parses.
pub struct Failure {
    status: StatusCode,
    body: serde_json::Value,
}

impl Failure {
    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: json!({ "message": "User not found." }),
        }
    }

    fn bad_request(err: MultipartError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: json!({ "message": err.body_text() }),
        }
    }

    fn validation(errors: BTreeMap<&'static str, Vec<String>>) -> Self {
        let mut messages = errors.values().flatten();
        let first = messages.next().cloned().unwrap_or_default();
        let rest = messages.count();
        let message = match rest {
            0 => first,
            1 => format!("{first} (and 1 more error)"),
            n => format!("{first} (and {n} more errors)"),
        };
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: json!({ "message": message, "errors": errors }),
        }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

struct Upload {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct UserForm {
    fields: HashMap<String, String>,
    image: Option<Upload>,
}

impl UserForm {
    fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(|v| v.trim()).unwrap_or_default()
    }
}

async fn read_form(mut multipart: Multipart) -> Result<UserForm, Failure> {
    let mut form = UserForm::default();
    while let Some(field) = multipart.next_field().await.map_err(Failure::bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await.map_err(Failure::bad_request)?.to_vec();
            form.image = Some(Upload {
                file_name,
                content_type,
                bytes,
            });
        } else {
            let value = field.text().await.map_err(Failure::bad_request)?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

fn validate(
    dir: &Directory,
    form: &UserForm,
    current: Option<i64>,
    registering: bool,
) -> Result<(), Failure> {
    let mut errors: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
    let name = form.text("name");
    let email = form.text("email");

    if name.is_empty() {
        errors.entry("name").or_default().push("The name field is required.".to_string());
    }
    if email.is_empty() {
        errors.entry("email").or_default().push("The email field is required.".to_string());
    } else if !email.contains('@') {
        errors
            .entry("email")
            .or_default()
            .push("The email field must be a valid email address.".to_string());
    } else if dir
        .users
        .values()
        .any(|u| u.email.eq_ignore_ascii_case(email) && Some(u.id) != current)
    {
        errors
            .entry("email")
            .or_default()
            .push("The email has already been taken.".to_string());
    }
    if registering {
        let password = form.text("password");
        if !password.is_empty() && password != form.text("password_confirmation") {
            errors
                .entry("password")
                .or_default()
                .push("The password field confirmation does not match.".to_string());
        }
    }
    if let Some(image) = &form.image {
        if !image.content_type.starts_with("image/") {
            errors
                .entry("image")
                .or_default()
                .push("The image field must be an image.".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Failure::validation(errors))
    }
}

/// Store an upload and return the public path it is served from.
fn store_image(dir: &mut Directory, id: i64, upload: Upload) -> String {
    let stored = format!("{id}_{}", upload.file_name);
    dir.images.insert(
        stored.clone(),
        StoredImage {
            content_type: upload.content_type,
            bytes: upload.bytes,
        },
    );
    format!("/storage/{stored}")
}

fn drop_image(dir: &mut Directory, image: Option<&str>) {
    if let Some(stored) = image.and_then(|url| url.strip_prefix("/storage/")) {
        dir.images.remove(stored);
    }
}

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

async fn list_users(State(db): State<Db>) -> Json<serde_json::Value> {
    let dir = db.read().await;
    let users: Vec<&User> = dir.users.values().collect();
    Json(json!({
        "data": users,
        "links": { "first": "/api/users?page=1", "last": "/api/users?page=1", "prev": null, "next": null },
        "meta": { "current_page": 1, "last_page": 1, "per_page": users.len(), "total": users.len() },
    }))
}

async fn get_user(State(db): State<Db>, Path(id): Path<i64>) -> Result<Json<serde_json::Value>, Failure> {
    let dir = db.read().await;
    let user = dir.users.get(&id).ok_or_else(Failure::not_found)?;
    Ok(Json(json!({ "data": user })))
}

async fn register(
    State(db): State<Db>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), Failure> {
    let mut form = read_form(multipart).await?;
    let mut dir = db.write().await;
    validate(&dir, &form, None, true)?;

    dir.last_id += 1;
    let id = dir.last_id;
    let image = form.image.take().map(|upload| store_image(&mut dir, id, upload));
    let user = User {
        id,
        name: form.text("name").to_string(),
        email: form.text("email").to_string(),
        phone: optional(form.text("phone")),
        image,
    };
    dir.users.insert(id, user.clone());
    info!(id, "registered user");
    Ok((StatusCode::CREATED, Json(json!({ "data": user }))))
}

/// Form updates arrive as `POST` with `_method=PUT`.
async fn update_user(
    State(db): State<Db>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut form = read_form(multipart).await?;
    if !form.text("_method").eq_ignore_ascii_case("PUT") {
        return Err(Failure {
            status: StatusCode::METHOD_NOT_ALLOWED,
            body: json!({ "message": "The POST method is not supported for route api/users/{id}." }),
        });
    }

    let mut dir = db.write().await;
    let previous_image = dir.users.get(&id).ok_or_else(Failure::not_found)?.image.clone();
    validate(&dir, &form, Some(id), false)?;

    let image = match form.image.take() {
        Some(upload) => {
            drop_image(&mut dir, previous_image.as_deref());
            Some(store_image(&mut dir, id, upload))
        }
        None => previous_image,
    };
    let user = User {
        id,
        name: form.text("name").to_string(),
        email: form.text("email").to_string(),
        phone: optional(form.text("phone")),
        image,
    };
    dir.users.insert(id, user.clone());
    info!(id, "updated user");
    Ok(Json(json!({ "data": user })))
}

async fn delete_user(State(db): State<Db>, Path(id): Path<i64>) -> Result<StatusCode, Failure> {
    let mut dir = db.write().await;
    let user = dir.users.remove(&id).ok_or_else(Failure::not_found)?;
    drop_image(&mut dir, user.image.as_deref());
    info!(id, "deleted user");
    Ok(StatusCode::NO_CONTENT)
}

async fn get_image(State(db): State<Db>, Path(file): Path<String>) -> Result<Response, StatusCode> {
    let dir = db.read().await;
    let image = dir.images.get(&file).ok_or(StatusCode::NOT_FOUND)?;
    Ok((
        [(header::CONTENT_TYPE, image.content_type.clone())],
        image.bytes.clone(),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(fields: &[(&str, &str)]) -> UserForm {
        UserForm {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            image: None,
        }
    }

    fn directory_with(email: &str) -> Directory {
        let mut dir = Directory::default();
        dir.users.insert(
            1,
            User {
                id: 1,
                name: "Ana".to_string(),
                email: email.to_string(),
                phone: None,
                image: None,
            },
        );
        dir.last_id = 1;
        dir
    }

    #[test]
    fn user_serializes_nulls() {
        let user = User {
            id: 1,
            name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
            phone: None,
            image: None,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["phone"], serde_json::Value::Null);
        assert_eq!(json["image"], serde_json::Value::Null);
    }

    #[test]
    fn missing_fields_are_reported_together() {
        let err = validate(&Directory::default(), &form(&[]), None, true).unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.body["message"], "The email field is required. (and 1 more error)");
        assert_eq!(err.body["errors"]["name"][0], "The name field is required.");
    }

    #[test]
    fn duplicate_email_rejected_except_for_self() {
        let dir = directory_with("ana@x.com");
        let f = form(&[("name", "Ana"), ("email", "ANA@x.com")]);
        assert!(validate(&dir, &f, None, true).is_err());
        assert!(validate(&dir, &f, Some(1), false).is_ok());
    }

    #[test]
    fn password_confirmation_must_match() {
        let f = form(&[
            ("name", "Ana"),
            ("email", "ana@x.com"),
            ("password", "secret1"),
            ("password_confirmation", "secret2"),
        ]);
        let err = validate(&Directory::default(), &f, None, true).unwrap_err();
        assert_eq!(
            err.body["errors"]["password"][0],
            "The password field confirmation does not match."
        );
    }

    #[test]
    fn empty_phone_is_stored_as_null() {
        assert_eq!(optional(""), None);
        assert_eq!(optional("5551234567").as_deref(), Some("5551234567"));
    }
}
