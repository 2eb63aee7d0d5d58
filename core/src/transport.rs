//! Executes `HttpRequest` values against the network.
//!
//! The store and `ContactApi` only ever see the `Transport` trait, so tests
//! can substitute a scripted transport and the production build uses
//! `ReqwestTransport`.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ApiError, ConfigError};
use crate::http::{FormPart, HttpBody, HttpMethod, HttpRequest, HttpResponse};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the round-trip. Non-2xx statuses are returned as data;
    /// only connectivity failures and timeouts are errors.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// `reqwest`-backed transport with a per-request timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = request.method.as_str(), path = %request.path, "sending request");

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.path),
            HttpMethod::Post => self.client.post(&request.path),
            HttpMethod::Delete => self.client.delete(&request.path),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let HttpBody::Multipart(parts) = request.body {
            builder = builder.multipart(encode_form(parts).await?);
        }

        let response = builder.send().await.map_err(|e| ApiError::Network(describe(&e)))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(|e| ApiError::Network(describe(&e)))?;

        debug!(status, bytes = body.len(), "received response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

async fn encode_form(parts: Vec<FormPart>) -> Result<Form, ApiError> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name, value),
            FormPart::File {
                name,
                path,
                file_name,
                content_type,
            } => {
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| ApiError::Upload(format!("{}: {e}", path.display())))?;
                let part = Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(&content_type)
                    .map_err(|e| ApiError::Upload(e.to_string()))?;
                form.part(name, part)
            }
        };
    }
    Ok(form)
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("could not connect: {err}")
    } else {
        err.to_string()
    }
}
