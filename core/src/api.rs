//! Async CRUD calls against the contacts API.
//!
//! `ContactApi` pairs the pure `ContactClient` with a `Transport`: build the
//! request, execute it, parse the response.

use std::sync::Arc;

use tracing::debug;

use crate::client::ContactClient;
use crate::config::ClientConfig;
use crate::error::{ApiError, ConfigError};
use crate::staging::PendingUpload;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{Contact, ContactFields, ContactId, ContactListEnvelope, NewContact};

#[derive(Clone)]
pub struct ContactApi {
    client: ContactClient,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ContactApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactApi")
            .field("base_url", &self.client.base_url())
            .finish_non_exhaustive()
    }
}

impl ContactApi {
    /// Build an API backed by `ReqwestTransport`.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::with_transport(&config.base_url, Arc::new(transport)))
    }

    pub fn with_transport(base_url: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            client: ContactClient::new(base_url),
            transport,
        }
    }

    pub async fn list_contacts(&self) -> Result<ContactListEnvelope, ApiError> {
        let response = self.transport.execute(self.client.build_list_contacts()).await?;
        let envelope = self.client.parse_list_contacts(response)?;
        debug!(count = envelope.data.len(), "listed contacts");
        Ok(envelope)
    }

    pub async fn get_contact(&self, id: ContactId) -> Result<Contact, ApiError> {
        let response = self.transport.execute(self.client.build_get_contact(id)).await?;
        self.client.parse_get_contact(response)
    }

    pub async fn create_contact(
        &self,
        input: &NewContact,
        image: Option<&PendingUpload>,
    ) -> Result<Contact, ApiError> {
        let request = self.client.build_create_contact(input, image);
        let response = self.transport.execute(request).await?;
        let contact = self.client.parse_create_contact(response)?;
        debug!(id = contact.id, with_image = image.is_some(), "created contact");
        Ok(contact)
    }

    pub async fn update_contact(
        &self,
        id: ContactId,
        fields: &ContactFields,
        image: Option<&PendingUpload>,
    ) -> Result<Contact, ApiError> {
        let request = self.client.build_update_contact(id, fields, image);
        let response = self.transport.execute(request).await?;
        self.client.parse_update_contact(response)
    }

    pub async fn delete_contact(&self, id: ContactId) -> Result<(), ApiError> {
        let response = self.transport.execute(self.client.build_delete_contact(id)).await?;
        self.client.parse_delete_contact(response)
    }
}
