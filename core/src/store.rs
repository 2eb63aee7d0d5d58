//! Observable contact state driven by async commands.
//!
//! # Design
//! `ContactStore` owns the contact list, the selected contact, a loading flag
//! and the last error. Commands run to completion against the API and then
//! write their result; callers observe `StoreState` through a `watch`
//! channel and never receive an error directly.
//!
//! Commands are not serialized against each other. `refresh` and `select`
//! each draw a sequence token before the request goes out, and a response is
//! applied only if no newer command of the same kind has started since, so
//! the most recently issued list or selection wins regardless of which
//! response lands last. `loading` is true while any command is in flight.
//!
//! A successful create, update or delete re-fetches the whole list rather
//! than patching it locally.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::api::ContactApi;
use crate::config::{ClientConfig, ImageFailurePolicy};
use crate::error::{ApiError, ConfigError, StagingError};
use crate::staging::{ImageSource, PendingUpload, Stager};
use crate::types::{Contact, ContactFields, ContactId, NewContact};

/// Snapshot of everything a screen renders from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    /// In server order.
    pub contacts: Vec<Contact>,
    pub selected: Option<Contact>,
    pub loading: bool,
    pub error: Option<String>,
    /// Set when a picked image could not be staged. Kept apart from `error`.
    pub staging_error: Option<String>,
}

/// A unit of work for `ContactStore::dispatch`.
#[derive(Debug)]
pub enum Command {
    Refresh,
    Select(ContactId),
    Create {
        input: NewContact,
        image: Option<PendingUpload>,
    },
    Update {
        id: ContactId,
        fields: ContactFields,
        image: Option<PendingUpload>,
    },
    Remove(ContactId),
}

/// Completion notice for a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Refreshed(bool),
    Selected(bool),
    Created(Option<ContactId>),
    Updated(bool),
    Removed(bool),
}

/// Observable contact state driven by the remote API.
///
/// Cloning is cheap and every clone shares the same state, so a screen can
/// hand a clone to each background command.
#[derive(Clone)]
pub struct ContactStore {
    inner: Arc<Inner>,
}

struct Inner {
    api: ContactApi,
    stager: Stager,
    image_failure: ImageFailurePolicy,
    state: watch::Sender<StoreState>,
    in_flight: AtomicUsize,
    list_seq: AtomicU64,
    select_seq: AtomicU64,
    tasks: Mutex<JoinSet<()>>,
}

/// Holds one slot of the in-flight count. Dropping it, including when the
/// owning task is aborted, gives the slot back.
struct Loading<'a> {
    inner: &'a Inner,
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        let in_flight = &self.inner.in_flight;
        self.inner.state.send_modify(|state| {
            state.loading = in_flight.fetch_sub(1, Ordering::SeqCst) > 1;
        });
    }
}

impl ContactStore {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::from_parts(
            ContactApi::new(config)?,
            config.stager(),
            config.image_failure,
        ))
    }

    pub fn from_parts(api: ContactApi, stager: Stager, image_failure: ImageFailurePolicy) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            inner: Arc::new(Inner {
                api,
                stager,
                image_failure,
                state,
                in_flight: AtomicUsize::new(0),
                list_seq: AtomicU64::new(0),
                select_seq: AtomicU64::new(0),
                tasks: Mutex::new(JoinSet::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> StoreState {
        self.inner.state.borrow().clone()
    }

    /// Replace the list with the server's. Returns whether a fresh list was
    /// applied; a failure or a superseded response returns `false`.
    pub async fn refresh(&self) -> bool {
        let _loading = self.begin();
        let token = next_token(&self.inner.list_seq);
        match self.inner.api.list_contacts().await {
            Ok(envelope) => self.apply_if_current(&self.inner.list_seq, token, "refresh", |state| {
                state.contacts = envelope.data;
                state.error = None;
            }),
            Err(err) => {
                let message = err.to_string();
                if self.apply_if_current(&self.inner.list_seq, token, "refresh", |state| {
                    state.error = Some(message);
                }) {
                    warn!(error = %err, "refresh failed");
                }
                false
            }
        }
    }

    /// Fetch one contact into `selected`.
    pub async fn select(&self, id: ContactId) -> bool {
        let _loading = self.begin();
        let token = next_token(&self.inner.select_seq);
        match self.inner.api.get_contact(id).await {
            Ok(contact) => self.apply_if_current(&self.inner.select_seq, token, "select", |state| {
                state.selected = Some(contact);
            }),
            Err(err) => {
                let message = err.to_string();
                if self.apply_if_current(&self.inner.select_seq, token, "select", |state| {
                    state.error = Some(message);
                }) {
                    warn!(id, error = %err, "select failed");
                }
                false
            }
        }
    }

    /// Register a contact. On success the list is refreshed and the new id
    /// returned. `image` is discarded when the call resolves.
    pub async fn create(&self, input: NewContact, image: Option<PendingUpload>) -> Option<ContactId> {
        let _loading = self.begin();
        let result = self.inner.api.create_contact(&input, image.as_ref()).await;
        drop(image);
        match result {
            Ok(contact) => {
                info!(id = contact.id, "contact created");
                self.refresh().await;
                Some(contact.id)
            }
            Err(err) => {
                self.fail("create", err);
                None
            }
        }
    }

    /// Update a contact, then refresh the list and re-select it.
    pub async fn update(&self, id: ContactId, fields: ContactFields, image: Option<PendingUpload>) -> bool {
        let _loading = self.begin();
        let result = self.inner.api.update_contact(id, &fields, image.as_ref()).await;
        drop(image);
        match result {
            Ok(_) => {
                info!(id, "contact updated");
                self.refresh().await;
                self.select(id).await;
                true
            }
            Err(err) => {
                self.fail("update", err);
                false
            }
        }
    }

    pub async fn remove(&self, id: ContactId) -> bool {
        let _loading = self.begin();
        match self.inner.api.delete_contact(id).await {
            Ok(()) => {
                info!(id, "contact removed");
                self.refresh().await;
                true
            }
            Err(err) => {
                self.fail("remove", err);
                false
            }
        }
    }

    pub fn clear_error(&self) {
        self.inner.state.send_if_modified(|state| state.error.take().is_some());
    }

    pub fn clear_staging_error(&self) {
        self.inner
            .state
            .send_if_modified(|state| state.staging_error.take().is_some());
    }

    /// Copy a picked image into a temporary file on a blocking thread.
    ///
    /// A failure is recorded in `staging_error`, not `error`. Under
    /// `ImageFailurePolicy::ProceedWithoutImage` it yields `Ok(None)` so the
    /// caller can still send the request; under `Abort` the error is returned.
    pub async fn stage_image(
        &self,
        source: Arc<dyn ImageSource>,
        prefix: &str,
    ) -> Result<Option<PendingUpload>, StagingError> {
        let stager = self.inner.stager.clone();
        let prefix = prefix.to_string();
        let result = tokio::task::spawn_blocking(move || stager.stage(source.as_ref(), &prefix))
            .await
            .map_err(|e| StagingError::Task(e.to_string()))
            .and_then(|staged| staged);

        match result {
            Ok(upload) => Ok(Some(upload)),
            Err(err) => {
                warn!(error = %err, policy = ?self.inner.image_failure, "image staging failed");
                let message = err.to_string();
                self.inner.state.send_modify(|state| state.staging_error = Some(message));
                match self.inner.image_failure {
                    ImageFailurePolicy::ProceedWithoutImage => Ok(None),
                    ImageFailurePolicy::Abort => Err(err),
                }
            }
        }
    }

    /// Run `command` as a tracked task. The receiver resolves when it
    /// completes, or errors if the task was aborted by `shutdown`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(&self, command: Command) -> oneshot::Receiver<Outcome> {
        let (tx, rx) = oneshot::channel();
        let store = self.clone();
        let mut tasks = self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let outcome = store.run(command).await;
            // The caller may have stopped listening.
            let _ = tx.send(outcome);
        });
        rx
    }

    /// Abort every dispatched command still in flight. Aborted commands
    /// write nothing further to the state.
    pub fn shutdown(&self) {
        let mut tasks = self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if !tasks.is_empty() {
            debug!(count = tasks.len(), "aborting in-flight commands");
        }
        tasks.abort_all();
    }

    async fn run(&self, command: Command) -> Outcome {
        match command {
            Command::Refresh => Outcome::Refreshed(self.refresh().await),
            Command::Select(id) => Outcome::Selected(self.select(id).await),
            Command::Create { input, image } => Outcome::Created(self.create(input, image).await),
            Command::Update { id, fields, image } => Outcome::Updated(self.update(id, fields, image).await),
            Command::Remove(id) => Outcome::Removed(self.remove(id).await),
        }
    }

    fn begin(&self) -> Loading<'_> {
        let in_flight = &self.inner.in_flight;
        self.inner.state.send_modify(|state| {
            in_flight.fetch_add(1, Ordering::SeqCst);
            state.loading = true;
        });
        Loading { inner: &self.inner }
    }

    fn fail(&self, command: &'static str, err: ApiError) {
        warn!(command, error = %err, "command failed");
        let message = err.to_string();
        self.inner.state.send_modify(|state| state.error = Some(message));
    }

    /// Apply `update` unless a newer command has taken a token from `seq`.
    /// The check runs under the state lock so it cannot interleave with
    /// another writer.
    fn apply_if_current(
        &self,
        seq: &AtomicU64,
        token: u64,
        command: &'static str,
        update: impl FnOnce(&mut StoreState),
    ) -> bool {
        let applied = self.inner.state.send_if_modified(|state| {
            if seq.load(Ordering::SeqCst) != token {
                return false;
            }
            update(state);
            true
        });
        if !applied {
            debug!(command, token, "discarding superseded response");
        }
        applied
    }
}

fn next_token(seq: &AtomicU64) -> u64 {
    seq.fetch_add(1, Ordering::SeqCst) + 1
}
