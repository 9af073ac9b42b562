//! Document store contract.
//!
//! The store is an opaque external service exposing document read, write,
//! delete, and ordered live-query subscriptions. Persistence internals,
//! transport, and retry behavior are the service's concern; this module only
//! fixes the contract the client requires and the types crossing it.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{env::Timestamp, identity::IdentityId, record::RecordId};

/// Errors that can occur during store operations.
///
/// Kept `Clone` because resolution failures are held in session state so the
/// UI can show the cause and offer a retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Transport or backend failure; retryable.
    #[error("store unavailable: {0}")]
    Io(String),

    /// Document body could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A live query feed was closed by the store.
    #[error("subscription lost")]
    SubscriptionLost,
}

impl StoreError {
    /// Returns true if the operation may succeed on retry.
    ///
    /// Serialization failures are never transient - the document itself is
    /// malformed and retrying cannot help.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::SubscriptionLost)
    }
}

/// Record collections the client subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordCollection {
    /// Per-identity medication entries, ordered by creation time descending.
    Medications,
    /// Per-identity consultation history, ordered by date descending.
    Consultations,
}

impl fmt::Display for RecordCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordCollection::Medications => f.write_str("medications"),
            RecordCollection::Consultations => f.write_str("consultations"),
        }
    }
}

/// Scope of a live query: one record collection under one owner identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    /// Record collection.
    pub collection: RecordCollection,
    /// Identity the collection is partitioned under.
    pub owner: IdentityId,
}

impl CollectionRef {
    /// Create a scope for `collection` under `owner`.
    pub fn new(collection: RecordCollection, owner: IdentityId) -> Self {
        Self { collection, owner }
    }
}

/// Address of a single document in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocPath {
    /// The role-defining profile document, keyed by identity id.
    Profile(IdentityId),
    /// The patient secret document, keyed by identity id.
    PatientSecret(IdentityId),
    /// A record within an owner-scoped collection.
    Record {
        /// Collection scope.
        scope: CollectionRef,
        /// Record id within the scope.
        id: RecordId,
    },
}

impl DocPath {
    /// Profile document path for an identity.
    pub fn profile(identity: &IdentityId) -> Self {
        DocPath::Profile(identity.clone())
    }

    /// Patient secret document path for an identity.
    pub fn patient_secret(identity: &IdentityId) -> Self {
        DocPath::PatientSecret(identity.clone())
    }

    /// Record document path within a collection scope.
    pub fn record(scope: CollectionRef, id: RecordId) -> Self {
        DocPath::Record { scope, id }
    }
}

/// Key of a document within its collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap a raw document key.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&IdentityId> for DocumentId {
    fn from(id: &IdentityId) -> Self {
        Self(id.as_str().to_string())
    }
}

impl From<&RecordId> for DocumentId {
    fn from(id: &RecordId) -> Self {
        Self(id.as_str().to_string())
    }
}

/// A stored document: key, ordering key, and CBOR-encoded body.
///
/// The ordering key is part of the envelope, not the body, so the store can
/// order query results without understanding record schemas. Documents with
/// no ordering concern (profile, secret) carry [`Timestamp::ZERO`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Document key within its collection.
    pub id: DocumentId,
    /// Ordering key for live queries.
    pub order_key: Timestamp,
    /// CBOR-encoded body.
    pub body: Bytes,
}

impl Document {
    /// Encode `value` into a document.
    pub fn encode<T: Serialize>(
        id: DocumentId,
        order_key: Timestamp,
        value: &T,
    ) -> Result<Self, StoreError> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Self { id, order_key, body: Bytes::from(buf) })
    }

    /// Decode the body into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        ciborium::de::from_reader(self.body.as_ref())
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

/// A complete, ordered materialization of a live query's current result set.
///
/// Pushed by the store on attach and on every change in scope. The document
/// order is descending on the envelope ordering key; ties are store-defined
/// (stable but unspecified - callers must not rely on id order).
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Scope the snapshot was produced for.
    pub scope: CollectionRef,
    /// Ordered documents.
    pub docs: Vec<Document>,
}

/// A live query handle.
///
/// Exactly one subscription is active per (collection, owner) pair per
/// consumer. The handle must be released with [`Subscription::cancel`] when
/// the owning view unmounts or the owner identity changes; cancellation is
/// explicit and deterministic, never left to drop order.
pub struct Subscription {
    scope: CollectionRef,
    rx: mpsc::UnboundedReceiver<Snapshot>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Create a handle from its parts.
    ///
    /// `cancel` must deterministically unregister the feed; it is invoked at
    /// most once.
    pub fn new(
        scope: CollectionRef,
        rx: mpsc::UnboundedReceiver<Snapshot>,
        cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self { scope, rx, cancel: Some(Box::new(cancel)) }
    }

    /// Scope this subscription was opened for.
    pub fn scope(&self) -> &CollectionRef {
        &self.scope
    }

    /// Await the next snapshot. `None` means the feed was closed by the
    /// store (sync lost).
    pub async fn next_snapshot(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    /// Take a snapshot if one is already queued.
    pub fn try_next(&mut self) -> Option<Snapshot> {
        self.rx.try_recv().ok()
    }

    /// Release the subscription.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("scope", &self.scope).finish_non_exhaustive()
    }
}

/// Document store contract.
///
/// Implementations share internal state across clones (typically via `Arc`)
/// so one store instance can serve every component. All methods suspend the
/// caller until the service responds; the caller stays responsive by
/// treating each call as an await point.
#[async_trait]
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Read a single document. `Ok(None)` means the document does not exist.
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;

    /// Write a document, replacing any existing one at `path`.
    async fn set(&self, path: &DocPath, doc: Document) -> Result<(), StoreError>;

    /// Delete the document at `path`. Deleting a missing document is not an
    /// error.
    async fn delete(&self, path: &DocPath) -> Result<(), StoreError>;

    /// Open a live query over `scope`.
    ///
    /// The store delivers a full ordered snapshot immediately and again on
    /// every change in scope, until the handle is cancelled.
    fn subscribe(&self, scope: CollectionRef) -> Result<Subscription, StoreError>;
}
