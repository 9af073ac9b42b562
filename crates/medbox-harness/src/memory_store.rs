//! In-memory document store with live query push.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use medbox_core::{
    CollectionRef, DocPath, Document, DocumentStore, IdentityId, RecordCollection, Snapshot,
    StoreError, Subscription,
};
use tokio::sync::mpsc;

/// Document group a fault is injected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultTarget {
    /// Profile documents.
    Profiles,
    /// Patient secret documents.
    PatientSecrets,
    /// One record collection.
    Records(RecordCollection),
}

impl FaultTarget {
    fn of(path: &DocPath) -> Self {
        match path {
            DocPath::Profile(_) => FaultTarget::Profiles,
            DocPath::PatientSecret(_) => FaultTarget::PatientSecrets,
            DocPath::Record { scope, .. } => FaultTarget::Records(scope.collection),
        }
    }
}

struct Subscriber {
    id: u64,
    scope: CollectionRef,
    tx: mpsc::UnboundedSender<Snapshot>,
}

struct MemoryStoreInner {
    /// Profile documents keyed by identity.
    profiles: HashMap<IdentityId, Document>,

    /// Patient secret documents keyed by identity.
    secrets: HashMap<IdentityId, Document>,

    /// Record documents per collection scope, in insertion order.
    records: HashMap<CollectionRef, Vec<Document>>,

    /// Live query subscribers.
    subscribers: Vec<Subscriber>,
    next_subscriber_id: u64,

    /// Injected faults, applied before the operation takes effect.
    read_faults: HashMap<FaultTarget, StoreError>,
    write_faults: HashMap<FaultTarget, StoreError>,

    /// Operation logs for test assertions.
    set_log: Vec<DocPath>,
    delete_log: Vec<DocPath>,
}

/// In-memory store implementation for testing and simulation.
///
/// All state is wrapped in `Arc<Mutex<_>>` so clones share one store, the
/// way every component shares one backend in production. Snapshot push is
/// synchronous with the mutating call: by the time `set` or `delete`
/// returns, every in-scope subscriber has the new snapshot queued.
///
/// # Panics
///
/// Operations panic if the internal mutex is poisoned (a thread panicked
/// while holding the lock). Acceptable for test code.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner {
                profiles: HashMap::new(),
                secrets: HashMap::new(),
                records: HashMap::new(),
                subscribers: Vec::new(),
                next_subscriber_id: 0,
                read_faults: HashMap::new(),
                write_faults: HashMap::new(),
                set_log: Vec::new(),
                delete_log: Vec::new(),
            })),
        }
    }

    /// Fail every write (`set`/`delete`) hitting `target` with `error` until
    /// cleared.
    #[allow(clippy::expect_used)]
    pub fn set_write_fault(&self, target: FaultTarget, error: StoreError) {
        self.inner.lock().expect("Mutex poisoned").write_faults.insert(target, error);
    }

    /// Clear the write fault for `target`.
    #[allow(clippy::expect_used)]
    pub fn clear_write_fault(&self, target: FaultTarget) {
        self.inner.lock().expect("Mutex poisoned").write_faults.remove(&target);
    }

    /// Fail every read hitting `target` with `error` until cleared.
    #[allow(clippy::expect_used)]
    pub fn set_read_fault(&self, target: FaultTarget, error: StoreError) {
        self.inner.lock().expect("Mutex poisoned").read_faults.insert(target, error);
    }

    /// Clear the read fault for `target`.
    #[allow(clippy::expect_used)]
    pub fn clear_read_fault(&self, target: FaultTarget) {
        self.inner.lock().expect("Mutex poisoned").read_faults.remove(&target);
    }

    /// Close every live feed over `scope` without unregistering it, as a
    /// backend dropping its push connection would. Attached synchronizers
    /// observe a closed feed (sync lost).
    #[allow(clippy::expect_used)]
    pub fn drop_feeds(&self, scope: &CollectionRef) {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        tracing::debug!(?scope, "dropping live feeds");
        inner.subscribers.retain(|s| s.scope != *scope);
    }

    /// Paths written so far, in call order.
    #[allow(clippy::expect_used)]
    pub fn set_log(&self) -> Vec<DocPath> {
        self.inner.lock().expect("Mutex poisoned").set_log.clone()
    }

    /// Paths deleted so far, in call order.
    #[allow(clippy::expect_used)]
    pub fn delete_log(&self) -> Vec<DocPath> {
        self.inner.lock().expect("Mutex poisoned").delete_log.clone()
    }

    /// Number of live subscribers, across all scopes.
    #[allow(clippy::expect_used)]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").subscribers.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    /// Full ordered snapshot for `scope`: order key descending, ties keep
    /// insertion order (stable but deliberately unspecified to callers).
    fn snapshot(&self, scope: &CollectionRef) -> Snapshot {
        let mut docs = self.records.get(scope).cloned().unwrap_or_default();
        docs.sort_by(|a, b| b.order_key.cmp(&a.order_key));
        Snapshot { scope: scope.clone(), docs }
    }

    fn notify(&mut self, scope: &CollectionRef) {
        let snapshot = self.snapshot(scope);
        // Senders with a gone receiver are pruned on the way.
        self.subscribers.retain(|s| {
            if s.scope != *scope {
                return true;
            }
            s.tx.send(snapshot.clone()).is_ok()
        });
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. Acceptable for test code.
    #[allow(clippy::expect_used)]
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        if let Some(error) = inner.read_faults.get(&FaultTarget::of(path)) {
            return Err(error.clone());
        }
        let doc = match path {
            DocPath::Profile(id) => inner.profiles.get(id).cloned(),
            DocPath::PatientSecret(id) => inner.secrets.get(id).cloned(),
            DocPath::Record { scope, id } => inner
                .records
                .get(scope)
                .and_then(|docs| docs.iter().find(|d| d.id.as_str() == id.as_str()).cloned()),
        };
        Ok(doc)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. Acceptable for test code.
    #[allow(clippy::expect_used)]
    async fn set(&self, path: &DocPath, doc: Document) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        if let Some(error) = inner.write_faults.get(&FaultTarget::of(path)) {
            return Err(error.clone());
        }
        inner.set_log.push(path.clone());
        match path {
            DocPath::Profile(id) => {
                inner.profiles.insert(id.clone(), doc);
            },
            DocPath::PatientSecret(id) => {
                inner.secrets.insert(id.clone(), doc);
            },
            DocPath::Record { scope, .. } => {
                let docs = inner.records.entry(scope.clone()).or_default();
                match docs.iter_mut().find(|d| d.id == doc.id) {
                    Some(existing) => *existing = doc,
                    None => docs.push(doc),
                }
                inner.notify(scope);
            },
        }
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. Acceptable for test code.
    #[allow(clippy::expect_used)]
    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        if let Some(error) = inner.write_faults.get(&FaultTarget::of(path)) {
            return Err(error.clone());
        }
        inner.delete_log.push(path.clone());
        match path {
            DocPath::Profile(id) => {
                inner.profiles.remove(id);
            },
            DocPath::PatientSecret(id) => {
                inner.secrets.remove(id);
            },
            DocPath::Record { scope, id } => {
                if let Some(docs) = inner.records.get_mut(scope) {
                    docs.retain(|d| d.id.as_str() != id.as_str());
                }
                inner.notify(scope);
            },
        }
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. Acceptable for test code.
    #[allow(clippy::expect_used)]
    fn subscribe(&self, scope: CollectionRef) -> Result<Subscription, StoreError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        if let Some(error) = inner.read_faults.get(&FaultTarget::Records(scope.collection)) {
            return Err(error.clone());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = inner.next_subscriber_id;
        inner.next_subscriber_id += 1;

        // Initial snapshot is queued before the handle is even returned.
        let initial = inner.snapshot(&scope);
        let _ = tx.send(initial);
        inner.subscribers.push(Subscriber { id, scope: scope.clone(), tx });

        let registry = Arc::clone(&self.inner);
        let cancel = move || {
            if let Ok(mut inner) = registry.lock() {
                inner.subscribers.retain(|s| s.id != id);
            }
        };
        Ok(Subscription::new(scope, rx, cancel))
    }
}
