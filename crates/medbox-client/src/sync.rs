//! Realtime collection synchronization.
//!
//! A [`CollectionSynchronizer`] materializes a live, ordered view of one
//! owner-scoped record collection and exposes the mutations the owner may
//! perform. The materialized list is always a verbatim projection of the
//! latest snapshot pushed by the store - never an incremental merge, never
//! hand-patched. Mutations are not applied optimistically: the list changes
//! only when the next snapshot arrives.

use std::marker::PhantomData;

use medbox_core::{
    CollectionRef, DocPath, Document, DocumentId, DocumentStore, Environment, IdentityId, Record,
    RecordId, Snapshot, StoreError, Timestamp,
};
use thiserror::Error;

/// Errors surfaced by collection operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A required field was empty or blank after trimming.
    #[error("{field} must not be empty")]
    EmptyField {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A mutation was attempted with no attached owner.
    #[error("no owner attached")]
    NotAttached,

    /// Store operation failed; retryable per [`StoreError::is_transient`].
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// New-record input validated and stamped by [`CollectionSynchronizer::create`].
pub trait Draft: Send {
    /// Record type this draft produces.
    type Record: Record;

    /// Check required fields; no side effects on failure.
    fn validate(&self) -> Result<(), SyncError>;

    /// Build the record with its assigned id and ordering timestamp.
    fn into_record(self, id: RecordId, at: Timestamp) -> Self::Record;
}

/// Draft of a medication entry.
///
/// Consultations have no draft: they are written by the clinical workflow,
/// never by this client.
#[derive(Debug, Clone)]
pub struct NewMedication {
    /// Medication name.
    pub name: String,
    /// Dosage description.
    pub dosage: String,
}

impl Draft for NewMedication {
    type Record = medbox_core::MedicationRecord;

    fn validate(&self) -> Result<(), SyncError> {
        if self.name.trim().is_empty() {
            return Err(SyncError::EmptyField { field: "name" });
        }
        if self.dosage.trim().is_empty() {
            return Err(SyncError::EmptyField { field: "dosage" });
        }
        Ok(())
    }

    fn into_record(self, id: RecordId, at: Timestamp) -> Self::Record {
        medbox_core::MedicationRecord {
            id,
            name: self.name.trim().to_string(),
            dosage: self.dosage.trim().to_string(),
            created_at: at,
        }
    }
}

/// Live, ordered mirror of one owner-scoped record collection.
///
/// # Lifecycle
///
/// Exactly one subscription is active per synchronizer. [`attach`] must be
/// re-invoked whenever the owner identity changes; [`detach`] is idempotent.
/// A snapshot whose scope does not match the attached owner is dropped, so a
/// stale feed can never deliver into a mismatched context.
///
/// [`attach`]: CollectionSynchronizer::attach
/// [`detach`]: CollectionSynchronizer::detach
pub struct CollectionSynchronizer<R: Record, S: DocumentStore> {
    store: S,
    owner: Option<IdentityId>,
    subscription: Option<medbox_core::Subscription>,
    records: Vec<R>,
    _record: PhantomData<R>,
}

impl<R: Record, S: DocumentStore> CollectionSynchronizer<R, S> {
    /// Create a detached synchronizer over the given store.
    pub fn new(store: S) -> Self {
        Self { store, owner: None, subscription: None, records: Vec::new(), _record: PhantomData }
    }

    /// Open a subscription scoped to `owner`, releasing any prior one.
    ///
    /// The store pushes an initial snapshot immediately; until it is applied
    /// the materialized list is empty, never carried over from a previous
    /// owner. On failure the synchronizer is left not-live with the owner
    /// retained, the same sync-lost condition [`reattach`](Self::reattach)
    /// recovers from.
    pub fn attach(&mut self, owner: IdentityId) -> Result<(), SyncError> {
        self.detach();
        let scope = CollectionRef::new(R::COLLECTION, owner.clone());
        self.owner = Some(owner);
        let subscription = self.store.subscribe(scope)?;
        self.subscription = Some(subscription);
        Ok(())
    }

    /// Release the subscription and clear all local state. Idempotent.
    pub fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.owner = None;
        self.records.clear();
    }

    /// Re-open the subscription for the current owner after sync loss.
    pub fn reattach(&mut self) -> Result<(), SyncError> {
        let owner = self.owner.clone().ok_or(SyncError::NotAttached)?;
        self.attach(owner)
    }

    /// Owner the synchronizer is attached to, if any.
    pub fn owner(&self) -> Option<&IdentityId> {
        self.owner.as_ref()
    }

    /// True while the live feed is healthy.
    ///
    /// Flips false when the store closes the feed; the owner is retained so
    /// [`reattach`](Self::reattach) can recover, and the caller should show
    /// a sync-lost indicator meanwhile.
    pub fn is_live(&self) -> bool {
        self.subscription.is_some()
    }

    /// Await the next pushed snapshot.
    ///
    /// Returns `None` when detached or when the feed closes; a closed feed
    /// marks the synchronizer not-live.
    pub async fn next_snapshot(&mut self) -> Option<Snapshot> {
        let subscription = self.subscription.as_mut()?;
        match subscription.next_snapshot().await {
            Some(snapshot) => Some(snapshot),
            None => {
                tracing::warn!(collection = %R::COLLECTION, "live query feed closed");
                self.subscription = None;
                None
            },
        }
    }

    /// Take a snapshot if one is already queued.
    pub fn try_next_snapshot(&mut self) -> Option<Snapshot> {
        self.subscription.as_mut()?.try_next()
    }

    /// Replace the materialized list with `snapshot`.
    ///
    /// The list becomes a verbatim projection of the snapshot, in delivered
    /// order. Snapshots for a different scope than the attached owner are
    /// dropped and leave the list untouched.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), SyncError> {
        let expected_scope = snapshot.scope.collection == R::COLLECTION
            && self.owner.as_ref() == Some(&snapshot.scope.owner);
        if !expected_scope {
            tracing::warn!(
                scope = ?snapshot.scope,
                attached = ?self.owner,
                "dropping snapshot for mismatched scope"
            );
            return Ok(());
        }

        let mut records = Vec::with_capacity(snapshot.docs.len());
        for doc in &snapshot.docs {
            records.push(doc.decode::<R>()?);
        }
        self.records = records;
        Ok(())
    }

    /// Materialized records, ordered as delivered by the store.
    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Validate `draft`, stamp it, and write it under the owner's scope.
    ///
    /// The local list is not touched; the new record appears when the next
    /// snapshot arrives.
    pub async fn create<D, E>(&self, draft: D, env: &E) -> Result<RecordId, SyncError>
    where
        D: Draft<Record = R>,
        E: Environment,
    {
        let owner = self.owner.clone().ok_or(SyncError::NotAttached)?;
        draft.validate()?;

        let id = RecordId::generate(env);
        let record = draft.into_record(id.clone(), env.now());
        let doc = Document::encode(DocumentId::from(&id), record.order_key(), &record)?;
        let scope = CollectionRef::new(R::COLLECTION, owner);
        self.store.set(&DocPath::record(scope, id.clone()), doc).await?;
        Ok(id)
    }

    /// Delete the record `id` under the owner's scope.
    pub async fn delete(&self, id: &RecordId) -> Result<(), SyncError> {
        let owner = self.owner.clone().ok_or(SyncError::NotAttached)?;
        let scope = CollectionRef::new(R::COLLECTION, owner);
        self.store.delete(&DocPath::record(scope, id.clone())).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use medbox_core::{MedicationRecord, RecordCollection};
    use medbox_harness::{FaultTarget, MemoryStore, SimEnv};

    use super::*;

    fn med(id: &str, at: u64) -> MedicationRecord {
        MedicationRecord {
            id: RecordId::new(id),
            name: "Paracetamol".to_string(),
            dosage: "500mg".to_string(),
            created_at: Timestamp(at),
        }
    }

    fn snapshot_of(owner: &IdentityId, records: &[MedicationRecord]) -> Snapshot {
        let docs = records
            .iter()
            .map(|r| Document::encode(DocumentId::from(&r.id), r.order_key(), r).unwrap())
            .collect();
        Snapshot {
            scope: CollectionRef::new(RecordCollection::Medications, owner.clone()),
            docs,
        }
    }

    #[test]
    fn draft_validation_trims_fields() {
        let blank = NewMedication { name: "   ".to_string(), dosage: "500mg".to_string() };
        assert_eq!(blank.validate(), Err(SyncError::EmptyField { field: "name" }));

        let blank = NewMedication { name: "Ibuprofen".to_string(), dosage: "".to_string() };
        assert_eq!(blank.validate(), Err(SyncError::EmptyField { field: "dosage" }));
    }

    #[test]
    fn snapshot_replaces_list_verbatim() {
        let owner = IdentityId::new("u1");
        let store = MemoryStore::new();
        let mut sync: CollectionSynchronizer<MedicationRecord, _> =
            CollectionSynchronizer::new(store);
        sync.attach(owner.clone()).unwrap();

        sync.apply_snapshot(&snapshot_of(&owner, &[med("a", 1)])).unwrap();
        assert_eq!(sync.records().len(), 1);

        let second = [med("b", 2), med("a", 1)];
        sync.apply_snapshot(&snapshot_of(&owner, &second)).unwrap();
        assert_eq!(sync.records(), &second);
    }

    #[test]
    fn mismatched_owner_snapshot_is_dropped() {
        let u1 = IdentityId::new("u1");
        let u2 = IdentityId::new("u2");
        let store = MemoryStore::new();
        let mut sync: CollectionSynchronizer<MedicationRecord, _> =
            CollectionSynchronizer::new(store);
        sync.attach(u1.clone()).unwrap();
        sync.apply_snapshot(&snapshot_of(&u1, &[med("a", 1)])).unwrap();

        sync.apply_snapshot(&snapshot_of(&u2, &[med("x", 9)])).unwrap();
        assert_eq!(sync.records(), &[med("a", 1)]);
    }

    #[test]
    fn detach_is_idempotent_and_clears_records() {
        let owner = IdentityId::new("u1");
        let store = MemoryStore::new();
        let mut sync: CollectionSynchronizer<MedicationRecord, _> =
            CollectionSynchronizer::new(store);
        sync.attach(owner.clone()).unwrap();
        sync.apply_snapshot(&snapshot_of(&owner, &[med("a", 1)])).unwrap();

        sync.detach();
        assert!(sync.records().is_empty());
        assert!(sync.owner().is_none());
        sync.detach();
    }

    #[test]
    fn failed_attach_keeps_owner_for_reattach() {
        let owner = IdentityId::new("u1");
        let store = MemoryStore::new();
        store.set_read_fault(
            FaultTarget::Records(RecordCollection::Medications),
            StoreError::Io("backend down".to_string()),
        );
        let mut sync: CollectionSynchronizer<MedicationRecord, _> =
            CollectionSynchronizer::new(store.clone());

        assert!(sync.attach(owner.clone()).is_err());
        assert!(!sync.is_live());
        assert_eq!(sync.owner(), Some(&owner));

        store.clear_read_fault(FaultTarget::Records(RecordCollection::Medications));
        sync.reattach().unwrap();
        assert!(sync.is_live());
    }

    #[tokio::test]
    async fn delete_issues_one_owner_scoped_call() {
        let owner = IdentityId::new("u1");
        let store = MemoryStore::new();
        let mut sync: CollectionSynchronizer<MedicationRecord, _> =
            CollectionSynchronizer::new(store.clone());
        sync.attach(owner.clone()).unwrap();

        sync.delete(&RecordId::new("a")).await.unwrap();
        let log = store.delete_log();
        assert_eq!(log.len(), 1);
        match &log[0] {
            DocPath::Record { scope, id } => {
                assert_eq!(scope.owner, owner);
                assert_eq!(id.as_str(), "a");
            },
            other => panic!("unexpected path {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_requires_attachment() {
        let store = MemoryStore::new();
        let sync: CollectionSynchronizer<MedicationRecord, _> =
            CollectionSynchronizer::new(store);
        let draft =
            NewMedication { name: "Paracetamol".to_string(), dosage: "500mg".to_string() };
        let err = sync.create(draft, &SimEnv::with_seed(1)).await.unwrap_err();
        assert_eq!(err, SyncError::NotAttached);
    }
}
