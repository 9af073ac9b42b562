//! Owner-scoped record types.
//!
//! Records live in per-identity ordered collections. Medications are created
//! and deleted by the owning identity; consultations are written by an
//! external clinical workflow and are read-only from the client.

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    env::{Environment, Timestamp},
    store::RecordCollection,
};

/// Identifier of a single record within its owner-scoped collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap a raw record id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id from environment randomness.
    pub fn generate(env: &impl Environment) -> Self {
        Self(format!("{:016x}{:016x}", env.random_u64(), env.random_u64()))
    }

    /// Raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record type that lives in an owner-scoped, ordered collection.
///
/// The ordering key is hoisted into the document envelope so the store can
/// order snapshots without decoding bodies.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection this record type lives in.
    const COLLECTION: RecordCollection;

    /// Record id within the owner's collection.
    fn id(&self) -> &RecordId;

    /// Ordering key; snapshots are delivered descending on this value.
    fn order_key(&self) -> Timestamp;
}

/// A medication entry in the owner's box.
///
/// Created and deleted by the owning identity; there is no update operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationRecord {
    /// Record id.
    pub id: RecordId,
    /// Medication name, e.g. "Paracetamol".
    pub name: String,
    /// Dosage description, e.g. "500mg".
    pub dosage: String,
    /// Creation time; ordering key.
    pub created_at: Timestamp,
}

impl Record for MedicationRecord {
    const COLLECTION: RecordCollection = RecordCollection::Medications;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn order_key(&self) -> Timestamp {
        self.created_at
    }
}

/// A consultation entry written by the clinical workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultationRecord {
    /// Record id.
    pub id: RecordId,
    /// Consultation date; ordering key.
    pub date: Timestamp,
    /// Name of the consulting doctor.
    pub doctor_name: String,
    /// Notes typed during the consultation.
    pub typed_notes: String,
}

impl Record for ConsultationRecord {
    const COLLECTION: RecordCollection = RecordCollection::Consultations;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn order_key(&self) -> Timestamp {
        self.date
    }
}
