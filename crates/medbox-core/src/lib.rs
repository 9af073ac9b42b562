//! Core domain model and external-service contracts for the MedBox client.
//!
//! This crate defines WHAT the client talks about (identities, profiles,
//! medication and consultation records) and the contracts it requires from
//! its two external collaborators: the identity provider and the document
//! store. Both collaborators are opaque services; only their observable
//! behavior is specified here.
//!
//! # Components
//!
//! - [`Identity`] / [`IdentityId`]: an authenticated principal
//! - [`Profile`] / [`Role`]: the role-defining document resolved per identity
//! - [`MedicationRecord`] / [`ConsultationRecord`]: owner-scoped records
//! - [`Document`]: CBOR envelope stored and delivered by the store
//! - [`DocumentStore`] / [`Subscription`]: document access and live queries
//! - [`IdentityGateway`]: credential submission and identity notifications
//! - [`Environment`]: time and randomness abstraction for determinism

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod gateway;
pub mod identity;
pub mod profile;
pub mod record;
pub mod store;

pub use env::{Environment, Timestamp};
pub use gateway::{GatewayError, IdentityGateway};
pub use identity::{Identity, IdentityId};
pub use profile::{MedboxId, PatientSecret, Profile, ProfileRecord, Role, SecretHash, UnrecognizedRole};
pub use record::{ConsultationRecord, MedicationRecord, Record, RecordId};
pub use store::{
    CollectionRef, DocPath, Document, DocumentId, DocumentStore, RecordCollection, Snapshot,
    StoreError, Subscription,
};
