//! Fuzz target for document body decoding
//!
//! This fuzzer tests CBOR body decoding with:
//! - Malformed CBOR data
//! - Type confusion (a body decoded as the wrong record type)
//! - Oversized strings or collections
//! - Nested structures exceeding depth limits
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use medbox_core::{
    ConsultationRecord, Document, DocumentId, MedicationRecord, PatientSecret, ProfileRecord,
    Timestamp,
};

fuzz_target!(|data: &[u8]| {
    let doc = Document {
        id: DocumentId::new("fuzz"),
        order_key: Timestamp::ZERO,
        body: Bytes::copy_from_slice(data),
    };

    // Every record type the client ever decodes a body into. Decoding must
    // only ever return Err for invalid input.
    let _ = doc.decode::<ProfileRecord>();
    let _ = doc.decode::<PatientSecret>();
    let _ = doc.decode::<MedicationRecord>();
    let _ = doc.decode::<ConsultationRecord>();
});
