//! Conversions between native records and domain values.
//!
//! [`guid`], [`address`] and [`credential`] handle the leaf formats;
//! [`record`] composes them for whole contact, endpoint, application,
//! object, presence and event records. Encoders that allocate native memory
//! return a [`Marshaled`] value that owns every buffer the record points at.

pub mod address;
pub mod credential;
pub mod guid;
pub mod record;

pub use address::{decode_address, encode_address};
pub use credential::{decode_certificate, encode_certificate};
pub use guid::{decode_guid, encode_guid};
pub use record::{
    decode_application, decode_contact, decode_endpoint, decode_event, decode_object,
    decode_presence, encode_application, encode_contact, encode_data, encode_endpoint,
    encode_event, encode_object, encode_presence,
};

use crate::error::CollabError;
use crate::native::{CollabPlatform, NativeBlob, NativeBuffer};

/// A native record together with the native memory it references.
///
/// Dropping the value frees the memory, so the record must not be handed to
/// the native side after the `Marshaled` is gone.
#[derive(Debug)]
pub struct Marshaled<T> {
    record: T,
    memory: Vec<NativeBuffer>,
}

impl<T> Marshaled<T> {
    pub(crate) fn new(record: T, memory: Vec<NativeBuffer>) -> Self {
        Self { record, memory }
    }

    /// Returns the native record.
    #[must_use]
    pub fn record(&self) -> &T {
        &self.record
    }

    /// Returns the number of native allocations held.
    #[must_use]
    pub fn allocations(&self) -> usize {
        self.memory.len()
    }

    /// Splits into the record and the buffers keeping it valid.
    #[must_use]
    pub fn into_parts(self) -> (T, Vec<NativeBuffer>) {
        (self.record, self.memory)
    }
}

/// Copies the bytes a blob points at. Empty blobs read as an empty vector.
pub(crate) fn read_blob(
    platform: &dyn CollabPlatform,
    blob: &NativeBlob,
) -> Result<Vec<u8>, CollabError> {
    if blob.is_empty() {
        return Ok(Vec::new());
    }
    platform
        .read_memory(blob.pb_data, blob.cb_data)
        .map_err(|code| CollabError::platform("ReadNativeBlob", code))
}
