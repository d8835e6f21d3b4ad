//! Certificates carried as serialized single-certificate stores.
//!
//! Encoding goes through a scratch in-memory store: the certificate is
//! added, the store is sized, then serialized into caller-owned native
//! memory. Decoding opens a read-only store over the blob and takes its
//! first certificate. The store handle is closed on every path.

use std::sync::Arc;

use crate::domain::Certificate;
use crate::error::CollabError;
use crate::native::{CollabPlatform, NativeBlob, NativeBuffer, ScopedStore};

/// Serializes `certificate` into native memory.
///
/// Returns the blob descriptor and the buffer it points into; the blob stays
/// valid for as long as the buffer is alive.
///
/// # Errors
///
/// Returns [`CollabError::Platform`] with the OS code of the first failing
/// store or allocation call. No native memory survives a failure.
pub fn encode_certificate(
    platform: &Arc<dyn CollabPlatform>,
    certificate: &Certificate,
) -> Result<(NativeBlob, NativeBuffer), CollabError> {
    let store = platform
        .open_store_in_memory()
        .map_err(|code| CollabError::platform("CertOpenStore", code))?;
    let store = ScopedStore::new(&**platform, store);

    platform
        .add_certificate(store.handle(), certificate.der())
        .map_err(|code| CollabError::platform("CertAddCertificateContextToStore", code))?;

    let size = platform
        .save_store_to_memory(store.handle(), None)
        .map_err(|code| CollabError::platform("CertSaveStore", code))?;
    let buffer = NativeBuffer::alloc(platform, size)
        .map_err(|code| CollabError::platform("LocalAlloc", code))?;
    let written = platform
        .save_store_to_memory(store.handle(), Some((buffer.handle(), size)))
        .map_err(|code| CollabError::platform("CertSaveStore", code))?;

    tracing::trace!(bytes = written, "certificate serialized");
    Ok((
        NativeBlob {
            cb_data: written,
            pb_data: buffer.handle(),
        },
        buffer,
    ))
}

/// Reads the first certificate out of a serialized store.
///
/// An empty blob yields `None` without touching the store API.
///
/// # Errors
///
/// Returns [`CollabError::Platform`] if the store cannot be opened or read.
pub fn decode_certificate(
    platform: &dyn CollabPlatform,
    blob: &NativeBlob,
) -> Result<Option<Certificate>, CollabError> {
    if blob.is_empty() {
        return Ok(None);
    }
    let store = platform
        .open_store_from_blob(blob)
        .map_err(|code| CollabError::platform("CertOpenStore", code))?;
    let store = ScopedStore::new(platform, store);
    let der = platform
        .first_certificate(store.handle())
        .map_err(|code| CollabError::platform("CertEnumCertificatesInStore", code))?;
    Ok(der.map(Certificate::from_der))
}
