//! 128-bit identifiers in native five-field form.

use uuid::Uuid;

use crate::native::NativeGuid;

/// Converts an identifier to its native record. The nil identifier yields a
/// zeroed record.
#[must_use]
pub fn encode_guid(id: &Uuid) -> NativeGuid {
    let (data1, data2, data3, data4) = id.as_fields();
    NativeGuid {
        data1,
        data2,
        data3,
        data4: *data4,
    }
}

/// Rebuilds an identifier from its native record.
///
/// The three integer fields are laid out little-endian, followed by the
/// eight literal bytes.
#[must_use]
pub fn decode_guid(native: &NativeGuid) -> Uuid {
    let mut bytes = [0u8; 16];
    let source = native
        .data1
        .to_le_bytes()
        .into_iter()
        .chain(native.data2.to_le_bytes())
        .chain(native.data3.to_le_bytes())
        .chain(native.data4);
    for (dst, src) in bytes.iter_mut().zip(source) {
        *dst = src;
    }
    Uuid::from_bytes_le(bytes)
}
