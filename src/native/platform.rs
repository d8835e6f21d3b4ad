//! The native surface the bridge binds to.
//!
//! [`CollabPlatform`] lists every native call the codecs and the event
//! registry make. Handles are opaque integers; ownership of each handle is
//! tracked on the Rust side by [`super::OwnedHandle`] and the scoped guards
//! in [`super::handles`].

use std::fmt;
use std::sync::Arc;

use super::types::{EventRegistration, HResult, NativeBlob, NativeEventData};

/// Result of a native call: the value, or the failing status code.
pub type NativeResult<T> = Result<T, HResult>;

/// Callback invoked by the platform thread pool each time a wait object is
/// signaled.
pub type WaitCallback = Arc<dyn Fn() + Send + Sync>;

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub u64);

        impl $name {
            /// The null handle.
            pub const NULL: Self = Self(0);

            /// Returns `true` for the null handle.
            #[must_use]
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#x})", stringify!($name), self.0)
            }
        }
    };
}

native_handle!(
    /// OS auto-reset wait primitive.
    EventHandle
);
native_handle!(
    /// Registration of a wait callback against an [`EventHandle`].
    WaitHandle
);
native_handle!(
    /// Native collaboration event registration.
    RegistrationHandle
);
native_handle!(
    /// Native event record returned by `get_event_data`.
    DataHandle
);
native_handle!(
    /// Native certificate store.
    StoreHandle
);
native_handle!(
    /// Native memory allocation.
    MemHandle
);

/// Outcome of a successful `get_event_data` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPoll {
    /// A record was dequeued; the caller must free it.
    Record(DataHandle),
    /// The queue is empty (`PEER_S_NO_EVENT_DATA`).
    NoMoreData,
}

/// Native collaboration subsystem, OS wait primitives, native memory and
/// the certificate store API.
///
/// Every method reports failure as the raw status code. Implementations
/// must be callable from any thread, including from inside a wait
/// callback.
pub trait CollabPlatform: Send + Sync + fmt::Debug {
    /// Starts the collaboration subsystem.
    ///
    /// # Errors
    ///
    /// Returns the startup status code on failure.
    fn startup(&self, version: u16) -> NativeResult<()>;

    /// Creates an auto-reset wait primitive, initially unsignaled.
    ///
    /// # Errors
    ///
    /// Returns the OS status code on failure.
    fn create_event(&self) -> NativeResult<EventHandle>;

    /// Closes a wait primitive.
    ///
    /// # Errors
    ///
    /// Returns [`super::E_HANDLE`] for an unknown handle.
    fn close_event(&self, event: EventHandle) -> NativeResult<()>;

    /// Registers `callback` to run on the platform pool every time `event`
    /// is signaled, with no timeout.
    ///
    /// # Errors
    ///
    /// Returns the OS status code on failure.
    fn register_wait(&self, event: EventHandle, callback: WaitCallback)
    -> NativeResult<WaitHandle>;

    /// Cancels a wait registration. Does not wait for an in-flight callback.
    ///
    /// # Errors
    ///
    /// Returns [`super::E_HANDLE`] for an unknown handle.
    fn unregister_wait(&self, wait: WaitHandle) -> NativeResult<()>;

    /// Registers for the given event kinds; the subsystem signals `event`
    /// whenever a matching record is queued.
    ///
    /// # Errors
    ///
    /// Returns the native status code on failure.
    fn register_event(
        &self,
        event: EventHandle,
        registrations: &[EventRegistration],
    ) -> NativeResult<RegistrationHandle>;

    /// Dequeues the next record for a registration.
    ///
    /// # Errors
    ///
    /// Returns the native status code on hard failure.
    fn get_event_data(&self, registration: RegistrationHandle) -> NativeResult<EventPoll>;

    /// Reads the structure behind a dequeued record.
    ///
    /// # Errors
    ///
    /// Returns [`super::E_HANDLE`] for an unknown record.
    fn event_record(&self, data: DataHandle) -> NativeResult<NativeEventData>;

    /// Frees a dequeued record and every buffer it points at.
    fn free_data(&self, data: DataHandle);

    /// Releases a native event registration and its queue.
    ///
    /// # Errors
    ///
    /// Returns the native status code on failure.
    fn unregister_event(&self, registration: RegistrationHandle) -> NativeResult<()>;

    /// Allocates `len` bytes of zeroed native memory.
    ///
    /// # Errors
    ///
    /// Returns `E_OUTOFMEMORY` when the allocation fails.
    fn alloc(&self, len: u32) -> NativeResult<MemHandle>;

    /// Frees native memory. Unknown handles are ignored.
    fn free(&self, mem: MemHandle);

    /// Copies the first `len` bytes of an allocation.
    ///
    /// # Errors
    ///
    /// Returns `E_INVALIDARG` if the allocation is unknown or too short.
    fn read_memory(&self, mem: MemHandle, len: u32) -> NativeResult<Vec<u8>>;

    /// Overwrites the start of an allocation with `bytes`.
    ///
    /// # Errors
    ///
    /// Returns `E_INVALIDARG` if the allocation is unknown or too short.
    fn write_memory(&self, mem: MemHandle, bytes: &[u8]) -> NativeResult<()>;

    /// Opens an empty, writable in-memory certificate store.
    ///
    /// # Errors
    ///
    /// Returns the OS status code on failure.
    fn open_store_in_memory(&self) -> NativeResult<StoreHandle>;

    /// Opens a read-only store over a serialized store blob.
    ///
    /// # Errors
    ///
    /// Returns the OS status code when the blob cannot be parsed.
    fn open_store_from_blob(&self, blob: &NativeBlob) -> NativeResult<StoreHandle>;

    /// Adds a DER-encoded certificate to a writable store.
    ///
    /// # Errors
    ///
    /// Returns the OS status code on failure.
    fn add_certificate(&self, store: StoreHandle, der: &[u8]) -> NativeResult<()>;

    /// Serializes a store. With `target == None` only the required size is
    /// returned; otherwise the bytes are written into `target` (memory, capacity).
    ///
    /// # Errors
    ///
    /// Returns `E_MORE_DATA` when the target is too small, or the OS status
    /// code on other failures.
    fn save_store_to_memory(
        &self,
        store: StoreHandle,
        target: Option<(MemHandle, u32)>,
    ) -> NativeResult<u32>;

    /// Returns the DER bytes of the first certificate in a store.
    ///
    /// # Errors
    ///
    /// Returns [`super::E_HANDLE`] for an unknown store.
    fn first_certificate(&self, store: StoreHandle) -> NativeResult<Option<Vec<u8>>>;

    /// Closes a certificate store.
    fn close_store(&self, store: StoreHandle);
}
