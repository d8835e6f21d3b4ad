//! Native collaboration surface: record layouts, the platform trait, handle
//! ownership and an in-process platform.

pub mod handles;
pub mod loopback;
pub mod platform;
pub mod types;

pub use handles::{HandleState, NativeBuffer, OwnedHandle, Releasable, ScopedData, ScopedStore};
pub use loopback::{LoopbackPlatform, LoopbackStats, NativeOp};
pub use platform::{
    CollabPlatform, DataHandle, EventHandle, EventPoll, MemHandle, NativeResult,
    RegistrationHandle, StoreHandle, WaitCallback, WaitHandle,
};
pub use types::{
    AF_INET6, CRYPT_E_BAD_ENCODE, CollabEventType, E_HANDLE, E_INVALIDARG, E_MORE_DATA,
    E_OUTOFMEMORY, EventRegistration, HResult, MAX_ENTITY_DATA, NativeAddress, NativeApplication,
    NativeBlob, NativeContact, NativeEndpoint, NativeEventData, NativeEventPayload, NativeGuid,
    NativeObject, NativePresenceInfo, PEER_COLLAB_VERSION, PEER_E_NOT_INITIALIZED,
    PEER_S_NO_EVENT_DATA, S_OK, SOCKADDR_IN6_SIZE, SockAddrIn6, change_type,
};
