//! Native record layouts and status codes.
//!
//! These types mirror the fixed-layout structures exchanged with the native
//! collaboration subsystem. Pointers to nested structures are represented as
//! `Option<T>` (null when absent) and pointers to variable-length buffers
//! as [`NativeBlob`] descriptors referencing native memory.

use std::mem::size_of;

use super::platform::MemHandle;

/// Status code returned by native calls (HRESULT layout).
pub type HResult = i32;

/// Success.
pub const S_OK: HResult = 0;

/// Success status meaning the event queue holds no more records.
pub const PEER_S_NO_EVENT_DATA: HResult = 0x0063_0002;

/// One or more arguments are invalid.
pub const E_INVALIDARG: HResult = 0x8007_0057_u32 as i32;

/// The handle is invalid.
pub const E_HANDLE: HResult = 0x8007_0006_u32 as i32;

/// Not enough memory.
pub const E_OUTOFMEMORY: HResult = 0x8007_000E_u32 as i32;

/// The supplied buffer is too small.
pub const E_MORE_DATA: HResult = 0x8007_00EA_u32 as i32;

/// The collaboration subsystem has not been started.
pub const PEER_E_NOT_INITIALIZED: HResult = 0x8063_0002_u32 as i32;

/// An error occurred during encode or decode of a certificate store.
pub const CRYPT_E_BAD_ENCODE: HResult = 0x8009_2002_u32 as i32;

/// Collaboration API version requested at startup.
pub const PEER_COLLAB_VERSION: u16 = 0x0001;

/// Address family tag for IPv6 socket addresses.
pub const AF_INET6: u16 = 23;

/// Size tag written into every [`NativeAddress`].
pub const SOCKADDR_IN6_SIZE: u32 = size_of::<SockAddrIn6>() as u32;

/// Largest application or object payload accepted by constructors.
pub const MAX_ENTITY_DATA: usize = 16 * 1024;

/// Native five-field GUID record.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NativeGuid {
    /// First group, 32 bits.
    pub data1: u32,
    /// Second group, 16 bits.
    pub data2: u16,
    /// Third group, 16 bits.
    pub data3: u16,
    /// Remaining eight literal bytes.
    pub data4: [u8; 8],
}

impl NativeGuid {
    /// Returns `true` if every field is zero.
    #[must_use]
    pub fn is_zeroed(&self) -> bool {
        *self == Self::default()
    }
}

/// IPv6 socket address in native layout. The port is in network byte order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SockAddrIn6 {
    /// Address family, always [`AF_INET6`] when written by the codec.
    pub sin6_family: u16,
    /// Port in network byte order.
    pub sin6_port: u16,
    /// IPv6 flow information.
    pub sin6_flowinfo: u32,
    /// The sixteen address bytes.
    pub sin6_addr: [u8; 16],
    /// Scope identifier.
    pub sin6_scope_id: u32,
}

/// Native peer address: a size tag followed by the socket address.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NativeAddress {
    /// Size of [`SockAddrIn6`] in bytes.
    pub dw_size: u32,
    /// The IPv6 socket address.
    pub sin6: SockAddrIn6,
}

/// Descriptor of a variable-length buffer living in native memory.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NativeBlob {
    /// Number of valid bytes at `pb_data`.
    pub cb_data: u32,
    /// Native memory holding the bytes, [`MemHandle::NULL`] when empty.
    pub pb_data: MemHandle,
}

impl NativeBlob {
    /// The empty blob.
    pub const EMPTY: Self = Self {
        cb_data: 0,
        pb_data: MemHandle::NULL,
    };

    /// Returns `true` if the blob carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cb_data == 0 || self.pb_data.is_null()
    }
}

/// Native contact record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativeContact {
    /// Peer name of the contact.
    pub peer_name: Option<String>,
    /// Nickname.
    pub nick_name: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
    /// E-mail address.
    pub email_address: Option<String>,
    /// Whether the local peer watches this contact.
    pub watch: bool,
    /// Raw subscription-allowed value (see `SubscriptionType`).
    pub watcher_permissions: u32,
    /// Serialized single-certificate store.
    pub credentials: NativeBlob,
}

/// Native endpoint record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativeEndpoint {
    /// Endpoint address.
    pub address: NativeAddress,
    /// Endpoint name.
    pub endpoint_name: Option<String>,
}

/// Native application record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativeApplication {
    /// Application id.
    pub id: NativeGuid,
    /// Application payload.
    pub data: NativeBlob,
    /// Description text.
    pub description: Option<String>,
}

/// Native object record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativeObject {
    /// Object id.
    pub id: NativeGuid,
    /// Object payload.
    pub data: NativeBlob,
    /// Raw publication scope.
    pub publication_scope: u32,
}

/// Native presence record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativePresenceInfo {
    /// Raw presence status.
    pub status: u32,
    /// Descriptive text.
    pub desc_text: Option<String>,
}

/// Native change-kind values.
pub mod change_type {
    /// The subject was added.
    pub const ADDED: u32 = 0;
    /// The subject was deleted.
    pub const DELETED: u32 = 1;
    /// The subject was updated.
    pub const UPDATED: u32 = 2;
}

/// Event kinds understood by the native subsystem.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollabEventType {
    /// A watched contact was added, removed or changed.
    WatchListChanged = 1,
    /// A remote endpoint changed (e.g. its name).
    EndPointChanged = 2,
    /// Presence of a remote endpoint changed.
    EndPointPresenceChanged = 3,
    /// An application published by a remote endpoint changed.
    EndPointApplicationChanged = 4,
    /// An object published by a remote endpoint changed.
    EndPointObjectChanged = 5,
    /// The local endpoint changed.
    MyEndPointChanged = 6,
    /// Local presence changed.
    MyPresenceChanged = 7,
    /// A locally registered application changed.
    MyApplicationChanged = 8,
    /// A locally published object changed.
    MyObjectChanged = 9,
    /// The set of people near me changed.
    PeopleNearMeChanged = 10,
    /// An asynchronous request changed status.
    RequestStatusChanged = 11,
}

impl CollabEventType {
    /// Returns `true` for kinds describing the local peer.
    #[must_use]
    pub const fn is_local(self) -> bool {
        matches!(
            self,
            Self::MyEndPointChanged
                | Self::MyPresenceChanged
                | Self::MyApplicationChanged
                | Self::MyObjectChanged
        )
    }
}

/// One entry of the registration descriptor passed to `register_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRegistration {
    /// Event kind to receive.
    pub event_type: CollabEventType,
    /// Pinned copy of the subject id for entity-scoped registrations.
    pub instance: Option<NativeGuid>,
}

/// Kind-specific body of a native event record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEventPayload {
    /// Body of `WatchListChanged`.
    WatchListChanged {
        /// Affected contact.
        contact: Option<NativeContact>,
        /// Raw change kind.
        change_type: u32,
    },
    /// Body of `EndPointChanged` / `MyEndPointChanged`.
    EndPointChanged {
        /// Associated contact.
        contact: Option<NativeContact>,
        /// Endpoint whose name changed.
        endpoint: Option<NativeEndpoint>,
    },
    /// Body of the presence-changed kinds.
    PresenceChanged {
        /// Associated contact.
        contact: Option<NativeContact>,
        /// Associated endpoint.
        endpoint: Option<NativeEndpoint>,
        /// Raw change kind.
        change_type: u32,
        /// New presence.
        presence_info: Option<NativePresenceInfo>,
    },
    /// Body of the application-changed kinds.
    ApplicationChanged {
        /// Associated contact.
        contact: Option<NativeContact>,
        /// Associated endpoint.
        endpoint: Option<NativeEndpoint>,
        /// Raw change kind.
        change_type: u32,
        /// Affected application.
        application: Option<NativeApplication>,
    },
    /// Body of the object-changed kinds.
    ObjectChanged {
        /// Associated contact.
        contact: Option<NativeContact>,
        /// Associated endpoint.
        endpoint: Option<NativeEndpoint>,
        /// Raw change kind.
        change_type: u32,
        /// Affected object.
        object: Option<NativeObject>,
    },
}

/// A native event record as returned by the event queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeEventData {
    /// Event kind.
    pub event_type: CollabEventType,
    /// Kind-specific body.
    pub payload: NativeEventPayload,
}

impl NativeEventData {
    /// Returns the id of the application or object this record is about.
    #[must_use]
    pub fn subject_id(&self) -> Option<NativeGuid> {
        match &self.payload {
            NativeEventPayload::ApplicationChanged {
                application: Some(app),
                ..
            } => Some(app.id),
            NativeEventPayload::ObjectChanged {
                object: Some(obj), ..
            } => Some(obj.id),
            _ => None,
        }
    }

    /// Returns mutable references to every blob the record points at.
    pub fn blobs_mut(&mut self) -> Vec<&mut NativeBlob> {
        let (contact, subject) = match &mut self.payload {
            NativeEventPayload::WatchListChanged { contact, .. }
            | NativeEventPayload::EndPointChanged { contact, .. }
            | NativeEventPayload::PresenceChanged { contact, .. } => (contact, None),
            NativeEventPayload::ApplicationChanged {
                contact,
                application,
                ..
            } => (contact, application.as_mut().map(|a| &mut a.data)),
            NativeEventPayload::ObjectChanged {
                contact, object, ..
            } => (contact, object.as_mut().map(|o| &mut o.data)),
        };
        contact
            .as_mut()
            .map(|c| &mut c.credentials)
            .into_iter()
            .chain(subject)
            .collect()
    }
}
