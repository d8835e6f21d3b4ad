//! Whole-record conversions.
//!
//! Decoders read native records, including the buffers they point at, into
//! owned domain values; nothing returned borrows native memory. Encoders
//! validate first and return a [`Marshaled`] owning every allocation. The
//! 16 KiB payload limit applies when encoding only.

use std::sync::Arc;

use chrono::Utc;

use super::{
    Marshaled, decode_address, decode_certificate, decode_guid, encode_address,
    encode_certificate, encode_guid, read_blob,
};
use crate::domain::application::check_entity_data;
use crate::domain::{
    ApplicationChanged, ChangeRecord, ChangeType, CollabId, NameChanged, ObjectChanged,
    PeerApplication, PeerContact, PeerEndPoint, PeerName, PeerObject, PeerPresenceInfo,
    PeerScope, PresenceChanged, PresenceStatus, SubscriptionListChanged, SubscriptionType,
};
use crate::error::CollabError;
use crate::native::{
    CollabEventType, CollabPlatform, NativeApplication, NativeBlob, NativeBuffer, NativeContact,
    NativeEndpoint, NativeEventData, NativeEventPayload, NativeObject, NativePresenceInfo,
};

/// Decodes a contact. With `local` set the record describes the local
/// identity: it is always subscribed and its subscribe permission is not
/// read.
///
/// # Errors
///
/// Returns [`CollabError::Platform`] if the credentials cannot be read.
pub fn decode_contact(
    platform: &dyn CollabPlatform,
    native: &NativeContact,
    local: bool,
) -> Result<PeerContact, CollabError> {
    Ok(PeerContact {
        peer_name: native.peer_name.clone().map(PeerName::from_native),
        nickname: native.nick_name.clone(),
        display_name: native.display_name.clone(),
        email_address: native.email_address.clone(),
        is_subscribed: local || native.watch,
        subscribe_allowed: if local {
            SubscriptionType::default()
        } else {
            SubscriptionType::from_raw(native.watcher_permissions)
        },
        credentials: decode_certificate(platform, &native.credentials)?,
    })
}

/// Encodes a contact, serializing its credentials into native memory.
///
/// # Errors
///
/// Returns [`CollabError::Platform`] if the credentials cannot be
/// serialized.
pub fn encode_contact(
    platform: &Arc<dyn CollabPlatform>,
    contact: &PeerContact,
) -> Result<Marshaled<NativeContact>, CollabError> {
    let mut memory = Vec::new();
    let native = contact_to_native(platform, contact, &mut memory)?;
    Ok(Marshaled::new(native, memory))
}

fn contact_to_native(
    platform: &Arc<dyn CollabPlatform>,
    contact: &PeerContact,
    memory: &mut Vec<NativeBuffer>,
) -> Result<NativeContact, CollabError> {
    let credentials = match &contact.credentials {
        Some(certificate) => {
            let (blob, buffer) = encode_certificate(platform, certificate)?;
            memory.push(buffer);
            blob
        }
        None => NativeBlob::EMPTY,
    };
    Ok(NativeContact {
        peer_name: contact.peer_name.as_ref().map(|name| name.as_str().to_owned()),
        nick_name: contact.nickname.clone(),
        display_name: contact.display_name.clone(),
        email_address: contact.email_address.clone(),
        watch: contact.is_subscribed,
        watcher_permissions: contact.subscribe_allowed as u32,
        credentials,
    })
}

/// Decodes an endpoint.
///
/// # Errors
///
/// Returns [`CollabError::Validation`] if the address is not IPv6.
pub fn decode_endpoint(native: &NativeEndpoint) -> Result<PeerEndPoint, CollabError> {
    Ok(PeerEndPoint::from_v6(
        decode_address(&native.address)?,
        native.endpoint_name.clone(),
    ))
}

/// Encodes an endpoint.
#[must_use]
pub fn encode_endpoint(endpoint: &PeerEndPoint) -> NativeEndpoint {
    NativeEndpoint {
        address: encode_address(&endpoint.address()),
        endpoint_name: endpoint.name().map(str::to_owned),
    }
}

/// Copies an application or object payload into native memory.
///
/// Returns the empty blob and no buffer for an empty payload.
///
/// # Errors
///
/// Returns [`CollabError::Validation`] for a payload over 16 KiB, or
/// [`CollabError::Platform`] if the copy fails.
pub fn encode_data(
    platform: &Arc<dyn CollabPlatform>,
    data: &[u8],
) -> Result<(NativeBlob, Option<NativeBuffer>), CollabError> {
    check_entity_data(data)?;
    if data.is_empty() {
        return Ok((NativeBlob::EMPTY, None));
    }
    let len = u32::try_from(data.len())
        .map_err(|_| CollabError::validation("payload length does not fit in 32 bits"))?;
    let buffer = NativeBuffer::alloc(platform, len)
        .map_err(|code| CollabError::platform("LocalAlloc", code))?;
    platform
        .write_memory(buffer.handle(), data)
        .map_err(|code| CollabError::platform("WriteNativeBlob", code))?;
    Ok((
        NativeBlob {
            cb_data: len,
            pb_data: buffer.handle(),
        },
        Some(buffer),
    ))
}

/// Decodes an application. Decoded applications have [`PeerScope::None`].
///
/// # Errors
///
/// Returns [`CollabError::Platform`] if the payload cannot be read.
pub fn decode_application(
    platform: &dyn CollabPlatform,
    native: &NativeApplication,
) -> Result<PeerApplication, CollabError> {
    Ok(PeerApplication::from_parts(
        CollabId::from_uuid(decode_guid(&native.id)),
        read_blob(platform, &native.data)?,
        native.description.clone(),
        PeerScope::None,
    ))
}

/// Encodes an application.
///
/// # Errors
///
/// See [`encode_data`].
pub fn encode_application(
    platform: &Arc<dyn CollabPlatform>,
    application: &PeerApplication,
) -> Result<Marshaled<NativeApplication>, CollabError> {
    let mut memory = Vec::new();
    let native = application_to_native(platform, application, &mut memory)?;
    Ok(Marshaled::new(native, memory))
}

fn application_to_native(
    platform: &Arc<dyn CollabPlatform>,
    application: &PeerApplication,
    memory: &mut Vec<NativeBuffer>,
) -> Result<NativeApplication, CollabError> {
    let (data, buffer) = encode_data(platform, application.data())?;
    memory.extend(buffer);
    Ok(NativeApplication {
        id: encode_guid(application.id().as_uuid()),
        data,
        description: application.description().map(str::to_owned),
    })
}

/// Decodes an object.
///
/// # Errors
///
/// Returns [`CollabError::Platform`] if the payload cannot be read, or
/// [`CollabError::Validation`] for an unknown publication scope.
pub fn decode_object(
    platform: &dyn CollabPlatform,
    native: &NativeObject,
) -> Result<PeerObject, CollabError> {
    Ok(PeerObject::from_parts(
        CollabId::from_uuid(decode_guid(&native.id)),
        read_blob(platform, &native.data)?,
        PeerScope::from_raw(native.publication_scope)?,
    ))
}

/// Encodes an object.
///
/// # Errors
///
/// See [`encode_data`].
pub fn encode_object(
    platform: &Arc<dyn CollabPlatform>,
    object: &PeerObject,
) -> Result<Marshaled<NativeObject>, CollabError> {
    let mut memory = Vec::new();
    let native = object_to_native(platform, object, &mut memory)?;
    Ok(Marshaled::new(native, memory))
}

fn object_to_native(
    platform: &Arc<dyn CollabPlatform>,
    object: &PeerObject,
    memory: &mut Vec<NativeBuffer>,
) -> Result<NativeObject, CollabError> {
    let (data, buffer) = encode_data(platform, object.data())?;
    memory.extend(buffer);
    Ok(NativeObject {
        id: encode_guid(object.id().as_uuid()),
        data,
        publication_scope: object.scope() as u32,
    })
}

/// Decodes presence information.
///
/// # Errors
///
/// Returns [`CollabError::Validation`] for an unknown status.
pub fn decode_presence(native: &NativePresenceInfo) -> Result<PeerPresenceInfo, CollabError> {
    Ok(PeerPresenceInfo {
        status: PresenceStatus::try_from(native.status)?,
        description: native.desc_text.clone(),
    })
}

/// Encodes presence information.
#[must_use]
pub fn encode_presence(presence: &PeerPresenceInfo) -> NativePresenceInfo {
    NativePresenceInfo {
        status: presence.status as u32,
        desc_text: presence.description.clone(),
    }
}

/// Decodes a whole event record.
///
/// Contacts in records about the local peer are decoded as the local
/// identity. Returns `None` when the record's subject (contact, endpoint,
/// presence, application or object) is absent.
///
/// # Errors
///
/// Propagates the first error raised by a nested decoder.
pub fn decode_event(
    platform: &dyn CollabPlatform,
    data: &NativeEventData,
) -> Result<Option<ChangeRecord>, CollabError> {
    let local = data.event_type.is_local();
    let received_at = Utc::now();
    let contact_of = |native: &Option<NativeContact>| {
        native
            .as_ref()
            .map(|contact| decode_contact(platform, contact, local))
            .transpose()
    };
    let endpoint_of =
        |native: &Option<NativeEndpoint>| native.as_ref().map(decode_endpoint).transpose();

    let record = match &data.payload {
        NativeEventPayload::WatchListChanged {
            contact,
            change_type,
        } => {
            let Some(contact) = contact_of(contact)? else {
                return Ok(None);
            };
            ChangeRecord::SubscriptionList(SubscriptionListChanged {
                endpoint: None,
                contact: Some(contact),
                change_type: ChangeType::from_raw(*change_type)?,
                received_at,
            })
        }
        NativeEventPayload::EndPointChanged { contact, endpoint } => {
            let Some(endpoint) = endpoint_of(endpoint)? else {
                return Ok(None);
            };
            ChangeRecord::Name(NameChanged {
                name: endpoint.name().map(str::to_owned),
                endpoint: Some(endpoint),
                contact: contact_of(contact)?,
                change_type: ChangeType::Updated,
                received_at,
            })
        }
        NativeEventPayload::PresenceChanged {
            contact,
            endpoint,
            change_type,
            presence_info,
        } => {
            let Some(presence) = presence_info else {
                return Ok(None);
            };
            ChangeRecord::Presence(PresenceChanged {
                endpoint: endpoint_of(endpoint)?,
                contact: contact_of(contact)?,
                change_type: ChangeType::from_raw(*change_type)?,
                presence: decode_presence(presence)?,
                received_at,
            })
        }
        NativeEventPayload::ApplicationChanged {
            contact,
            endpoint,
            change_type,
            application,
        } => {
            let Some(application) = application else {
                return Ok(None);
            };
            ChangeRecord::Application(ApplicationChanged {
                endpoint: endpoint_of(endpoint)?,
                contact: contact_of(contact)?,
                change_type: ChangeType::from_raw(*change_type)?,
                application: decode_application(platform, application)?,
                received_at,
            })
        }
        NativeEventPayload::ObjectChanged {
            contact,
            endpoint,
            change_type,
            object,
        } => {
            let Some(object) = object else {
                return Ok(None);
            };
            ChangeRecord::Object(ObjectChanged {
                endpoint: endpoint_of(endpoint)?,
                contact: contact_of(contact)?,
                change_type: ChangeType::from_raw(*change_type)?,
                object: decode_object(platform, object)?,
                received_at,
            })
        }
    };
    Ok(Some(record))
}

/// Encodes `record` as a native event of kind `event_type`.
///
/// # Errors
///
/// Returns [`CollabError::Validation`] if `event_type` cannot carry this
/// record kind or a payload is over 16 KiB, or [`CollabError::Platform`] if
/// native memory cannot be filled.
pub fn encode_event(
    platform: &Arc<dyn CollabPlatform>,
    event_type: CollabEventType,
    record: &ChangeRecord,
) -> Result<Marshaled<NativeEventData>, CollabError> {
    use CollabEventType as Kind;

    let accepted = matches!(
        (record, event_type),
        (ChangeRecord::SubscriptionList(_), Kind::WatchListChanged)
            | (ChangeRecord::Name(_), Kind::EndPointChanged | Kind::MyEndPointChanged)
            | (
                ChangeRecord::Presence(_),
                Kind::EndPointPresenceChanged | Kind::MyPresenceChanged
            )
            | (
                ChangeRecord::Application(_),
                Kind::EndPointApplicationChanged | Kind::MyApplicationChanged
            )
            | (
                ChangeRecord::Object(_),
                Kind::EndPointObjectChanged | Kind::MyObjectChanged
            )
    );
    if !accepted {
        return Err(CollabError::validation(format!(
            "a {} record cannot be sent as {event_type:?}",
            record.kind_str()
        )));
    }

    let mut memory = Vec::new();
    let contact = record
        .contact()
        .map(|contact| contact_to_native(platform, contact, &mut memory))
        .transpose()?;
    let endpoint = record.endpoint().map(encode_endpoint);

    let payload = match record {
        ChangeRecord::SubscriptionList(event) => NativeEventPayload::WatchListChanged {
            contact,
            change_type: event.change_type.to_raw(),
        },
        ChangeRecord::Name(event) => NativeEventPayload::EndPointChanged {
            contact,
            endpoint: endpoint.map(|mut native| {
                native.endpoint_name.clone_from(&event.name);
                native
            }),
        },
        ChangeRecord::Presence(event) => NativeEventPayload::PresenceChanged {
            contact,
            endpoint,
            change_type: event.change_type.to_raw(),
            presence_info: Some(encode_presence(&event.presence)),
        },
        ChangeRecord::Application(event) => NativeEventPayload::ApplicationChanged {
            contact,
            endpoint,
            change_type: event.change_type.to_raw(),
            application: Some(application_to_native(
                platform,
                &event.application,
                &mut memory,
            )?),
        },
        ChangeRecord::Object(event) => NativeEventPayload::ObjectChanged {
            contact,
            endpoint,
            change_type: event.change_type.to_raw(),
            object: Some(object_to_native(platform, &event.object, &mut memory)?),
        },
    };
    Ok(Marshaled::new(
        NativeEventData {
            event_type,
            payload,
        },
        memory,
    ))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::net::{Ipv6Addr, SocketAddrV6};

    use super::*;
    use crate::domain::Certificate;
    use crate::native::{LoopbackPlatform, MAX_ENTITY_DATA, NativeGuid, change_type};

    fn platform() -> (Arc<LoopbackPlatform>, Arc<dyn CollabPlatform>) {
        let loopback = Arc::new(LoopbackPlatform::manual());
        let platform: Arc<dyn CollabPlatform> = Arc::clone(&loopback) as Arc<dyn CollabPlatform>;
        (loopback, platform)
    }

    fn alice() -> PeerContact {
        let Ok(name) = PeerName::new("4a1f.alice") else {
            panic!("valid peer name");
        };
        let mut contact = PeerContact::new(name);
        contact.nickname = Some("alice".into());
        contact.subscribe_allowed = SubscriptionType::Allowed;
        contact.credentials = Some(Certificate::from_der(vec![0x30, 0x03, 0x02, 0x01, 0x01]));
        contact
    }

    fn endpoint() -> PeerEndPoint {
        PeerEndPoint::from_v6(
            SocketAddrV6::new(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 7), 3587, 0, 11),
            Some("desk".into()),
        )
    }

    #[test]
    fn contact_round_trip_keeps_credentials() {
        let (loopback, platform) = platform();
        let contact = alice();
        let Ok(marshaled) = encode_contact(&platform, &contact) else {
            panic!("encode failed");
        };
        assert_eq!(marshaled.allocations(), 1);
        let Ok(decoded) = decode_contact(&*platform, marshaled.record(), false) else {
            panic!("decode failed");
        };
        assert_eq!(decoded, contact);
        assert_eq!(decoded.nickname.as_deref(), Some("alice"));
        assert_eq!(decoded.subscribe_allowed, SubscriptionType::Allowed);
        assert_eq!(decoded.credentials, contact.credentials);

        drop(marshaled);
        assert_eq!(loopback.stats().live_memory, 0);
    }

    #[test]
    fn local_contact_is_always_subscribed() {
        let (_loopback, platform) = platform();
        let native = NativeContact {
            peer_name: Some("0.me".into()),
            watch: false,
            watcher_permissions: 1,
            ..NativeContact::default()
        };
        let Ok(local) = decode_contact(&*platform, &native, true) else {
            panic!("decode failed");
        };
        assert!(local.is_subscribed);
        assert_eq!(local.subscribe_allowed, SubscriptionType::Blocked);
        assert!(local.credentials.is_none());
    }

    #[test]
    fn data_limit_applies_on_encode() {
        let (loopback, platform) = platform();
        let Ok((blob, buffer)) = encode_data(&platform, &vec![5; MAX_ENTITY_DATA]) else {
            panic!("16384 bytes must be accepted");
        };
        assert_eq!(blob.cb_data as usize, MAX_ENTITY_DATA);
        assert!(buffer.is_some());
        drop(buffer);

        let oversized = encode_data(&platform, &vec![5; MAX_ENTITY_DATA + 1]);
        assert!(matches!(oversized, Err(CollabError::Validation(_))));
        assert_eq!(loopback.stats().live_memory, 0);
    }

    #[test]
    fn oversized_payload_decodes_but_does_not_re_encode() {
        let (_loopback, platform) = platform();
        let len = (MAX_ENTITY_DATA + 1) as u32;
        let Ok(mem) = platform.alloc(len) else {
            panic!("alloc failed");
        };
        let native = NativeApplication {
            id: NativeGuid {
                data1: 9,
                ..NativeGuid::default()
            },
            data: NativeBlob {
                cb_data: len,
                pb_data: mem,
            },
            description: Some("whiteboard".into()),
        };
        let Ok(application) = decode_application(&*platform, &native) else {
            panic!("decode must not apply the size limit");
        };
        assert_eq!(application.data().len(), MAX_ENTITY_DATA + 1);
        assert_eq!(application.scope(), PeerScope::None);
        assert!(matches!(
            encode_application(&platform, &application),
            Err(CollabError::Validation(_))
        ));
        platform.free(mem);
    }

    #[test]
    fn event_without_subject_decodes_to_nothing() {
        let (_loopback, platform) = platform();
        let data = NativeEventData {
            event_type: CollabEventType::EndPointObjectChanged,
            payload: NativeEventPayload::ObjectChanged {
                contact: None,
                endpoint: None,
                change_type: change_type::ADDED,
                object: None,
            },
        };
        assert!(matches!(decode_event(&*platform, &data), Ok(None)));
    }

    #[test]
    fn application_event_round_trip() {
        let (loopback, platform) = platform();
        let id = CollabId::new();
        let Ok(application) =
            PeerApplication::new(id, b"shared board".to_vec(), Some("board".into()), PeerScope::All)
        else {
            panic!("valid application");
        };
        let record = ChangeRecord::Application(ApplicationChanged {
            endpoint: Some(endpoint()),
            contact: Some(alice()),
            change_type: ChangeType::Added,
            application,
            received_at: Utc::now(),
        });
        let Ok(marshaled) =
            encode_event(&platform, CollabEventType::EndPointApplicationChanged, &record)
        else {
            panic!("encode failed");
        };
        assert_eq!(marshaled.allocations(), 2);

        let Ok(Some(ChangeRecord::Application(decoded))) =
            decode_event(&*platform, marshaled.record())
        else {
            panic!("expected an application record");
        };
        assert_eq!(decoded.application.id(), id);
        assert_eq!(decoded.application.data(), b"shared board");
        assert_eq!(decoded.change_type, ChangeType::Added);
        assert_eq!(decoded.endpoint, Some(endpoint()));
        assert_eq!(decoded.contact, Some(alice()));

        drop(marshaled);
        assert_eq!(loopback.stats().live_memory, 0);
        assert_eq!(loopback.stats().live_stores, 0);
    }

    #[test]
    fn local_name_change_round_trip() {
        let (_loopback, platform) = platform();
        let record = ChangeRecord::Name(NameChanged {
            endpoint: Some(endpoint()),
            contact: None,
            change_type: ChangeType::Updated,
            name: Some("renamed".into()),
            received_at: Utc::now(),
        });
        let Ok(marshaled) = encode_event(&platform, CollabEventType::MyEndPointChanged, &record)
        else {
            panic!("encode failed");
        };
        let Ok(Some(ChangeRecord::Name(decoded))) = decode_event(&*platform, marshaled.record())
        else {
            panic!("expected a name record");
        };
        assert_eq!(decoded.name.as_deref(), Some("renamed"));
    }

    #[test]
    fn mismatched_kind_is_rejected_before_allocating() {
        let (loopback, platform) = platform();
        let record = ChangeRecord::SubscriptionList(SubscriptionListChanged {
            endpoint: None,
            contact: Some(alice()),
            change_type: ChangeType::Deleted,
            received_at: Utc::now(),
        });
        let result = encode_event(&platform, CollabEventType::MyObjectChanged, &record);
        assert!(matches!(result, Err(CollabError::Validation(_))));
        assert_eq!(loopback.stats().store_opens, 0);
    }
}
