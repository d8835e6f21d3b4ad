//! Domain layer: identifiers, value types and change notifications.
//!
//! These are the values subscribers see. Native layouts live in
//! [`crate::native`]; the conversions between the two live in
//! [`crate::codec`].

pub mod application;
pub mod certificate;
pub mod change;
pub mod collab_id;
pub mod contact;
pub mod endpoint;
pub mod object;
pub mod presence;

pub use application::{PeerApplication, PeerScope};
pub use certificate::Certificate;
pub use change::{
    ApplicationChanged, ChangeRecord, ChangeType, NameChanged, Notification, ObjectChanged,
    PresenceChanged, SubscriptionListChanged,
};
pub use collab_id::CollabId;
pub use contact::{PeerContact, PeerName, SubscriptionType};
pub use endpoint::PeerEndPoint;
pub use object::PeerObject;
pub use presence::{PeerPresenceInfo, PresenceStatus};
