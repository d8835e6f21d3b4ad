//! Entities owning subscription slots.
//!
//! Each entity holds one [`crate::events::SubscriptionSlot`] per event kind
//! it exposes. Dropping an entity tears its slots down; `dispose` does the
//! same while the entity is still shared.

pub mod application;
pub mod collaboration;
pub mod contact;
pub mod contact_manager;
pub mod endpoint;
pub mod local_peer;
pub mod object;

pub use application::ApplicationEvents;
pub use collaboration::Collaboration;
pub use contact::ContactEvents;
pub use contact_manager::ContactManager;
pub use endpoint::EndPointEvents;
pub use local_peer::LocalPeerEvents;
pub use object::ObjectEvents;
