//! # peer-collab-bridge
//!
//! Typed, subscribable change notifications over a native peer
//! collaboration event queue.
//!
//! The native subsystem reports changes (contacts, endpoint names,
//! presence, applications, objects) by signaling an OS wait primitive and
//! queueing fixed-layout records. This crate marshals those records into
//! owned Rust values and lets any number of handlers subscribe per event
//! kind, binding to the native queue only while someone is listening.
//!
//! ## Architecture
//!
//! ```text
//! Handlers
//!     │
//!     ├── Entities (entities/)       Collaboration, ContactManager, ...
//!     │
//!     ├── SubscriptionSlot (events/) lazy register, drain, dispatch
//!     ├── FaultBus (events/)         drain failures
//!     │
//!     ├── Codecs (codec/)            GUID, address, credential, records
//!     │
//!     └── CollabPlatform (native/)   native calls, handle ownership
//! ```

pub mod codec;
pub mod config;
pub mod domain;
pub mod entities;
pub mod error;
pub mod events;
pub mod init;
pub mod native;

pub use config::BridgeConfig;
pub use entities::Collaboration;
pub use error::CollabError;
pub use events::{CollabContext, SubscriptionSlot, handler};
