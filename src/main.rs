//! collab-monitor entry point.
//!
//! Subscribes to every contact-manager and local-peer event, prints each
//! notification as one JSON line, and reports drain faults. Runs against
//! the in-process loopback platform; with `COLLAB_MONITOR_REPLAY` set a
//! short scripted session is posted so there is something to watch.

use std::net::{Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use peer_collab_bridge::codec::encode_event;
use peer_collab_bridge::config::{BridgeConfig, LogFormat};
use peer_collab_bridge::domain::{
    ApplicationChanged, ChangeRecord, ChangeType, CollabId, NameChanged, Notification,
    ObjectChanged, PeerApplication, PeerContact, PeerEndPoint, PeerName, PeerObject,
    PeerPresenceInfo, PeerScope, PresenceChanged, PresenceStatus, SubscriptionListChanged,
};
use peer_collab_bridge::entities::Collaboration;
use peer_collab_bridge::events::{CollabContext, SubscriptionSlot, handler};
use peer_collab_bridge::native::{CollabEventType, CollabPlatform, LoopbackPlatform};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BridgeConfig::from_env()?;
    init_tracing(config.log_format);
    tracing::info!(
        threads = config.wait_pool_threads,
        mode = ?config.dispatch_mode,
        "starting collab-monitor"
    );

    let loopback = Arc::new(
        LoopbackPlatform::with_wait_pool(config.wait_pool_threads)
            .context("failed to start the wait pool")?,
    );
    let platform: Arc<dyn CollabPlatform> = Arc::clone(&loopback) as Arc<dyn CollabPlatform>;
    let (ctx, worker) = CollabContext::from_config(Arc::clone(&platform), &config);
    if let Some(worker) = worker {
        tokio::spawn(worker.run());
    }

    let mut faults = ctx.faults().subscribe();
    tokio::spawn(async move {
        loop {
            match faults.recv().await {
                Ok(fault) => eprintln!(
                    "fault {:?} at {}: {}",
                    fault.event_type, fault.timestamp, fault.error
                ),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "fault receiver lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let collab = Collaboration::new(ctx);
    let manager = collab.contact_manager();
    watch(manager.subscription_list_changed(), "watch-list")?;
    watch(manager.name_changed(), "endpoint-name")?;
    watch(manager.presence_changed(), "endpoint-presence")?;
    watch(manager.application_changed(), "endpoint-application")?;
    watch(manager.object_changed(), "endpoint-object")?;
    let local = collab.local_peer();
    watch(local.name_changed(), "my-name")?;
    watch(local.presence_changed(), "my-presence")?;
    watch(local.application_changed(), "my-application")?;
    watch(local.object_changed(), "my-object")?;

    if config.monitor_replay {
        for (kind, record) in script()? {
            let marshaled = encode_event(&platform, kind, &record)?;
            let queued = loopback
                .post_event(marshaled.record())
                .map_err(|code| anyhow::anyhow!("posting {kind:?} failed with {code:#010x}"))?;
            tracing::debug!(?kind, queued, "replayed record");
        }
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
        () = tokio::time::sleep(Duration::from_millis(config.monitor_millis)) => {}
    }

    collab.dispose();
    tracing::info!(stats = ?loopback.stats(), "collab-monitor stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

/// Prints every notification of `slot` as `<label> <json>`.
fn watch<N>(slot: &SubscriptionSlot<N>, label: &'static str) -> anyhow::Result<()>
where
    N: Notification + Serialize,
{
    slot.subscribe(handler(move |event: &N| {
        match serde_json::to_string(event) {
            Ok(json) => println!("{label} {json}"),
            Err(err) => tracing::warn!(label, error = %err, "cannot serialize notification"),
        }
    }))
    .with_context(|| format!("subscribing to {:?}", slot.kind()))?;
    Ok(())
}

/// A short session: a contact comes online, renames its endpoint, and
/// publishes an application and an object; then the local peer goes away.
fn script() -> anyhow::Result<Vec<(CollabEventType, ChangeRecord)>> {
    let now = Utc::now();
    let mut contact = PeerContact::new(PeerName::new("3f8a1c.ada")?);
    contact.display_name = Some("Ada".to_owned());
    contact.is_subscribed = true;
    let endpoint = PeerEndPoint::new(
        SocketAddr::from((Ipv6Addr::LOCALHOST, 3587)),
        Some("ada-laptop".to_owned()),
    )?;
    let me = PeerContact::new(PeerName::new("0.me")?);

    Ok(vec![
        (
            CollabEventType::WatchListChanged,
            ChangeRecord::SubscriptionList(SubscriptionListChanged {
                endpoint: None,
                contact: Some(contact.clone()),
                change_type: ChangeType::Added,
                received_at: now,
            }),
        ),
        (
            CollabEventType::EndPointPresenceChanged,
            ChangeRecord::Presence(PresenceChanged {
                endpoint: Some(endpoint.clone()),
                contact: Some(contact.clone()),
                change_type: ChangeType::Updated,
                presence: PeerPresenceInfo {
                    status: PresenceStatus::Online,
                    description: None,
                },
                received_at: now,
            }),
        ),
        (
            CollabEventType::EndPointChanged,
            ChangeRecord::Name(NameChanged {
                endpoint: Some(endpoint.clone()),
                contact: Some(contact.clone()),
                change_type: ChangeType::Updated,
                name: Some("ada-desktop".to_owned()),
                received_at: now,
            }),
        ),
        (
            CollabEventType::EndPointApplicationChanged,
            ChangeRecord::Application(ApplicationChanged {
                endpoint: Some(endpoint.clone()),
                contact: Some(contact.clone()),
                change_type: ChangeType::Added,
                application: PeerApplication::new(
                    CollabId::new(),
                    b"whiteboard".to_vec(),
                    Some("Shared whiteboard".to_owned()),
                    PeerScope::All,
                )?,
                received_at: now,
            }),
        ),
        (
            CollabEventType::EndPointObjectChanged,
            ChangeRecord::Object(ObjectChanged {
                endpoint: Some(endpoint),
                contact: Some(contact),
                change_type: ChangeType::Added,
                object: PeerObject::new(CollabId::new(), b"{\"page\":1}".to_vec(), PeerScope::All)?,
                received_at: now,
            }),
        ),
        (
            CollabEventType::MyPresenceChanged,
            ChangeRecord::Presence(PresenceChanged {
                endpoint: None,
                contact: Some(me),
                change_type: ChangeType::Updated,
                presence: PeerPresenceInfo {
                    status: PresenceStatus::Away,
                    description: Some("lunch".to_owned()),
                },
                received_at: now,
            }),
        ),
    ])
}
