//! Watch command: streams a room's live feed to the terminal.
//!
//! This command wires the whole pipeline together:
//! - Avatar cache (optional, fail-open)
//! - Provider pool for avatar lookups
//! - Room session: gateway connection, dispatch, reconnects
//! - Terminal rendering, one line per event

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use livefeed_core::{
    BusinessEvent, BusinessKind, ConnectionStatus, EventFormatter, OutputFormat,
};
use livefeed_ingest::{RoomConfig, RoomSession};
use livefeed_providers::{PoolConfig, ProviderPool};

use crate::cli::WatchArgs;
use crate::error::{ClientError, ClientResult};

/// Streams the room's feed until Ctrl-C.
pub async fn run(args: &WatchArgs) -> ClientResult<()> {
    // 1. Avatar cache, optional and fail-open
    let cache = Arc::new(super::open_cache(args.cache_config.as_deref(), args.no_cache));

    // 2. Provider pool for avatar lookups
    let pool = Arc::new(
        ProviderPool::with_default_endpoints(PoolConfig::new())
            .map_err(|e| ClientError::Provider(e.to_string()))?,
    );

    // 3. Room session
    let mut config = RoomConfig::new(args.room_id)
        .with_uid(args.uid)
        .with_reconnect_delay(Duration::from_secs(args.reconnect_delay));
    if let Some(ref api_base) = args.api_base {
        config = config.with_api_base(api_base.as_str());
    }

    let mut session = RoomSession::open(config, pool, cache)?;
    let Some(mut events) = session.take_events() else {
        return Err(ClientError::Ingest("event stream already taken".into()));
    };
    let mut status = session.status();
    let mut online = session.online_count();

    let formatter = EventFormatter::new(args.format_options());
    let format = args.output_format();

    info!(room_id = args.room_id, "Watching room; Ctrl-C to stop");

    // 4. Render events until the stream ends or the user interrupts
    loop {
        tokio::select! {
            maybe_event = events.recv() => {
                let Some(event) = maybe_event else {
                    debug!("Event stream ended");
                    break;
                };
                print_event(&session, &formatter, format, args.avatars, &event).await;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                report_status(*status.borrow_and_update());
            }
            changed = online.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(count) = *online.borrow_and_update() {
                    debug!(count, "Online count updated");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing");
                break;
            }
        }
    }

    // 5. Drain the connection and flush buffered avatar writes
    session.close().await;
    Ok(())
}

async fn print_event(
    session: &RoomSession,
    formatter: &EventFormatter,
    format: OutputFormat,
    avatars: bool,
    event: &BusinessEvent,
) {
    match format {
        OutputFormat::Json => {
            println!("{}", event.payload);
        }
        OutputFormat::Tty => {
            let Some(line) = formatter.format_event(event) else {
                return;
            };
            if avatars && line.kind == Some(BusinessKind::Chat) {
                if let Some(uid) = chat_sender_uid(event) {
                    if let Some(face) = session.resolve_avatar(uid).await {
                        println!("{} <{}>", line.text, face);
                        return;
                    }
                }
            }
            println!("{}", line.text);
        }
    }
}

/// Sender uid from a chat payload (`info[2][0]`).
fn chat_sender_uid(event: &BusinessEvent) -> Option<u64> {
    event.payload["info"][2][0].as_u64()
}

fn report_status(status: ConnectionStatus) {
    match status {
        ConnectionStatus::Open => info!("Connected"),
        ConnectionStatus::Reconnecting => warn!("Connection lost, reconnecting"),
        other => debug!(status = other.as_str(), "Connection status changed"),
    }
}
