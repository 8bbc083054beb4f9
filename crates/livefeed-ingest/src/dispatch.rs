//! Business message dispatch.
//!
//! The gateway multiplexes every room event over one stream. The
//! dispatcher filters decoded documents down to the commands the
//! application cares about and forwards them on a bounded channel.

use std::collections::HashSet;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use livefeed_core::BusinessEvent;

/// Commands forwarded when no explicit allow list is given.
pub const DEFAULT_ALLOWED_CMDS: &[&str] = &[
    "DANMU_MSG",
    "SEND_GIFT",
    "SUPER_CHAT_MESSAGE",
    "GUARD_BUY",
    "INTERACT_WORD",
    "ONLINE_RANK_COUNT",
];

/// Filters decoded gateway documents and forwards matches downstream.
#[derive(Debug)]
pub struct MessageDispatcher {
    allowed: HashSet<String>,
    events_tx: mpsc::Sender<BusinessEvent>,
}

impl MessageDispatcher {
    /// Creates a dispatcher forwarding the default command set.
    pub fn new(events_tx: mpsc::Sender<BusinessEvent>) -> Self {
        Self::with_allowed(
            events_tx,
            DEFAULT_ALLOWED_CMDS.iter().map(|cmd| cmd.to_string()),
        )
    }

    /// Creates a dispatcher forwarding only the given commands.
    pub fn with_allowed(
        events_tx: mpsc::Sender<BusinessEvent>,
        allowed: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            events_tx,
        }
    }

    /// Whether a command passes the filter.
    ///
    /// Variant suffixes are ignored: `DANMU_MSG:4:0:2:2:2:0` matches
    /// an allow entry of `DANMU_MSG`.
    pub fn allows(&self, cmd: &str) -> bool {
        let base = cmd.split_once(':').map_or(cmd, |(base, _)| base);
        self.allowed.contains(base)
    }

    /// Filters one decoded document and forwards it if allowed.
    ///
    /// Returns whether the event was handed to the channel. The send
    /// waits when the channel is full, which backpressures the read
    /// loop instead of dropping events.
    pub async fn dispatch(&self, doc: Value) -> bool {
        let Some(event) = BusinessEvent::from_value(doc) else {
            trace!("Ignoring document without cmd");
            return false;
        };
        if !self.allows(&event.cmd) {
            trace!(cmd = %event.cmd, "Ignoring filtered command");
            return false;
        }
        match self.events_tx.send(event).await {
            Ok(()) => true,
            Err(e) => {
                debug!(cmd = %e.0.cmd, "Event receiver gone, dropping event");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn forwards_allowed_chat_message() {
        let (tx, mut rx) = mpsc::channel(4);
        let dispatcher = MessageDispatcher::new(tx);

        let forwarded = dispatcher
            .dispatch(json!({"cmd": "DANMU_MSG", "info": [[], "hello"]}))
            .await;

        assert!(forwarded);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.cmd, "DANMU_MSG");
        assert_eq!(event.payload["info"][1], "hello");
    }

    #[tokio::test]
    async fn ignores_document_without_cmd() {
        let (tx, mut rx) = mpsc::channel(4);
        let dispatcher = MessageDispatcher::new(tx);

        assert!(!dispatcher.dispatch(json!({"info": []})).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn filters_unlisted_command() {
        let (tx, mut rx) = mpsc::channel(4);
        let dispatcher =
            MessageDispatcher::with_allowed(tx, vec!["SEND_GIFT".to_string()]);

        assert!(!dispatcher.dispatch(json!({"cmd": "DANMU_MSG"})).await);
        assert!(dispatcher.dispatch(json!({"cmd": "SEND_GIFT"})).await);
        assert_eq!(rx.recv().await.unwrap().cmd, "SEND_GIFT");
    }

    #[tokio::test]
    async fn variant_suffix_matches_base_command() {
        let (tx, mut rx) = mpsc::channel(4);
        let dispatcher = MessageDispatcher::new(tx);

        let forwarded = dispatcher
            .dispatch(json!({"cmd": "DANMU_MSG:4:0:2:2:2:0", "info": []}))
            .await;

        assert!(forwarded);
        assert_eq!(rx.recv().await.unwrap().cmd, "DANMU_MSG:4:0:2:2:2:0");
    }

    #[tokio::test]
    async fn closed_channel_reports_drop() {
        let (tx, rx) = mpsc::channel(4);
        let dispatcher = MessageDispatcher::new(tx);
        drop(rx);

        assert!(!dispatcher.dispatch(json!({"cmd": "DANMU_MSG"})).await);
    }

    #[tokio::test]
    async fn full_channel_backpressures_instead_of_dropping() {
        let (tx, mut rx) = mpsc::channel(1);
        let dispatcher = MessageDispatcher::new(tx);

        assert!(dispatcher.dispatch(json!({"cmd": "DANMU_MSG"})).await);

        let blocked = dispatcher.dispatch(json!({"cmd": "SEND_GIFT"}));
        tokio::pin!(blocked);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), blocked.as_mut())
                .await
                .is_err()
        );

        assert_eq!(rx.recv().await.unwrap().cmd, "DANMU_MSG");
        assert!(blocked.await);
        assert_eq!(rx.recv().await.unwrap().cmd, "SEND_GIFT");
    }
}
