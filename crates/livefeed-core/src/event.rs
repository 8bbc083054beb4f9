//! Business events decoded from the live gateway.
//!
//! A gateway MESSAGE frame carries one or more JSON documents. Each document
//! has a `cmd` discriminator naming the event family; the rest of the shape
//! varies per family and is kept opaque here. Consumers that render events
//! pick the fields they need out of [`BusinessEvent::payload`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single business event received from the live gateway.
///
/// The payload is the raw JSON document exactly as the gateway sent it,
/// including the `cmd` field. No reshaping is done on ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessEvent {
    /// The `cmd` discriminator from the payload.
    pub cmd: String,
    /// The full, untransformed JSON document.
    pub payload: Value,
}

impl BusinessEvent {
    /// Builds an event from a decoded gateway document.
    ///
    /// Returns `None` when the document has no string `cmd` field, in which
    /// case the document cannot be routed and is dropped by callers.
    pub fn from_value(payload: Value) -> Option<Self> {
        let cmd = payload.get("cmd")?.as_str()?.to_string();
        Some(Self { cmd, payload })
    }

    /// The `cmd` with any colon-delimited suffix stripped.
    ///
    /// Chat payloads occasionally arrive as `DANMU_MSG:4:0:2:2:1:1`; routing
    /// always matches on the base name.
    pub fn base_cmd(&self) -> &str {
        match self.cmd.split_once(':') {
            Some((base, _)) => base,
            None => &self.cmd,
        }
    }

    /// The event family, if this is one the pipeline knows about.
    pub fn kind(&self) -> Option<BusinessKind> {
        BusinessKind::from_cmd(self.base_cmd())
    }
}

/// The event families the ingestion pipeline routes by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessKind {
    /// A chat message (`DANMU_MSG`).
    Chat,
    /// A gift (`SEND_GIFT`).
    Gift,
    /// A paid highlighted message (`SUPER_CHAT_MESSAGE`).
    SuperChat,
    /// A membership purchase (`GUARD_BUY`).
    GuardPurchase,
    /// A room entry or follow (`INTERACT_WORD`).
    Interaction,
    /// The ranked viewer count (`ONLINE_RANK_COUNT`).
    OnlineRankCount,
}

impl BusinessKind {
    /// Maps a base `cmd` to its event family.
    pub fn from_cmd(cmd: &str) -> Option<Self> {
        match cmd {
            "DANMU_MSG" => Some(Self::Chat),
            "SEND_GIFT" => Some(Self::Gift),
            "SUPER_CHAT_MESSAGE" => Some(Self::SuperChat),
            "GUARD_BUY" => Some(Self::GuardPurchase),
            "INTERACT_WORD" => Some(Self::Interaction),
            "ONLINE_RANK_COUNT" => Some(Self::OnlineRankCount),
            _ => None,
        }
    }

    /// The wire `cmd` for this family.
    pub fn as_cmd(&self) -> &'static str {
        match self {
            Self::Chat => "DANMU_MSG",
            Self::Gift => "SEND_GIFT",
            Self::SuperChat => "SUPER_CHAT_MESSAGE",
            Self::GuardPurchase => "GUARD_BUY",
            Self::Interaction => "INTERACT_WORD",
            Self::OnlineRankCount => "ONLINE_RANK_COUNT",
        }
    }
}

/// Lifecycle state of a gateway connection.
///
/// Published on a watch channel by the connection supervisor so consumers can
/// render connection state without polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No connection and none scheduled.
    Idle,
    /// Negotiating and dialing the gateway.
    Connecting,
    /// Socket open, AUTH sent, waiting for the gateway to accept.
    AwaitingAuthReply,
    /// Authenticated and streaming.
    Open,
    /// A deliberate close is in progress.
    Closing,
    /// Connection lost, a reconnect attempt is scheduled.
    Reconnecting,
}

impl ConnectionStatus {
    /// Whether the connection is authenticated and streaming.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Stable lowercase name of the state, matching its serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::AwaitingAuthReply => "awaiting_auth_reply",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod business_event {
        use super::*;

        #[test]
        fn from_value_extracts_cmd() {
            let event = BusinessEvent::from_value(json!({
                "cmd": "SEND_GIFT",
                "data": { "uname": "alice", "giftName": "Rocket", "num": 1 }
            }));

            let event = event.unwrap();
            assert_eq!(event.cmd, "SEND_GIFT");
            assert_eq!(event.kind(), Some(BusinessKind::Gift));
            assert_eq!(event.payload["data"]["uname"], "alice");
        }

        #[test]
        fn from_value_rejects_missing_cmd() {
            assert!(BusinessEvent::from_value(json!({ "data": {} })).is_none());
            assert!(BusinessEvent::from_value(json!({ "cmd": 42 })).is_none());
            assert!(BusinessEvent::from_value(json!("not an object")).is_none());
        }

        #[test]
        fn base_cmd_strips_suffix() {
            let event = BusinessEvent::from_value(json!({
                "cmd": "DANMU_MSG:4:0:2:2:1:1",
                "info": []
            }))
            .unwrap();

            assert_eq!(event.base_cmd(), "DANMU_MSG");
            assert_eq!(event.kind(), Some(BusinessKind::Chat));
        }

        #[test]
        fn payload_is_kept_verbatim() {
            let raw = json!({
                "cmd": "INTERACT_WORD",
                "data": { "uname": "bob", "msg_type": 1 }
            });
            let event = BusinessEvent::from_value(raw.clone()).unwrap();

            assert_eq!(event.payload, raw);
        }
    }

    mod business_kind {
        use super::*;

        #[test]
        fn cmd_mapping_round_trips() {
            let kinds = [
                BusinessKind::Chat,
                BusinessKind::Gift,
                BusinessKind::SuperChat,
                BusinessKind::GuardPurchase,
                BusinessKind::Interaction,
                BusinessKind::OnlineRankCount,
            ];

            for kind in kinds {
                assert_eq!(BusinessKind::from_cmd(kind.as_cmd()), Some(kind));
            }
        }

        #[test]
        fn unknown_cmd_is_none() {
            assert_eq!(BusinessKind::from_cmd("WIDGET_BANNER"), None);
            assert_eq!(BusinessKind::from_cmd(""), None);
        }
    }

    mod connection_status {
        use super::*;

        #[test]
        fn only_open_is_open() {
            assert!(ConnectionStatus::Open.is_open());
            assert!(!ConnectionStatus::Idle.is_open());
            assert!(!ConnectionStatus::AwaitingAuthReply.is_open());
            assert!(!ConnectionStatus::Reconnecting.is_open());
        }

        #[test]
        fn display_matches_as_str() {
            assert_eq!(ConnectionStatus::AwaitingAuthReply.to_string(), "awaiting_auth_reply");
            assert_eq!(ConnectionStatus::Open.to_string(), "open");
        }
    }
}
