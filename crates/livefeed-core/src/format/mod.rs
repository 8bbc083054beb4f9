//! Terminal formatting for live event streams.
//!
//! Events arrive as raw gateway JSON; this module turns them into one-line
//! summaries for TTY display. Field extraction is deliberately lenient: a
//! payload missing an expected field degrades to a generic line instead of
//! failing, since the gateway reshapes payloads without notice.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::{BusinessEvent, BusinessKind};

/// The output format for event display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Human-readable terminal output.
    #[default]
    Tty,
    /// One JSON document per event, for piping into other tools.
    Json,
}

/// Configuration options for event formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatOptions {
    /// Maximum length for chat text (truncated with ellipsis).
    pub max_text_length: Option<usize>,
    /// Whether to show the sender uid after usernames.
    pub show_uids: bool,
    /// Whether unroutable events are rendered as a generic line or skipped.
    pub show_unknown: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            max_text_length: None,
            show_uids: false,
            show_unknown: false,
        }
    }
}

/// A formatted event line with metadata.
#[derive(Debug, Clone)]
pub struct FormattedEvent {
    /// The formatted display text.
    pub text: String,
    /// The event family, when recognized.
    pub kind: Option<BusinessKind>,
}

/// Formatter for gateway events.
#[derive(Debug, Clone)]
pub struct EventFormatter {
    options: FormatOptions,
}

impl EventFormatter {
    /// Creates a new EventFormatter with the given options.
    pub fn new(options: FormatOptions) -> Self {
        Self { options }
    }

    /// Creates a new EventFormatter with default options.
    pub fn with_defaults() -> Self {
        Self::new(FormatOptions::default())
    }

    /// Formats a single event for TTY output.
    ///
    /// Returns `None` for events the formatter does not recognize when
    /// [`FormatOptions::show_unknown`] is off.
    pub fn format_event(&self, event: &BusinessEvent) -> Option<FormattedEvent> {
        let kind = event.kind();

        let text = match kind {
            Some(BusinessKind::Chat) => self.format_chat(&event.payload),
            Some(BusinessKind::Gift) => self.format_gift(&event.payload),
            Some(BusinessKind::SuperChat) => self.format_super_chat(&event.payload),
            Some(BusinessKind::GuardPurchase) => self.format_guard(&event.payload),
            Some(BusinessKind::Interaction) => self.format_interaction(&event.payload),
            Some(BusinessKind::OnlineRankCount) => self.format_rank_count(&event.payload),
            None => {
                if !self.options.show_unknown {
                    return None;
                }
                format!("[event] {}", event.base_cmd())
            }
        };

        Some(FormattedEvent { text, kind })
    }

    /// Formats a chat message.
    ///
    /// Chat payloads are positional: `info[1]` is the text and `info[2]` the
    /// sender tuple `[uid, username, ...]`.
    fn format_chat(&self, payload: &Value) -> String {
        let info = &payload["info"];
        let text = info[1].as_str().unwrap_or("");
        let name = info[2][1].as_str().unwrap_or("?");
        let uid = info[2][0].as_u64();

        let text = self.truncate_text(text);
        format!("[chat] {}: {}", self.format_name(name, uid), text)
    }

    fn format_gift(&self, payload: &Value) -> String {
        let data = &payload["data"];
        let name = data["uname"].as_str().unwrap_or("?");
        let uid = data["uid"].as_u64();
        let gift = data["giftName"].as_str().unwrap_or("gift");
        let num = data["num"].as_u64().unwrap_or(1);

        format!("[gift] {} sent {} x{}", self.format_name(name, uid), gift, num)
    }

    fn format_super_chat(&self, payload: &Value) -> String {
        let data = &payload["data"];
        let name = data["user_info"]["uname"].as_str().unwrap_or("?");
        let uid = data["uid"].as_u64();
        let price = data["price"].as_u64().unwrap_or(0);
        let message = self.truncate_text(data["message"].as_str().unwrap_or(""));

        format!(
            "[superchat] CNY {} {}: {}",
            price,
            self.format_name(name, uid),
            message
        )
    }

    fn format_guard(&self, payload: &Value) -> String {
        let data = &payload["data"];
        let name = data["username"].as_str().unwrap_or("?");
        let uid = data["uid"].as_u64();
        let tier = guard_tier_name(data["guard_level"].as_u64().unwrap_or(0));
        let num = data["num"].as_u64().unwrap_or(1);

        format!("[guard] {} bought {} x{}", self.format_name(name, uid), tier, num)
    }

    fn format_interaction(&self, payload: &Value) -> String {
        let data = &payload["data"];
        let name = data["uname"].as_str().unwrap_or("?");
        let uid = data["uid"].as_u64();

        // msg_type 1 is a room entry, 2 a follow, 3 a share.
        let verb = match data["msg_type"].as_u64() {
            Some(2) => "followed the host",
            Some(3) => "shared the room",
            _ => "entered the room",
        };

        format!("[enter] {} {}", self.format_name(name, uid), verb)
    }

    fn format_rank_count(&self, payload: &Value) -> String {
        let count = payload["data"]["count"].as_u64().unwrap_or(0);
        format!("[rank] {} viewers ranked", count)
    }

    fn format_name(&self, name: &str, uid: Option<u64>) -> String {
        match (self.options.show_uids, uid) {
            (true, Some(uid)) => format!("{} ({})", name, uid),
            _ => name.to_string(),
        }
    }

    fn truncate_text<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if let Some(max_len) = self.options.max_text_length {
            ellipsis(text, max_len)
        } else {
            Cow::Borrowed(text)
        }
    }
}

/// Display name for a membership tier.
pub fn guard_tier_name(level: u64) -> &'static str {
    match level {
        1 => "Governor",
        2 => "Admiral",
        3 => "Captain",
        _ => "membership",
    }
}

/// Truncates a string with ellipsis if it exceeds the given length.
pub fn ellipsis(s: &str, max_len: usize) -> Cow<'_, str> {
    if max_len == 0 {
        return Cow::Borrowed("");
    }

    let char_count = s.chars().count();
    if char_count <= max_len {
        return Cow::Borrowed(s);
    }

    let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
    Cow::Owned(format!("{}...", truncated))
}
