//! Room, cache, and write-behind configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Default REST base used for gateway negotiation.
pub const DEFAULT_API_BASE: &str = "https://api.live.bilibili.com";

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration for one room connection.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Numeric room id to join.
    pub room_id: u64,

    /// Viewer uid presented during auth (0 for anonymous).
    pub uid: u64,

    /// REST base used for gateway negotiation.
    pub api_base: String,

    /// Platform tag sent in the auth payload.
    pub platform: String,

    /// Highest envelope version to request (3 requests brotli).
    pub protocol_version: u16,

    /// Interval between client heartbeats.
    pub heartbeat_interval: Duration,

    /// Fixed delay before reconnect attempts.
    pub reconnect_delay: Duration,

    /// Capacity of the business event channel.
    pub event_buffer: usize,

    /// Whether to dial the gateway over TLS.
    pub use_tls: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            room_id: 0,
            uid: 0,
            api_base: DEFAULT_API_BASE.to_string(),
            platform: "web".to_string(),
            protocol_version: 3,
            heartbeat_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
            event_buffer: 256,
            use_tls: true,
        }
    }
}

impl RoomConfig {
    /// Creates a configuration for the given room.
    pub fn new(room_id: u64) -> Self {
        Self {
            room_id,
            ..Default::default()
        }
    }

    /// Builder: set the viewer uid.
    pub fn with_uid(mut self, uid: u64) -> Self {
        self.uid = uid;
        self
    }

    /// Builder: set the negotiation API base.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Builder: set the platform tag.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Builder: set the requested envelope version.
    pub fn with_protocol_version(mut self, protocol_version: u16) -> Self {
        self.protocol_version = protocol_version;
        self
    }

    /// Builder: set the heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Builder: set the reconnect delay.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Builder: set the event channel capacity.
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    /// Builder: set whether to dial over TLS.
    pub fn with_use_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }
}

// ---------------------------------------------------------------------------
// CacheStoreSettings (cache.toml)
// ---------------------------------------------------------------------------

/// Avatar store settings, loaded from a TOML file:
///
/// ```toml
/// path = "/var/lib/livefeed/avatars.db"
/// max_connections = 5
/// connect_timeout_secs = 2
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStoreSettings {
    /// Path of the SQLite database file.
    pub path: PathBuf,

    /// Size of the connection pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    2
}

impl CacheStoreSettings {
    /// Creates settings for the given database path, defaults elsewhere.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }

    /// Connection wait budget as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Loads cache store settings from a TOML file.
///
/// The cache is strictly optional: a missing or unreadable file turns
/// it off rather than failing startup.
pub fn load_cache_settings(path: &Path) -> Option<CacheStoreSettings> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            info!(path = %path.display(), error = %e, "No cache settings, avatar cache disabled");
            return None;
        }
    };
    match toml::from_str(&raw) {
        Ok(settings) => Some(settings),
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Invalid cache settings, avatar cache disabled"
            );
            None
        }
    }
}

// ---------------------------------------------------------------------------
// WriteBehindConfig
// ---------------------------------------------------------------------------

/// Tuning knobs for the write-behind avatar cache.
#[derive(Debug, Clone)]
pub struct WriteBehindConfig {
    /// Budget for a single foreground read.
    pub read_timeout: Duration,

    /// Interval between background flushes.
    pub flush_interval: Duration,

    /// Budget for one flush batch.
    pub flush_timeout: Duration,

    /// Buffered writes held before an overflow flush (or shed).
    pub max_pending: usize,

    /// Consecutive store failures that trip the breaker.
    pub breaker_threshold: u32,

    /// How long store access stays paused after the breaker trips.
    pub breaker_cooldown: Duration,
}

impl Default for WriteBehindConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(100),
            flush_interval: Duration::from_secs(10),
            flush_timeout: Duration::from_secs(3),
            max_pending: 2000,
            breaker_threshold: 5,
            breaker_cooldown: Duration::from_secs(30),
        }
    }
}

impl WriteBehindConfig {
    /// Creates a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the foreground read budget.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Builder: set the background flush interval.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Builder: set the flush batch budget.
    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// Builder: set the pending buffer cap.
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Builder: set the breaker failure threshold.
    pub fn with_breaker_threshold(mut self, threshold: u32) -> Self {
        self.breaker_threshold = threshold;
        self
    }

    /// Builder: set the breaker cooldown.
    pub fn with_breaker_cooldown(mut self, cooldown: Duration) -> Self {
        self.breaker_cooldown = cooldown;
        self
    }
}
