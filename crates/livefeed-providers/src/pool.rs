//! Failover pool over avatar providers.
//!
//! The pool rotates through its providers round-robin so load spreads
//! across endpoints, and remembers which providers the anti-crawler
//! gate has blocked. A blocked provider sits out a cooldown window and
//! rejoins rotation automatically once it expires.
//!
//! Outcome handling per attempt:
//! - `Found` - resolved, the call returns
//! - `Miss` - advance to the next provider, no penalty
//! - `Blocked` - bench the provider for the cooldown, then advance
//! - `Err` - log and advance, no penalty (transient transport faults
//!   should not bench an endpoint)

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reqwest::Client;
use tracing::{debug, warn};

use crate::endpoints::default_endpoints;
use crate::error::{ProviderError, ProviderResult};
use crate::provider::{AvatarFetch, AvatarProvider};

/// Tuning knobs for the provider pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Per-request timeout applied to the shared HTTP client.
    pub request_timeout: Duration,
    /// How long a blocked provider sits out before rejoining rotation.
    pub block_cooldown: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            block_cooldown: Duration::from_secs(180),
        }
    }
}

impl PoolConfig {
    /// Creates a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builder method to set the block cooldown.
    pub fn with_block_cooldown(mut self, cooldown: Duration) -> Self {
        self.block_cooldown = cooldown;
        self
    }
}

/// Rotation state for one pool slot.
#[derive(Debug)]
struct SlotState {
    available: bool,
    cooldown_until: Option<Instant>,
}

#[derive(Debug)]
struct PoolState {
    cursor: usize,
    slots: Vec<SlotState>,
}

/// Round-robin failover pool over avatar providers.
pub struct ProviderPool {
    providers: Vec<Arc<dyn AvatarProvider>>,
    state: Mutex<PoolState>,
    block_cooldown: Duration,
}

impl ProviderPool {
    /// Creates a pool over the given providers.
    ///
    /// The vector order is the rotation order.
    pub fn new(providers: Vec<Arc<dyn AvatarProvider>>, config: PoolConfig) -> Self {
        let slots = providers
            .iter()
            .map(|_| SlotState {
                available: true,
                cooldown_until: None,
            })
            .collect();
        Self {
            providers,
            state: Mutex::new(PoolState { cursor: 0, slots }),
            block_cooldown: config.block_cooldown,
        }
    }

    /// Creates a pool over the standard endpoints, sharing one HTTP
    /// client configured with the pool's request timeout.
    pub fn with_default_endpoints(config: PoolConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                ProviderError::configuration("failed to build http client").with_source(e)
            })?;
        let providers = default_endpoints(&client)?;
        Ok(Self::new(providers, config))
    }

    /// Resolves an avatar URL for `uid`, failing over across providers.
    ///
    /// Tries at most one full rotation. Returns `None` when every
    /// provider missed, errored, or is benched; the caller treats that
    /// as "no avatar right now", never as fatal.
    pub async fn fetch_avatar(&self, uid: u64) -> Option<String> {
        for _ in 0..self.providers.len() {
            let idx = self.next_available()?;
            let provider = &self.providers[idx];
            match provider.fetch(uid).await {
                Ok(AvatarFetch::Found(url)) => {
                    debug!(provider = provider.name(), uid, "avatar resolved");
                    return Some(url);
                }
                Ok(AvatarFetch::Miss) => {
                    debug!(provider = provider.name(), uid, "avatar miss");
                }
                Ok(AvatarFetch::Blocked) => {
                    self.mark_blocked(idx);
                }
                Err(err) => {
                    warn!(provider = provider.name(), uid, error = %err, "avatar lookup failed");
                }
            }
        }
        None
    }

    /// Total number of providers in the pool.
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Number of providers currently in rotation.
    ///
    /// A benched provider counts as out of rotation until a lookup
    /// revisits it after its cooldown, so this can lag recovery.
    pub fn available_count(&self) -> usize {
        let state = self.state.lock();
        state.slots.iter().filter(|s| s.available).count()
    }

    /// Picks the next provider in rotation, restoring any benched slot
    /// whose cooldown has expired along the way.
    fn next_available(&self) -> Option<usize> {
        let len = self.providers.len();
        if len == 0 {
            return None;
        }

        let now = Instant::now();
        let mut state = self.state.lock();
        for step in 0..len {
            let idx = (state.cursor + step) % len;
            let slot = &mut state.slots[idx];
            if !slot.available {
                match slot.cooldown_until {
                    Some(until) if now >= until => {
                        slot.available = true;
                        slot.cooldown_until = None;
                        debug!(
                            provider = self.providers[idx].name(),
                            "cooldown expired, provider back in rotation"
                        );
                    }
                    _ => continue,
                }
            }
            state.cursor = (idx + 1) % len;
            return Some(idx);
        }
        None
    }

    /// Benches a provider for the configured cooldown.
    fn mark_blocked(&self, idx: usize) {
        let mut state = self.state.lock();
        let slot = &mut state.slots[idx];
        slot.available = false;
        slot.cooldown_until = Some(Instant::now() + self.block_cooldown);
        warn!(
            provider = self.providers[idx].name(),
            cooldown_secs = self.block_cooldown.as_secs(),
            "provider blocked, removing from rotation"
        );
    }
}
