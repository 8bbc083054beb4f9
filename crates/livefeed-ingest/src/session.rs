//! High-level room session.
//!
//! Bundles a running supervisor with the avatar pipeline so an
//! application deals with one object: events out, avatar lookups in.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use livefeed_core::{BusinessEvent, ConnectionStatus};
use livefeed_providers::ProviderPool;

use crate::cache::{CacheEntry, WriteBehindCache};
use crate::config::RoomConfig;
use crate::error::IngestResult;
use crate::supervisor::{RoomSupervisor, SupervisorHandle};

/// A live room connection with avatar resolution.
pub struct RoomSession {
    handle: SupervisorHandle,
    events: Option<mpsc::Receiver<BusinessEvent>>,
    status: watch::Receiver<ConnectionStatus>,
    online: watch::Receiver<Option<u32>>,
    pool: Arc<ProviderPool>,
    cache: Arc<WriteBehindCache>,
    task: JoinHandle<()>,
}

impl RoomSession {
    /// Spawns the supervisor and wires the avatar pipeline.
    pub fn open(
        config: RoomConfig,
        pool: Arc<ProviderPool>,
        cache: Arc<WriteBehindCache>,
    ) -> IngestResult<Self> {
        let mut supervisor = RoomSupervisor::new(config)?;
        let handle = supervisor.handle();
        let status = supervisor.status();
        let online = supervisor.online_count();
        let events = supervisor.take_events();
        let task = tokio::spawn(supervisor.run());
        Ok(Self {
            handle,
            events,
            status,
            online,
            pool,
            cache,
            task,
        })
    }

    /// Takes the business event receiver. Yields `None` after the
    /// first call.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<BusinessEvent>> {
        self.events.take()
    }

    /// Watch channel tracking the connection status.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Watch channel tracking the online count.
    pub fn online_count(&self) -> watch::Receiver<Option<u32>> {
        self.online.clone()
    }

    /// Resolves a user's avatar URL, cache first, then the provider
    /// pool. Provider hits are written back to the cache.
    pub async fn resolve_avatar(&self, uid: u64) -> Option<String> {
        if let Some(face) = self.cache.get(uid).await {
            return Some(face);
        }
        let face = self.pool.fetch_avatar(uid).await?;
        self.cache.put(CacheEntry::new(uid, face.as_str()));
        Some(face)
    }

    /// Returns the cached avatar URL without consulting the providers.
    pub async fn cached_avatar(&self, uid: u64) -> Option<String> {
        self.cache.get(uid).await
    }

    /// Stores an avatar URL observed elsewhere.
    pub fn cache_avatar(&self, uid: u64, face_url: impl Into<String>) {
        self.cache.put(CacheEntry::new(uid, face_url));
    }

    /// Disconnects, waits for the supervisor, and flushes the cache.
    pub async fn close(self) {
        self.handle.disconnect().await;
        if let Err(e) = self.task.await {
            debug!(error = %e, "Supervisor task ended abnormally");
        }
        self.cache.flush_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheStoreSettings, WriteBehindConfig};
    use livefeed_providers::{AvatarProvider, PoolConfig, StaticProvider};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// A negotiation endpoint that always refuses, so the supervisor
    /// sits quietly in its retry loop during the test.
    async fn dead_gateway_api() -> MockServer {
        let api = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/xlive/web-room/v1/index/getDanmuInfo"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&api)
            .await;
        api
    }

    fn quiet_config(api: &MockServer) -> RoomConfig {
        RoomConfig::new(9000)
            .with_api_base(api.uri())
            .with_use_tls(false)
            .with_reconnect_delay(Duration::from_secs(30))
    }

    fn pool_of(provider: StaticProvider) -> Arc<ProviderPool> {
        let providers: Vec<Arc<dyn AvatarProvider>> = vec![Arc::new(provider)];
        Arc::new(ProviderPool::new(providers, PoolConfig::new()))
    }

    fn temp_cache(dir: &tempfile::TempDir) -> Arc<WriteBehindCache> {
        Arc::new(WriteBehindCache::open(
            &CacheStoreSettings::new(dir.path().join("avatars.db")),
            WriteBehindConfig::default(),
        ))
    }

    #[tokio::test]
    async fn resolve_avatar_caches_provider_hits() {
        let api = dead_gateway_api().await;
        let dir = tempfile::tempdir().unwrap();
        let cache = temp_cache(&dir);
        let pool = pool_of(StaticProvider::found(
            "static",
            "https://img.example.com/9.png",
        ));

        let session =
            RoomSession::open(quiet_config(&api), pool, Arc::clone(&cache)).unwrap();

        let face = session.resolve_avatar(9).await;
        assert_eq!(face.as_deref(), Some("https://img.example.com/9.png"));
        assert_eq!(
            cache.get(9).await.as_deref(),
            Some("https://img.example.com/9.png")
        );

        session.close().await;
    }

    #[tokio::test]
    async fn cache_hit_skips_providers() {
        let api = dead_gateway_api().await;
        let dir = tempfile::tempdir().unwrap();
        let cache = temp_cache(&dir);
        cache.put(CacheEntry::new(7, "https://img.example.com/cached.png"));

        let pool = pool_of(StaticProvider::found(
            "static",
            "https://img.example.com/fresh.png",
        ));
        let session =
            RoomSession::open(quiet_config(&api), pool, Arc::clone(&cache)).unwrap();

        assert_eq!(
            session.resolve_avatar(7).await.as_deref(),
            Some("https://img.example.com/cached.png")
        );

        session.close().await;
    }

    #[tokio::test]
    async fn cache_avatar_is_readable_without_providers() {
        let api = dead_gateway_api().await;
        let dir = tempfile::tempdir().unwrap();
        let cache = temp_cache(&dir);
        let pool = pool_of(StaticProvider::miss("static"));

        let session =
            RoomSession::open(quiet_config(&api), pool, Arc::clone(&cache)).unwrap();

        assert_eq!(session.cached_avatar(3).await, None);
        session.cache_avatar(3, "https://img.example.com/3.png");
        assert_eq!(
            session.cached_avatar(3).await.as_deref(),
            Some("https://img.example.com/3.png")
        );

        session.close().await;
    }

    #[tokio::test]
    async fn miss_everywhere_resolves_to_none() {
        let api = dead_gateway_api().await;
        let dir = tempfile::tempdir().unwrap();
        let cache = temp_cache(&dir);
        let pool = pool_of(StaticProvider::miss("static"));

        let session =
            RoomSession::open(quiet_config(&api), pool, Arc::clone(&cache)).unwrap();

        assert_eq!(session.resolve_avatar(7).await, None);
        assert_eq!(cache.get(7).await, None);

        session.close().await;
    }
}
