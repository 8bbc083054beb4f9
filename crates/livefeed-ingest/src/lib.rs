//! Live-room ingestion.
//!
//! Connects to a live room's gateway, keeps the connection healthy,
//! and turns its binary frame stream into typed business events, with
//! avatar resolution layered on top:
//!
//! ```text
//!   REST negotiate ──> WebSocket gateway ──> frames ──> dispatcher ──> events
//!                                                                        │
//!        avatar providers <────────── resolve_avatar <────────── application
//!               │
//!        write-behind SQLite cache
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use livefeed_ingest::{RoomConfig, RoomSession, WriteBehindCache};
//! use livefeed_providers::{PoolConfig, ProviderPool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = Arc::new(ProviderPool::with_default_endpoints(PoolConfig::new())?);
//!     let cache = Arc::new(WriteBehindCache::disabled());
//!     let mut session = RoomSession::open(RoomConfig::new(642922), pool, cache)?;
//!
//!     let mut events = session.take_events().unwrap();
//!     while let Some(event) = events.recv().await {
//!         println!("{}: {}", event.cmd, event.payload);
//!     }
//!     session.close().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod negotiate;
pub mod session;
pub mod store;
pub mod supervisor;

pub use cache::{CacheEntry, WriteBehindCache};
pub use config::{
    CacheStoreSettings, DEFAULT_API_BASE, RoomConfig, WriteBehindConfig, load_cache_settings,
};
pub use dispatch::{DEFAULT_ALLOWED_CMDS, MessageDispatcher};
pub use error::{IngestError, IngestResult};
pub use negotiate::{GatewayHost, GatewayTicket, fetch_gateway_ticket};
pub use session::RoomSession;
pub use store::AvatarStore;
pub use supervisor::{RoomSupervisor, SupervisorCommand, SupervisorHandle};
