//! Avatar provider pool with block-aware failover.
//!
//! This crate provides the abstraction layer for avatar lookups:
//!
//! - [`AvatarProvider`] - The core trait each REST endpoint implements
//! - [`ProviderPool`] - Round-robin failover across providers with
//!   per-provider block cooldowns
//! - [`AvatarFetch`] - Answered outcomes (found, miss, blocked)
//! - [`ProviderError`] - Error types for provider operations
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ space profile │   │   user card   │   │   room host   │
//! └───────┬───────┘   └───────┬───────┘   └───────┬───────┘
//!         │                   │                   │
//!         │           AvatarProvider              │
//!         └───────────────────┼───────────────────┘
//!                             │
//!                             ▼
//!                      ┌──────────────┐  round-robin cursor,
//!                      │ ProviderPool │  per-slot block
//!                      └──────┬───────┘  cooldowns
//!                             │
//!                             ▼
//!                     Option<avatar URL>
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use livefeed_providers::{AvatarProvider, PoolConfig, ProviderPool, StaticProvider};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let providers: Vec<Arc<dyn AvatarProvider>> = vec![
//!     Arc::new(StaticProvider::miss("primary")),
//!     Arc::new(StaticProvider::found("backup", "https://i0.example/face.jpg")),
//! ];
//! let pool = ProviderPool::new(providers, PoolConfig::default());
//!
//! // the primary misses, the pool fails over to the backup
//! assert_eq!(
//!     pool.fetch_avatar(42).await.as_deref(),
//!     Some("https://i0.example/face.jpg")
//! );
//! # }
//! ```

pub mod endpoints;
pub mod error;
pub mod pool;
pub mod provider;

// Re-export main types at crate root
pub use endpoints::{
    LIVE_API_BASE, MAIN_API_BASE, RoomHostProvider, SpaceProfileProvider, UserCardProvider,
    default_endpoints,
};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use pool::{PoolConfig, ProviderPool};
pub use provider::{AvatarFetch, AvatarProvider, BoxFuture, StaticProvider};
