//! AvatarProvider trait definition.
//!
//! This module defines the [`AvatarProvider`] trait, the abstraction over
//! the public REST endpoints that can resolve a user id to an avatar URL.
//!
//! Providers distinguish three answered outcomes via [`AvatarFetch`]:
//! - `Found` - a usable avatar URL came back
//! - `Miss` - the endpoint answered but has nothing for this user
//! - `Blocked` - the endpoint refused the request (anti-crawler gate)
//!
//! Transport and protocol failures are `Err(ProviderError)` instead.

use std::future::Future;
use std::pin::Pin;

use crate::error::ProviderResult;

/// A boxed future, as returned by object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The outcome of one avatar lookup against one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarFetch {
    /// The provider returned a usable avatar URL.
    Found(String),
    /// The provider answered but has no avatar for this user.
    Miss,
    /// The provider refused to answer (HTTP 412 or envelope code -412).
    Blocked,
}

impl AvatarFetch {
    /// Returns the avatar URL if this outcome carries one.
    pub fn url(self) -> Option<String> {
        match self {
            AvatarFetch::Found(url) => Some(url),
            AvatarFetch::Miss | AvatarFetch::Blocked => None,
        }
    }
}

/// A remote endpoint that resolves user ids to avatar URLs.
///
/// Implementations must be safe to call concurrently; the pool shares
/// them behind `Arc` across tasks.
pub trait AvatarProvider: Send + Sync {
    /// Returns the short identifier used in logs and error messages.
    fn name(&self) -> &str;

    /// Looks up the avatar URL for the given user id.
    fn fetch(&self, uid: u64) -> BoxFuture<'_, ProviderResult<AvatarFetch>>;
}

/// A provider that always answers with the same outcome.
///
/// Used in tests and as a stand-in when wiring code that should not
/// touch the network.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    name: String,
    url: Option<String>,
}

impl StaticProvider {
    /// Creates a provider that always finds the given URL.
    pub fn found(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
        }
    }

    /// Creates a provider that always misses.
    pub fn miss(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
        }
    }
}

impl AvatarProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, _uid: u64) -> BoxFuture<'_, ProviderResult<AvatarFetch>> {
        let outcome = match &self.url {
            Some(url) => AvatarFetch::Found(url.clone()),
            None => AvatarFetch::Miss,
        };
        Box::pin(async move { Ok(outcome) })
    }
}
