//! Command implementations.

use std::path::Path;

use livefeed_ingest::{WriteBehindCache, WriteBehindConfig, load_cache_settings};

use crate::cli::default_cache_settings_path;

pub mod avatar;
pub mod watch;

/// Opens the avatar cache from explicit or default settings.
///
/// A missing or invalid settings file turns the cache off; commands
/// never fail because of it.
pub(crate) fn open_cache(explicit: Option<&Path>, no_cache: bool) -> WriteBehindCache {
    if no_cache {
        return WriteBehindCache::disabled();
    }
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(default_cache_settings_path);
    match load_cache_settings(&path) {
        Some(settings) => WriteBehindCache::open(&settings, WriteBehindConfig::default()),
        None => WriteBehindCache::disabled(),
    }
}
