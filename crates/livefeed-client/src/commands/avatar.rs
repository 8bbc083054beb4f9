//! Avatar command: resolves one user's avatar URL.

use livefeed_ingest::CacheEntry;
use livefeed_providers::{PoolConfig, ProviderPool};

use crate::cli::AvatarArgs;
use crate::error::{ClientError, ClientResult};

/// Prints the avatar URL for a uid, cache first, then the providers.
pub async fn run(args: &AvatarArgs) -> ClientResult<()> {
    let cache = super::open_cache(args.cache_config.as_deref(), args.no_cache);

    if let Some(face) = cache.get(args.uid).await {
        println!("{}", face);
        return Ok(());
    }

    let pool = ProviderPool::with_default_endpoints(PoolConfig::new())
        .map_err(|e| ClientError::Provider(e.to_string()))?;
    match pool.fetch_avatar(args.uid).await {
        Some(face) => {
            cache.put(CacheEntry::new(args.uid, face.as_str()));
            cache.flush_now().await;
            println!("{}", face);
            Ok(())
        }
        None => Err(ClientError::Provider(format!(
            "no avatar found for uid {}",
            args.uid
        ))),
    }
}
