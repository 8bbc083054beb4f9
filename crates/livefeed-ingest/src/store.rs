//! SQLite avatar store.
//!
//! Plain synchronous persistence behind an r2d2 pool. The async
//! write-behind layer in [`crate::cache`] owns all scheduling; this
//! module only knows how to read and write rows.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use crate::cache::CacheEntry;
use crate::config::CacheStoreSettings;
use crate::error::{IngestError, IngestResult};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS avatar_cache (
    uid INTEGER PRIMARY KEY,
    face_url TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

/// Pooled handle to the avatar database.
#[derive(Clone)]
pub struct AvatarStore {
    pool: Pool<SqliteConnectionManager>,
}

impl AvatarStore {
    /// Opens (and if needed creates) the avatar database.
    pub fn open(settings: &CacheStoreSettings) -> IngestResult<Self> {
        // r2d2 asserts on a zero pool size, so reject it up front.
        if settings.max_connections == 0 {
            return Err(IngestError::cache_config("max_connections must be at least 1"));
        }
        if let Some(parent) = settings.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let manager = SqliteConnectionManager::file(&settings.path);
        let pool = Pool::builder()
            .max_size(settings.max_connections)
            .connection_timeout(settings.connect_timeout())
            .build(manager)?;
        let store = Self { pool };
        store.ensure_schema()?;
        debug!(path = %settings.path.display(), "Avatar store opened");
        Ok(store)
    }

    fn ensure_schema(&self) -> IngestResult<()> {
        let conn = self.pool.get()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Looks up the cached avatar URL for a uid.
    pub fn select_face(&self, uid: u64) -> IngestResult<Option<String>> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare_cached("SELECT face_url FROM avatar_cache WHERE uid = ?1")?;
        let face = stmt
            .query_row([uid as i64], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(face)
    }

    /// Writes a batch of entries, replacing rows that already exist.
    pub fn upsert_many(&self, entries: &[CacheEntry]) -> IngestResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO avatar_cache (uid, face_url, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(uid) DO UPDATE SET
                     face_url = excluded.face_url,
                     updated_at = excluded.updated_at",
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.uid as i64,
                    entry.face_url,
                    entry.updated_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        debug!(rows = entries.len(), "Avatar batch written");
        Ok(())
    }

    /// Number of cached avatars.
    pub fn count(&self) -> IngestResult<u64> {
        let conn = self.pool.get()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM avatar_cache", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl std::fmt::Debug for AvatarStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvatarStore").finish_non_exhaustive()
    }
}
