//! Persistent response cache
//!
//! Successful GET responses are stored in SQLite, keyed by an MD5 signature
//! of the request. The file backend lives at `<name>.sqlite`; a file that
//! cannot be opened or fails its integrity check is deleted and rebuilt so
//! that session creation never fails on a damaged cache.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, warn};

use crate::app::client::response::{FetchedResponse, ResponseMetadata};
use crate::constants::cache::{SQLITE_EXTENSION, TABLE_NAME};
use crate::errors::{SessionError, SessionResult};

/// Storage backends for the response cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// `<name>.sqlite` on disk
    Sqlite,
    /// Process-local, discarded with the session
    Memory,
}

impl FromStr for CacheBackend {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(CacheBackend::Sqlite),
            "memory" => Ok(CacheBackend::Memory),
            _ => Err(SessionError::UnsupportedBackend {
                backend: s.to_string(),
            }),
        }
    }
}

/// Response store shared by one session
#[derive(Debug, Clone)]
pub struct ResponseCache {
    pool: SqlitePool,
    path: Option<PathBuf>,
    expire_after: Option<Duration>,
}

type CachedRow = (String, i64, String, Vec<u8>, String);

impl ResponseCache {
    /// Open (or create) the cache called `name`
    pub async fn open(
        name: &Path,
        backend: CacheBackend,
        expire_after: Option<Duration>,
    ) -> SessionResult<Self> {
        let (pool, path) = match backend {
            CacheBackend::Sqlite => {
                let path = Self::database_path(name);
                (Self::open_file(&path).await?, Some(path))
            }
            CacheBackend::Memory => (Self::open_memory().await?, None),
        };

        Ok(Self {
            pool,
            path,
            expire_after,
        })
    }

    /// `name` with the SQLite extension appended (`cache` → `cache.sqlite`)
    pub fn database_path(name: &Path) -> PathBuf {
        let mut path = OsString::from(name.as_os_str());
        path.push(".");
        path.push(SQLITE_EXTENSION);
        PathBuf::from(path)
    }

    /// Location of the database file, `None` for the memory backend
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn open_file(path: &Path) -> SessionResult<SqlitePool> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SessionError::Cache(sqlx::Error::Io(e)))?;
        }

        match Self::connect_file(path).await {
            Ok(pool) => Ok(pool),
            Err(e) => {
                warn!(
                    "Response cache {} is unusable ({}); rebuilding it",
                    path.display(),
                    e
                );
                Self::remove_database(path).await;
                let pool = Self::connect_file(path).await?;
                info!("Rebuilt response cache {}", path.display());
                Ok(pool)
            }
        }
    }

    async fn connect_file(path: &Path) -> Result<SqlitePool, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        if let Err(e) = Self::prepare(&pool).await {
            pool.close().await;
            return Err(e);
        }
        Ok(pool)
    }

    async fn open_memory() -> SessionResult<SqlitePool> {
        // A single connection that never idles out keeps the database alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::prepare(&pool).await?;
        Ok(pool)
    }

    async fn prepare(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        let (status,): (String,) = sqlx::query_as("PRAGMA quick_check")
            .fetch_one(pool)
            .await?;
        if status != "ok" {
            return Err(sqlx::Error::Protocol(format!(
                "integrity check failed: {status}"
            )));
        }

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (
                key TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                status INTEGER NOT NULL,
                headers TEXT NOT NULL,
                body BLOB NOT NULL,
                stored_at TEXT NOT NULL
            )"
        ))
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn remove_database(path: &Path) {
        let mut journal = OsString::from(path.as_os_str());
        journal.push("-journal");
        for file in [path.to_path_buf(), PathBuf::from(journal)] {
            if let Err(e) = tokio::fs::remove_file(&file).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Could not remove {}: {}", file.display(), e);
                }
            }
        }
    }

    /// Signature identifying a GET of `url`
    pub fn key(url: &str) -> String {
        format!("{:x}", md5::compute(format!("GET {url}")))
    }

    /// Fresh cached response for `url`, if any
    pub async fn get(&self, url: &str) -> SessionResult<Option<FetchedResponse>> {
        let key = Self::key(url);
        let row: Option<CachedRow> = sqlx::query_as(&format!(
            "SELECT url, status, headers, body, stored_at FROM {TABLE_NAME} WHERE key = ?"
        ))
        .bind(&key)
        .fetch_optional(&self.pool)
        .await?;

        let Some((stored_url, status, headers, body, stored_at)) = row else {
            return Ok(None);
        };

        if self.is_expired(&stored_at) {
            debug!("Cached response for {} expired", url);
            sqlx::query(&format!("DELETE FROM {TABLE_NAME} WHERE key = ?"))
                .bind(&key)
                .execute(&self.pool)
                .await?;
            return Ok(None);
        }

        let headers: Vec<(String, String)> = serde_json::from_str(&headers)
            .map_err(|e| sqlx::Error::Protocol(format!("cached headers unreadable: {e}")))?;

        debug!("Serving {} from the response cache", url);
        Ok(Some(FetchedResponse {
            metadata: ResponseMetadata {
                url: stored_url,
                status: u16::try_from(status).unwrap_or(500),
                headers,
                content_length: Some(body.len() as u64),
                from_cache: true,
            },
            body,
        }))
    }

    /// Store `response` as the answer to a GET of `url`
    pub async fn put(&self, url: &str, response: &FetchedResponse) -> SessionResult<()> {
        let headers = serde_json::to_string(&response.metadata.headers)
            .map_err(|e| sqlx::Error::Protocol(format!("headers not serialisable: {e}")))?;

        sqlx::query(&format!(
            "INSERT OR REPLACE INTO {TABLE_NAME} (key, url, status, headers, body, stored_at)
             VALUES (?, ?, ?, ?, ?, ?)"
        ))
        .bind(Self::key(url))
        .bind(&response.metadata.url)
        .bind(i64::from(response.metadata.status))
        .bind(headers)
        .bind(&response.body)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Number of stored responses
    pub async fn len(&self) -> SessionResult<u64> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {TABLE_NAME}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0).unsigned_abs())
    }

    pub async fn is_empty(&self) -> SessionResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Close the underlying connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn is_expired(&self, stored_at: &str) -> bool {
        let Some(expire_after) = self.expire_after else {
            return false;
        };
        let Ok(stored) = DateTime::parse_from_rfc3339(stored_at) else {
            return true;
        };
        let age = Utc::now().signed_duration_since(stored.with_timezone(&Utc));
        age.to_std().map_or(false, |age| age > expire_after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn response(body: &[u8]) -> FetchedResponse {
        FetchedResponse {
            metadata: ResponseMetadata {
                url: "http://example.com/data.nc.dds".to_string(),
                status: 200,
                headers: vec![("content-type".to_string(), "text/plain".to_string())],
                content_length: Some(body.len() as u64),
                from_cache: false,
            },
            body: body.to_vec(),
        }
    }

    #[test]
    fn test_backend_names() {
        assert_eq!("sqlite".parse::<CacheBackend>().unwrap(), CacheBackend::Sqlite);
        assert_eq!("Memory".parse::<CacheBackend>().unwrap(), CacheBackend::Memory);
        let error = "mongodb".parse::<CacheBackend>().unwrap_err();
        assert!(matches!(error, SessionError::UnsupportedBackend { ref backend } if backend == "mongodb"));
    }

    #[test]
    fn test_database_path_appends_extension() {
        assert_eq!(
            ResponseCache::database_path(Path::new("/tmp/cache")),
            PathBuf::from("/tmp/cache.sqlite")
        );
        assert_eq!(
            ResponseCache::database_path(Path::new("runs/v1.2")),
            PathBuf::from("runs/v1.2.sqlite")
        );
    }

    #[test]
    fn test_key_is_stable_md5() {
        let key = ResponseCache::key("http://example.com/a");
        assert_eq!(key.len(), 32);
        assert_eq!(key, ResponseCache::key("http://example.com/a"));
        assert_ne!(key, ResponseCache::key("http://example.com/b"));
    }

    #[tokio::test]
    async fn test_memory_cache_round_trip() {
        let cache = ResponseCache::open(Path::new("unused"), CacheBackend::Memory, None)
            .await
            .unwrap();
        assert!(cache.is_empty().await.unwrap());

        cache.put("http://example.com/a", &response(b"payload")).await.unwrap();
        let cached = cache.get("http://example.com/a").await.unwrap().unwrap();
        assert_eq!(cached.body, b"payload");
        assert!(cached.metadata.from_cache);
        assert_eq!(cached.metadata.header("Content-Type"), Some("text/plain"));
        assert!(cache.get("http://example.com/b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entries_are_dropped() {
        let cache = ResponseCache::open(
            Path::new("unused"),
            CacheBackend::Memory,
            Some(Duration::from_millis(1)),
        )
        .await
        .unwrap();
        cache.put("http://example.com/a", &response(b"old")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cache.get("http://example.com/a").await.unwrap().is_none());
        assert_eq!(cache.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupted_file_is_rebuilt() {
        let dir = tempdir().unwrap();
        let name = dir.path().join("cache");
        let path = ResponseCache::database_path(&name);
        std::fs::write(&path, vec![0x42u8; 10_000]).unwrap();

        let cache = ResponseCache::open(&name, CacheBackend::Sqlite, None)
            .await
            .unwrap();
        cache.put("http://example.com/a", &response(b"x")).await.unwrap();
        assert_eq!(cache.len().await.unwrap(), 1);
        assert_eq!(cache.path(), Some(path.as_path()));
        cache.close().await;
    }

    #[tokio::test]
    async fn test_missing_parent_directories_are_created() {
        let dir = tempdir().unwrap();
        let name = dir.path().join("nested/runs/cache");

        let cache = ResponseCache::open(&name, CacheBackend::Sqlite, None)
            .await
            .unwrap();
        assert!(ResponseCache::database_path(&name).exists());
        cache.close().await;
    }
}
