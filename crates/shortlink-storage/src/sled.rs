use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use shortlink_core::{Code, Repository, Result, Shortlink, StorageError};
use sled::{Batch, Db, IVec};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often the background maintenance task sweeps expired rows.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// On-disk value stored under the raw code key.
#[derive(Debug, Serialize, Deserialize)]
struct StoredLink {
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ttl: Option<Timestamp>,
}

/// Embedded-store implementation of the repository contract.
///
/// Each shortlink is one key-value row: the raw code bytes map to a JSON
/// `{url, ttl}` value. The engine has no per-key expiry metadata, so the
/// expiry instant travels in the value and every read compares it against
/// the wall clock; a background maintenance task reclaims expired rows on a
/// fixed interval. [`Repository::close`] stops and joins that task before
/// the final flush.
#[derive(Debug)]
pub struct SledRepository {
    db: Db,
    sweeper: CancellationToken,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SledRepository {
    /// Opens (or creates) the database at the given path and starts the
    /// maintenance task. Must be called from within a Tokio runtime.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path).map_err(map_sled_error)?;
        Ok(Self::with_interval(db, MAINTENANCE_INTERVAL))
    }

    fn with_interval(db: Db, period: Duration) -> Self {
        let sweeper = CancellationToken::new();
        let handle = tokio::spawn(run_maintenance(db.clone(), period, sweeper.clone()));
        Self {
            db,
            sweeper,
            sweeper_handle: Mutex::new(Some(handle)),
        }
    }
}

/// Periodic sweep of expired rows, until cancelled on close.
async fn run_maintenance(db: Db, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the first sweep should not.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let db = db.clone();
                match tokio::task::spawn_blocking(move || sweep_expired(&db)).await {
                    Ok(Ok(0)) => {}
                    Ok(Ok(removed)) => debug!(removed, "reclaimed expired shortlinks"),
                    // Non-fatal: the next cycle retries.
                    Ok(Err(err)) => warn!(error = %err, "maintenance sweep failed"),
                    Err(err) => warn!(error = %err, "maintenance task failed to run"),
                }
            }
        }
    }
}

/// Removes expired rows in repeated passes until a pass makes no further
/// progress, then flushes reclaimed space to disk.
fn sweep_expired(db: &Db) -> Result<u64> {
    let mut removed = 0u64;
    loop {
        let pass = sweep_pass(db)?;
        removed += pass;
        if pass == 0 {
            break;
        }
    }
    if removed > 0 {
        db.flush().map_err(map_sled_error)?;
    }
    Ok(removed)
}

fn sweep_pass(db: &Db) -> Result<u64> {
    let now = Timestamp::now();
    let mut removed = 0u64;

    for entry in db.iter() {
        let (key, value) = entry.map_err(map_sled_error)?;
        let Ok(stored) = serde_json::from_slice::<StoredLink>(&value) else {
            // Undecodable rows are the migration pass's concern.
            continue;
        };
        if stored.ttl.is_some_and(|ttl| now >= ttl) {
            // Compare-and-swap so a concurrent upsert that refreshed the
            // row is never thrown away.
            let swapped = db
                .compare_and_swap(&key, Some(&value), None::<IVec>)
                .map_err(map_sled_error)?;
            if swapped.is_ok() {
                removed += 1;
            }
        }
    }

    Ok(removed)
}

fn map_sled_error(err: sled::Error) -> StorageError {
    let message = err.to_string();
    match err {
        sled::Error::Io(_) => StorageError::Unavailable(message),
        sled::Error::Corruption { .. } => StorageError::InvalidData(message),
        _ => StorageError::Backend(message),
    }
}

fn decode(code: Code, value: &[u8]) -> Result<Shortlink> {
    let stored: StoredLink = serde_json::from_slice(value).map_err(|e| {
        StorageError::InvalidData(format!("stored value for '{}': {e}", code.as_str()))
    })?;
    Ok(Shortlink {
        code,
        url: stored.url,
        ttl: stored.ttl,
    })
}

#[async_trait]
impl Repository for SledRepository {
    async fn get(&self, code: &Code) -> Result<Option<Shortlink>> {
        let Some(value) = self.db.get(code.as_str()).map_err(map_sled_error)? else {
            return Ok(None);
        };

        let link = decode(code.clone(), &value)?;
        if link.is_expired() {
            return Ok(None);
        }
        Ok(Some(link))
    }

    async fn upsert(&self, link: Shortlink) -> Result<()> {
        let stored = StoredLink {
            url: link.url,
            ttl: link.ttl,
        };
        let value = serde_json::to_vec(&stored)
            .map_err(|e| StorageError::InvalidData(format!("encoding shortlink: {e}")))?;

        self.db
            .insert(link.code.as_str(), value)
            .map_err(map_sled_error)?;
        Ok(())
    }

    async fn delete(&self, code: &Code) -> Result<()> {
        self.db.remove(code.as_str()).map_err(map_sled_error)?;
        Ok(())
    }

    async fn list(&self, page: u64, size: u64) -> Result<(Vec<Shortlink>, u64)> {
        let db = self.db.clone();

        tokio::task::spawn_blocking(move || {
            let skip = page.saturating_mul(size);
            let end = skip.saturating_add(size);
            let mut links = Vec::new();
            let mut total = 0u64;

            // Keys are returned in lexicographic order, which is the stable
            // order this backend pages over.
            for entry in db.iter() {
                let (key, value) = entry.map_err(map_sled_error)?;
                if total >= skip && total < end {
                    let code = Code::new_unchecked(String::from_utf8_lossy(&key).into_owned());
                    links.push(decode(code, &value)?);
                }
                total += 1;
            }

            Ok((links, total))
        })
        .await
        .map_err(|e| StorageError::Backend(format!("list task failed: {e}")))?
    }

    async fn migrate(&self) -> Result<()> {
        let db = self.db.clone();

        tokio::task::spawn_blocking(move || {
            let mut batch = Batch::default();
            let mut removed = 0u64;

            for entry in db.iter() {
                let (key, value) = entry.map_err(map_sled_error)?;
                if Code::is_valid_bytes(&key) {
                    continue;
                }
                info!(
                    code = %String::from_utf8_lossy(&key),
                    dest = %String::from_utf8_lossy(&value),
                    "deleting invalid data",
                );
                batch.remove(key);
                removed += 1;
            }

            // All deletions commit atomically; a crash mid-migration leaves
            // the store un-mutated.
            if removed > 0 {
                db.apply_batch(batch).map_err(map_sled_error)?;
                db.flush().map_err(map_sled_error)?;
                info!(removed, "migration removed invalid keys");
            }

            Ok(())
        })
        .await
        .map_err(|e| StorageError::Backend(format!("migration task failed: {e}")))?
    }

    async fn close(&self) -> Result<()> {
        self.sweeper.cancel();
        if let Some(handle) = self.sweeper_handle.lock().await.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "maintenance task did not shut down cleanly");
            }
        }

        self.db.flush_async().await.map_err(map_sled_error)?;
        Ok(())
    }
}
