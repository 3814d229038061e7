use crate::code::Code;
use crate::error::Result;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A stored shortlink: a code mapped to a destination URL, with an optional
/// expiry instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortlink {
    /// The short code, unique across the store.
    pub code: Code,
    /// The redirect target. No scheme validation is performed.
    pub url: String,
    /// When the link expires, if ever. `None` means never.
    pub ttl: Option<Timestamp>,
}

impl Shortlink {
    /// Creates a shortlink without an expiry.
    pub fn new(code: Code, url: impl Into<String>) -> Self {
        Self {
            code,
            url: url.into(),
            ttl: None,
        }
    }

    /// Creates a shortlink that expires at the given instant.
    pub fn with_ttl(code: Code, url: impl Into<String>, ttl: Timestamp) -> Self {
        Self {
            code,
            url: url.into(),
            ttl: Some(ttl),
        }
    }

    /// Whether the link is logically expired at the current wall-clock time.
    pub fn is_expired(&self) -> bool {
        self.ttl.is_some_and(|ttl| Timestamp::now() >= ttl)
    }
}

/// The storage contract shared by both backends.
///
/// Implementations must be safe for unsynchronized concurrent use; every
/// method may block on disk or network I/O. Callers cancel an in-flight
/// operation by dropping the future (for example via `tokio::time::timeout`).
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Retrieves the shortlink for a code.
    ///
    /// Returns `None` both when no row exists and when a row exists but its
    /// `ttl` has passed, regardless of whether the backend has physically
    /// reclaimed it yet.
    async fn get(&self, code: &Code) -> Result<Option<Shortlink>>;

    /// Creates or fully replaces the shortlink stored under its code.
    ///
    /// An upsert with `ttl: None` clears any previously stored expiry.
    async fn upsert(&self, link: Shortlink) -> Result<()>;

    /// Deletes the shortlink for a code. Deleting a code that does not
    /// exist is not an error.
    async fn delete(&self, code: &Code) -> Result<()>;

    /// Returns one page of stored shortlinks plus the total number of
    /// physically stored rows.
    ///
    /// Pagination is offset-based (`skip = page * size`) in a stable
    /// backend-defined order. Rows whose `ttl` has passed but which have not
    /// been reclaimed yet may still appear; listing is best-effort and does
    /// not snapshot against concurrent writes.
    async fn list(&self, page: u64, size: u64) -> Result<(Vec<Shortlink>, u64)>;

    /// Removes every stored row whose key violates the code-format
    /// invariant, an artifact of an earlier schema that allowed arbitrary
    /// keys.
    ///
    /// Must run exactly once at startup, before traffic is served. Errors
    /// are fatal to startup.
    async fn migrate(&self) -> Result<()>;

    /// Releases backend resources, stopping any background maintenance
    /// task first. Called exactly once at shutdown.
    async fn close(&self) -> Result<()>;
}
