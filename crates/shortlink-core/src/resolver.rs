use std::sync::Arc;

use crate::code::Code;
use crate::error::Result;
use crate::repository::Repository;
use jiff::Timestamp;
use tracing::{debug, trace, warn};

/// Resolution policy for the public redirect path.
///
/// Wraps a [`Repository`] and decides redirect vs. not-found: syntactically
/// invalid codes never reach the store, and expiry is re-checked here even
/// though both backends already enforce it at read time.
#[derive(Debug, Clone)]
pub struct ResolverService<R> {
    repository: Arc<R>,
}

impl<R: Repository> ResolverService<R> {
    /// Creates a resolver over the given repository.
    pub fn new(repository: R) -> Self {
        Self::from_shared(Arc::new(repository))
    }

    /// Creates a resolver over a repository that is shared with other
    /// consumers.
    pub fn from_shared(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Resolves a raw code to its destination URL.
    ///
    /// Returns `Ok(None)` if the code is malformed, unknown, or expired.
    pub async fn resolve(&self, code: &str) -> Result<Option<String>> {
        let Ok(code) = Code::new(code) else {
            warn!(code, "rejected malformed code");
            return Ok(None);
        };

        trace!(code = %code, "resolving short code");

        match self.repository.get(&code).await? {
            Some(link) => {
                if let Some(ttl) = link.ttl {
                    if Timestamp::now() >= ttl {
                        debug!(code = %code, "link has expired");
                        return Ok(None);
                    }
                }

                debug!(code = %code, url = %link.url, "resolved short code");
                Ok(Some(link.url))
            }
            None => {
                trace!(code = %code, "short code not found");
                Ok(None)
            }
        }
    }
}
