use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use jiff::Timestamp;
use mongodb::bson::{doc, DateTime};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use shortlink_core::{Code, Repository, Result, Shortlink, StorageError};
use tracing::info;

const CODE_COLLECTION: &str = "codes";
const DEFAULT_DATABASE: &str = "shortlink";

/// One document per code.
#[derive(Debug, Serialize, Deserialize)]
struct ShortlinkDocument {
    #[serde(rename = "_id")]
    code: String,
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ttl: Option<DateTime>,
}

impl ShortlinkDocument {
    fn into_shortlink(self) -> Result<Shortlink> {
        let ttl = self
            .ttl
            .map(|dt| {
                Timestamp::from_millisecond(dt.timestamp_millis()).map_err(|e| {
                    StorageError::InvalidData(format!(
                        "invalid ttl for '{}': {e}",
                        self.code
                    ))
                })
            })
            .transpose()?;

        Ok(Shortlink {
            code: Code::new_unchecked(self.code),
            url: self.url,
            ttl,
        })
    }
}

/// Document-store implementation of the repository contract.
///
/// Physical reclamation of expired documents is delegated to the server's
/// TTL monitor via an index on the `ttl` field. That reaper runs on the
/// order of once a minute, so `get` additionally compares `ttl` against the
/// wall clock and hides documents the reaper has not swept yet.
#[derive(Debug, Clone)]
pub struct MongoRepository {
    client: Client,
    collection: Collection<ShortlinkDocument>,
}

impl MongoRepository {
    /// Creates a repository over an existing client and database, ensuring
    /// the TTL index exists.
    pub async fn new(client: Client, database: Database) -> Result<Self> {
        let collection = database.collection::<ShortlinkDocument>(CODE_COLLECTION);

        let index = IndexModel::builder()
            .keys(doc! { "ttl": 1 })
            .options(
                IndexOptions::builder()
                    .expire_after(Duration::from_secs(1))
                    .build(),
            )
            .build();
        collection
            .create_index(index)
            .await
            .map_err(map_mongo_error)?;

        Ok(Self { client, collection })
    }

    /// Creates a repository by connecting to the given MongoDB URI. The
    /// database is taken from the URI path, falling back to `shortlink`.
    pub async fn connect(uri: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await.map_err(map_mongo_error)?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE));
        Self::new(client.clone(), database).await
    }
}

fn map_mongo_error(err: mongodb::error::Error) -> StorageError {
    use mongodb::error::ErrorKind;

    let message = err.to_string();
    match err.kind.as_ref() {
        ErrorKind::Io(_)
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::ConnectionPoolCleared { .. } => StorageError::Unavailable(message),
        ErrorKind::BsonSerialization(_) | ErrorKind::BsonDeserialization(_) => {
            StorageError::InvalidData(message)
        }
        _ => StorageError::Backend(message),
    }
}

#[async_trait]
impl Repository for MongoRepository {
    async fn get(&self, code: &Code) -> Result<Option<Shortlink>> {
        let document = self
            .collection
            .find_one(doc! { "_id": code.as_str() })
            .await
            .map_err(map_mongo_error)?;

        let Some(document) = document else {
            return Ok(None);
        };

        let link = document.into_shortlink()?;
        // The server-side reaper is eventually consistent; an expired
        // document may still be physically present.
        if link.is_expired() {
            return Ok(None);
        }
        Ok(Some(link))
    }

    async fn upsert(&self, link: Shortlink) -> Result<()> {
        let update = match link.ttl {
            Some(ttl) => doc! {
                "$set": {
                    "url": link.url.as_str(),
                    "ttl": DateTime::from_millis(ttl.as_millisecond()),
                },
            },
            // Unset explicitly so the reaper never sweeps on a stale value.
            None => doc! {
                "$set": { "url": link.url.as_str() },
                "$unset": { "ttl": "" },
            },
        };

        self.collection
            .update_one(doc! { "_id": link.code.as_str() }, update)
            .upsert(true)
            .await
            .map_err(map_mongo_error)?;
        Ok(())
    }

    async fn delete(&self, code: &Code) -> Result<()> {
        // Zero matched documents is not an error; delete is idempotent.
        self.collection
            .delete_one(doc! { "_id": code.as_str() })
            .await
            .map_err(map_mongo_error)?;
        Ok(())
    }

    async fn list(&self, page: u64, size: u64) -> Result<(Vec<Shortlink>, u64)> {
        let skip = page.saturating_mul(size);
        let limit = i64::try_from(size).unwrap_or(i64::MAX);

        let mut cursor = self
            .collection
            .find(doc! {})
            .skip(skip)
            .limit(limit)
            .await
            .map_err(map_mongo_error)?;

        let mut links = Vec::new();
        while let Some(document) = cursor.try_next().await.map_err(map_mongo_error)? {
            links.push(document.into_shortlink()?);
        }

        let total = self
            .collection
            .count_documents(doc! {})
            .await
            .map_err(map_mongo_error)?;

        Ok((links, total))
    }

    async fn migrate(&self) -> Result<()> {
        let mut cursor = self
            .collection
            .find(doc! {})
            .await
            .map_err(map_mongo_error)?;

        let mut removed = 0u64;
        while let Some(document) = cursor.try_next().await.map_err(map_mongo_error)? {
            if Code::is_valid(&document.code) {
                continue;
            }
            info!(code = %document.code, dest = %document.url, "deleting invalid data");
            self.collection
                .delete_one(doc! { "_id": document.code.as_str() })
                .await
                .map_err(map_mongo_error)?;
            removed += 1;
        }

        if removed > 0 {
            info!(removed, "migration removed invalid keys");
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}
