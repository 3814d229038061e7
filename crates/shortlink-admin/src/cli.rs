use clap::{Parser, Subcommand, ValueEnum};
use jiff::Timestamp;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const STORAGE_BACKEND_ENV: &str = "SHORTLINK_STORAGE_BACKEND";
pub const SLED_PATH_ENV: &str = "SHORTLINK_SLED_PATH";
pub const MONGODB_URI_ENV: &str = "SHORTLINK_MONGODB_URI";

pub const DEFAULT_SLED_PATH: &str = "./storage";
pub const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017/shortlink";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "sled")]
    Sled,
    #[value(name = "mongodb")]
    MongoDb,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::Sled => write!(f, "sled"),
            StorageBackendArg::MongoDb => write!(f, "mongodb"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "shortlink-admin")]
pub struct CLI {
    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::Sled
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = SLED_PATH_ENV, default_value = DEFAULT_SLED_PATH)]
    pub sled_path: PathBuf,

    #[arg(long, env = MONGODB_URI_ENV, default_value = DEFAULT_MONGODB_URI)]
    pub mongodb_uri: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve a code to its destination URL.
    Get { code: String },
    /// Create or replace a shortlink.
    Set {
        code: String,
        url: String,
        /// Expiry instant (RFC 3339). Omit for a link that never expires;
        /// setting without `--ttl` clears any stored expiry.
        #[arg(long)]
        ttl: Option<Timestamp>,
    },
    /// Delete a shortlink. Deleting an unknown code is not an error.
    Delete { code: String },
    /// List stored shortlinks, five per page like the admin UI.
    List {
        #[arg(long, default_value_t = 0)]
        page: u64,
        #[arg(long, default_value_t = 5)]
        size: u64,
    },
    /// Remove stored keys that violate the code format. Run once after
    /// upgrading from a schema that allowed arbitrary keys.
    Migrate,
}
