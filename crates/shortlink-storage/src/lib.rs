//! Storage backends for the shortlink repository contract.
//!
//! Two structurally different backends satisfy the same [`Repository`]
//! trait: [`SledRepository`] over an embedded sorted key-value engine, and
//! [`MongoRepository`] over a remote document collection. Backend selection
//! happens once at process startup.

pub mod mongo;
pub mod sled;

pub use self::mongo::MongoRepository;
pub use self::sled::SledRepository;

pub use shortlink_core::{Code, Repository, Result, Shortlink, StorageError};
