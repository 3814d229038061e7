//! Core types and traits for the shortlink storage layer.
//!
//! This crate defines the validated [`Code`] identifier, the [`Shortlink`]
//! entity, the [`Repository`] contract implemented by the storage backends,
//! and the resolver policy applied on the public redirect path.

pub mod code;
pub mod error;
pub mod repository;
pub mod resolver;

pub use code::Code;
pub use error::{Result, StorageError};
pub use repository::{Repository, Shortlink};
pub use resolver::ResolverService;
