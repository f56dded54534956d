//! Core library: repository scanning, semantic indexing and retrieval, and snapshot-guarded
//! file mutation.

pub mod config;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod models;
pub mod mutator;
pub mod paths;
pub mod scanner;
pub mod search;
pub mod snapshot;
pub mod vectorstore;

pub use context::AppContext;
pub use error::CoreError;
pub use models::{Document, MutationResult, Snapshot};
