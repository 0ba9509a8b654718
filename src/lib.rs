// phpindex: declaration and schema index for PHP codebases

pub mod cli;
pub mod config;
pub mod error;
pub mod frontend;
pub mod index;
pub mod indexer;
pub mod query;

pub use config::Config;
pub use error::QueryError;
pub use index::store::{Snapshot, SnapshotHandle};
pub use index::{Declaration, Index, IndexStats};
pub use indexer::Indexer;
pub use query::QueryEngine;
