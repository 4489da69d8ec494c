//! SQLite backend for the GMIS knowledge graph.
//!
//! Nodes and relationships live in two tables keyed the way a property-graph
//! database keys them. Wraps [`tokio_rusqlite`] so all database access runs on
//! a dedicated thread without blocking the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteGraphStore;
