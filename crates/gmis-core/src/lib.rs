//! Core types and trait definitions for the GMIS financial knowledge graph.
//!
//! No database or file-format dependencies. The ontology, identity rules and
//! the graph write model live here; storage backends and loaders depend on it.

pub mod alias;
pub mod error;
pub mod graph;
pub mod ontology;
pub mod period;
pub mod statement;
pub mod store;

pub use error::{Error, Result};
