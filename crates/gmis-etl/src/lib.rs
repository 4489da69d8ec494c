//! ETL pipeline turning wide financial-statement files into the GMIS
//! knowledge graph.
//!
//! Stages run strictly in sequence against any [`GraphStore`]; see
//! [`pipeline::run`].
//!
//! [`GraphStore`]: gmis_core::store::GraphStore

pub mod context;
pub mod corporate;
pub mod error;
pub mod header;
pub mod knowledge;
pub mod pipeline;
pub mod scaffold;
pub mod segment;
pub mod settings;
pub mod shortcuts;
pub mod source;
pub mod temporal;

pub use context::{PipelineContext, RunReport};
pub use error::{Error, Result};
pub use settings::PipelineSettings;

#[cfg(test)]
mod tests;
