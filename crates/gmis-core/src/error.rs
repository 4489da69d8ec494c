//! Error types for `gmis-core`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("cannot read ontology document {path:?}: {source}")]
  OntologyUnreadable {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("malformed ontology document: {0}")]
  Malformed(#[from] serde_json::Error),

  #[error("alias {alias:?} maps to both {first} and {second}")]
  AliasCollision {
    alias:  String,
    first:  String,
    second: String,
  },

  #[error("{owner} references unknown {kind} {id:?}")]
  UnknownReference {
    owner: String,
    kind:  &'static str,
    id:    String,
  },

  #[error("unknown relationship type: {0:?}")]
  UnknownRelationship(String),

  #[error("invalid period {year}-{month}")]
  InvalidPeriod { year: i32, month: u32 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
