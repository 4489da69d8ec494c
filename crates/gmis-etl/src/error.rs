//! Error type for `gmis-etl`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("ontology error: {0}")]
  Ontology(#[from] gmis_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("cannot read {path:?}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("unsupported encoding {0:?}")]
  UnknownEncoding(String),

  #[error("{path:?} is not valid in any of the configured encodings")]
  Undecodable { path: PathBuf },

  /// A source file lacks columns its declared schema requires.
  #[error("{file} is missing required columns {missing:?}")]
  SchemaMismatch { file: String, missing: Vec<String> },

  #[error("invalid setting {name}: {reason}")]
  InvalidSetting { name: &'static str, reason: String },
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
