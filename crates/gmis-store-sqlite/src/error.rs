//! Error type for `gmis-store-sqlite`.

use gmis_core::graph::Label;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A stored label or relationship name no longer parses.
  #[error("cannot decode stored {what}: {value:?}")]
  Decode { what: &'static str, value: String },

  /// A node was written before its label's uniqueness was declared.
  #[error("no uniqueness constraint declared for label {0}")]
  UndeclaredConstraint(Label),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
