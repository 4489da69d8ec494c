//! Pipeline settings, deserialised from `gmis.toml` and `GMIS_*` variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result, source::TextEncoding};

/// Runtime pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
  pub store_path:         PathBuf,
  pub data_dir:           PathBuf,
  pub ontology_path:      PathBuf,
  /// Wipe the graph before loading.
  pub clear_before_load:  bool,
  /// Reload segment data only, skipping the ontology and corporate files.
  pub only_segments:      bool,
  /// Nodes deleted per transaction during a reset.
  pub delete_chunk_size:  usize,
  /// Segment records written per transaction.
  pub segment_batch_size: usize,
  /// Operations per transaction for post-load passes.
  pub write_chunk_size:   usize,
  /// Tried in order until one decodes a file without loss.
  pub encodings:          Vec<String>,
}

impl Default for PipelineSettings {
  fn default() -> Self {
    Self {
      store_path:         PathBuf::from("gmis.db"),
      data_dir:           PathBuf::from("data"),
      ontology_path:      PathBuf::from("config.json"),
      clear_before_load:  true,
      only_segments:      false,
      delete_chunk_size:  10_000,
      segment_batch_size: 100,
      write_chunk_size:   5_000,
      encodings:          ["utf-8-sig", "cp949", "euc-kr", "utf-8"]
        .into_iter()
        .map(str::to_owned)
        .collect(),
    }
  }
}

impl PipelineSettings {
  /// Layer the optional TOML file at `path` under `GMIS_*` environment
  /// variables.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("GMIS")
          .try_parsing(true)
          .list_separator(",")
          .with_list_parse_key("encodings"),
      )
      .build()?
      .try_deserialize()
  }

  /// Check sizes and resolve the encoding list.
  pub fn validate(&self) -> Result<Vec<TextEncoding>> {
    for (name, value) in [
      ("delete_chunk_size", self.delete_chunk_size),
      ("segment_batch_size", self.segment_batch_size),
      ("write_chunk_size", self.write_chunk_size),
    ] {
      if value == 0 {
        return Err(Error::InvalidSetting { name, reason: "must be positive".into() });
      }
    }
    if self.encodings.is_empty() {
      return Err(Error::InvalidSetting {
        name:   "encodings",
        reason: "at least one encoding is required".into(),
      });
    }
    self
      .encodings
      .iter()
      .map(|label| TextEncoding::from_label(label).ok_or_else(|| Error::UnknownEncoding(label.clone())))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_validate() {
    let settings = PipelineSettings::default();
    assert!(settings.clear_before_load);
    assert_eq!(settings.validate().unwrap().len(), 4);
  }

  #[test]
  fn toml_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gmis.toml");
    std::fs::write(
      &path,
      "data_dir = \"/srv/gmis/data\"\nsegment_batch_size = 25\nclear_before_load = false\n",
    )
    .unwrap();

    let settings = PipelineSettings::load(&path).unwrap();
    assert_eq!(settings.data_dir, PathBuf::from("/srv/gmis/data"));
    assert_eq!(settings.segment_batch_size, 25);
    assert!(!settings.clear_before_load);
    assert_eq!(settings.delete_chunk_size, 10_000);
  }

  #[test]
  fn zero_batch_size_is_rejected() {
    let settings = PipelineSettings { segment_batch_size: 0, ..Default::default() };
    assert!(matches!(
      settings.validate(),
      Err(Error::InvalidSetting { name: "segment_batch_size", .. })
    ));
  }

  #[test]
  fn zero_write_chunk_is_rejected() {
    let settings = PipelineSettings { write_chunk_size: 0, ..Default::default() };
    assert!(matches!(
      settings.validate(),
      Err(Error::InvalidSetting { name: "write_chunk_size", .. })
    ));
  }

  #[test]
  fn unknown_encoding_is_rejected() {
    let settings = PipelineSettings { encodings: vec!["klingon".into()], ..Default::default() };
    assert!(matches!(settings.validate(), Err(Error::UnknownEncoding(_))));
  }
}
