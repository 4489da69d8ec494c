//! Case-insensitive alias resolution.

use std::collections::HashMap;

/// Which loader an alias map is built for.
///
/// Some companies file their segment figures under a different identifier
/// than their corporate figures; the segment context redirects those aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasContext {
  MainData,
  SegmentData,
}

/// Lower-cased alias → canonical ID.
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
  entries: HashMap<String, String>,
}

impl AliasMap {
  pub fn new() -> Self { Self::default() }

  pub fn normalize(alias: &str) -> String { alias.trim().to_lowercase() }

  /// Insert or overwrite the mapping for `alias`. Returns the previous target.
  pub fn insert(&mut self, alias: &str, id: impl Into<String>) -> Option<String> {
    self.entries.insert(Self::normalize(alias), id.into())
  }

  pub fn resolve(&self, alias: &str) -> Option<&str> {
    self.entries.get(&Self::normalize(alias)).map(String::as_str)
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resolution_ignores_case_and_padding() {
    let mut map = AliasMap::new();
    map.insert("LS전선", "LSCNS_C");
    assert_eq!(map.resolve("LS전선"), Some("LSCNS_C"));
    assert_eq!(map.resolve("ls전선"), Some("LSCNS_C"));
    assert_eq!(map.resolve("Ls전선"), Some("LSCNS_C"));
    assert_eq!(map.resolve("  LS전선 "), Some("LSCNS_C"));
    assert_eq!(map.resolve("LS엠트론"), None);
  }

  #[test]
  fn insert_reports_previous_target() {
    let mut map = AliasMap::new();
    assert_eq!(map.insert("MnM", "MNM"), None);
    assert_eq!(map.insert("mnm", "OTHER"), Some("MNM".to_string()));
    assert_eq!(map.len(), 1);
  }
}
