//! Decoding of composite segment column headers.
//!
//! A header reads `<segment…> <account> [누계][(국내|해외)]`, for example
//! `"자동화기기 영업이익 누계(해외)"`.

use gmis_core::ontology::WHOLE_COMPANY_SEGMENT;

const CUMULATIVE_MARKER: &str = "누계";

/// Geographic qualifier of a segment observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
  Entire,
  Domestic,
  Overseas,
}

impl Region {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Entire => "전체",
      Self::Domestic => "국내",
      Self::Overseas => "해외",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
  pub segment:    String,
  /// Empty only for headers that carry no text at all.
  pub account:    String,
  pub region:     Region,
  pub cumulative: bool,
}

/// Decode one header. Never fails: malformed input degrades to a best-effort
/// reading.
pub fn parse_segment_header(raw: &str) -> SegmentHeader {
  let cumulative = raw.contains(CUMULATIVE_MARKER);
  let work = raw.replace(CUMULATIVE_MARKER, "");
  let work = work.trim();

  let (work, region) = if let Some(rest) = work.strip_suffix("(국내)") {
    (rest, Region::Domestic)
  } else if let Some(rest) = work.strip_suffix("(해외)") {
    (rest, Region::Overseas)
  } else {
    (work, Region::Entire)
  };

  let mut tokens: Vec<&str> = work.split_whitespace().collect();
  let account = tokens.pop().unwrap_or_default().to_owned();
  let segment = if tokens.is_empty() {
    WHOLE_COMPANY_SEGMENT.to_owned()
  } else {
    tokens.join(" ")
  };

  SegmentHeader { segment, account, region, cumulative }
}
