//! Temporal identity: Period (year + month) → Quarter → HalfYear → Year.
//!
//! Identifiers are fixed-width so that ordering by key string and ordering
//! by time agree: `202303`, `2023-Q1`, `2023-H1`, `2023`.

use std::fmt;

use crate::{
  Error, Result,
  graph::{Label, NodeRef},
};

/// A level of the temporal hierarchy stored as its own node label.
pub trait TemporalUnit: Sized + Copy + Ord + fmt::Debug {
  const LABEL: Label;

  /// The node key.
  fn key(&self) -> String;

  /// Inverse of [`TemporalUnit::key`]; `None` for foreign keys.
  fn parse_key(key: &str) -> Option<Self>;

  /// The unit at the same position one year earlier.
  fn prior_year(&self) -> Self;

  fn node_ref(&self) -> NodeRef { NodeRef::new(Self::LABEL, self.key()) }
}

// ─── Period ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodId {
  year:  i32,
  month: u32,
}

impl PeriodId {
  /// Years outside `1..=9999` are rejected; keys are exactly six digits.
  pub fn new(year: i32, month: u32) -> Result<Self> {
    if !(1..=9999).contains(&year) || !(1..=12).contains(&month) {
      return Err(Error::InvalidPeriod { year, month });
    }
    Ok(Self { year, month })
  }

  pub fn year(&self) -> i32 { self.year }

  pub fn month(&self) -> u32 { self.month }

  /// `⌈month / 3⌉`
  pub fn quarter(&self) -> QuarterId {
    QuarterId { year: self.year, quarter: (self.month - 1) / 3 + 1 }
  }

  /// `⌈month / 6⌉`
  pub fn half_year(&self) -> HalfYearId {
    HalfYearId { year: self.year, half: (self.month - 1) / 6 + 1 }
  }

  pub fn year_id(&self) -> YearId { YearId(self.year) }
}

impl TemporalUnit for PeriodId {
  const LABEL: Label = Label::Period;

  fn key(&self) -> String { format!("{:04}{:02}", self.year, self.month) }

  fn parse_key(key: &str) -> Option<Self> {
    if key.len() != 6 || !key.bytes().all(|b| b.is_ascii_digit()) {
      return None;
    }
    let year = key[..4].parse().ok()?;
    let month = key[4..].parse().ok()?;
    Self::new(year, month).ok()
  }

  fn prior_year(&self) -> Self { Self { year: self.year - 1, month: self.month } }
}

impl fmt::Display for PeriodId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:04}-{:02}", self.year, self.month)
  }
}

// ─── Quarter ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuarterId {
  year:    i32,
  quarter: u32,
}

impl QuarterId {
  pub fn year(&self) -> i32 { self.year }

  pub fn quarter(&self) -> u32 { self.quarter }

  pub fn half_year(&self) -> HalfYearId {
    HalfYearId { year: self.year, half: (self.quarter - 1) / 2 + 1 }
  }
}

impl TemporalUnit for QuarterId {
  const LABEL: Label = Label::Quarter;

  fn key(&self) -> String { format!("{:04}-Q{}", self.year, self.quarter) }

  fn parse_key(key: &str) -> Option<Self> {
    let (year, quarter) = key.split_once("-Q")?;
    let year = year.parse().ok()?;
    let quarter = quarter.parse().ok()?;
    (1..=4).contains(&quarter).then_some(Self { year, quarter })
  }

  fn prior_year(&self) -> Self { Self { year: self.year - 1, ..*self } }
}

// ─── HalfYear ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HalfYearId {
  year: i32,
  half: u32,
}

impl HalfYearId {
  pub fn year(&self) -> i32 { self.year }

  pub fn half(&self) -> u32 { self.half }
}

impl TemporalUnit for HalfYearId {
  const LABEL: Label = Label::HalfYear;

  fn key(&self) -> String { format!("{:04}-H{}", self.year, self.half) }

  fn parse_key(key: &str) -> Option<Self> {
    let (year, half) = key.split_once("-H")?;
    let year = year.parse().ok()?;
    let half = half.parse().ok()?;
    (1..=2).contains(&half).then_some(Self { year, half })
  }

  fn prior_year(&self) -> Self { Self { year: self.year - 1, ..*self } }
}

// ─── Year ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearId(pub i32);

impl TemporalUnit for YearId {
  const LABEL: Label = Label::Year;

  fn key(&self) -> String { format!("{:04}", self.0) }

  fn parse_key(key: &str) -> Option<Self> { key.parse().ok().map(Self) }

  fn prior_year(&self) -> Self { Self(self.0 - 1) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn month_maps_to_quarter_and_half() {
    let p = PeriodId::new(2023, 3).unwrap();
    assert_eq!(p.quarter().key(), "2023-Q1");
    assert_eq!(p.half_year().key(), "2023-H1");

    let p = PeriodId::new(2023, 7).unwrap();
    assert_eq!(p.quarter().key(), "2023-Q3");
    assert_eq!(p.half_year().key(), "2023-H2");

    let p = PeriodId::new(2023, 12).unwrap();
    assert_eq!(p.quarter().key(), "2023-Q4");
    assert_eq!(p.quarter().half_year(), p.half_year());
  }

  #[test]
  fn rejects_invalid_month() {
    assert!(matches!(
      PeriodId::new(2023, 13),
      Err(Error::InvalidPeriod { year: 2023, month: 13 })
    ));
    assert!(PeriodId::new(2023, 0).is_err());
  }

  #[test]
  fn rejects_years_without_a_four_digit_key() {
    assert!(matches!(
      PeriodId::new(10_000, 1),
      Err(Error::InvalidPeriod { year: 10_000, month: 1 })
    ));
    assert!(PeriodId::new(-1, 1).is_err());
    assert!(PeriodId::new(0, 1).is_err());

    let last = PeriodId::new(9999, 12).unwrap();
    assert_eq!(PeriodId::parse_key(&last.key()), Some(last));
    let first = PeriodId::new(1, 1).unwrap();
    assert_eq!(PeriodId::parse_key(&first.key()), Some(first));
  }

  #[test]
  fn keys_parse_back() {
    let p = PeriodId::new(2023, 3).unwrap();
    assert_eq!(p.key(), "202303");
    assert_eq!(p.to_string(), "2023-03");
    assert_eq!(PeriodId::parse_key("202303"), Some(p));
    assert_eq!(PeriodId::parse_key("2023-03"), None);
    assert_eq!(
      QuarterId::parse_key("2023-Q2"),
      Some(QuarterId { year: 2023, quarter: 2 })
    );
    assert_eq!(QuarterId::parse_key("2023-Q5"), None);
    assert_eq!(HalfYearId::parse_key("2022-H2").map(|h| h.half()), Some(2));
    assert_eq!(YearId::parse_key("2023"), Some(YearId(2023)));
  }

  #[test]
  fn prior_year_keeps_position() {
    let p = PeriodId::new(2023, 3).unwrap();
    assert_eq!(p.prior_year().key(), "202203");
    assert_eq!(p.quarter().prior_year().key(), "2022-Q1");
    assert_eq!(p.half_year().prior_year().key(), "2022-H1");
    assert_eq!(p.year_id().prior_year(), YearId(2022));
  }

  #[test]
  fn key_order_matches_time_order() {
    let mut keys = vec![
      PeriodId::new(2023, 1).unwrap(),
      PeriodId::new(2022, 12).unwrap(),
      PeriodId::new(2023, 10).unwrap(),
    ];
    keys.sort();
    let by_key: Vec<_> = keys.iter().map(TemporalUnit::key).collect();
    let mut sorted = by_key.clone();
    sorted.sort();
    assert_eq!(by_key, sorted);
  }
}
