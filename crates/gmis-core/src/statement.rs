//! Statement identity and the controlled-vocabulary dimensions attached to it.
//!
//! A statement is identified by a deterministic composite key so that
//! re-loading the same source row is an upsert rather than a duplicate.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{
  graph::{Label, NodeRef},
  period::{PeriodId, TemporalUnit},
};

// ─── Dimensions ──────────────────────────────────────────────────────────────

/// A controlled vocabulary written once as dimension nodes and linked from
/// every statement.
pub trait Dimension: Copy + Into<&'static str> + IntoEnumIterator {
  const LABEL: Label;

  fn id(self) -> &'static str { self.into() }

  fn node_ref(self) -> NodeRef { NodeRef::new(Self::LABEL, self.id()) }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
  Serialize,
  Deserialize,
)]
pub enum StatementType {
  /// Income statement.
  #[strum(serialize = "IS")]
  #[serde(rename = "IS")]
  Income,
  /// Balance sheet.
  #[strum(serialize = "BS")]
  #[serde(rename = "BS")]
  Balance,
}

impl Dimension for StatementType {
  const LABEL: Label = Label::StatementType;
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
  Serialize,
  Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementScope {
  Consolidated,
  Separate,
}

impl Dimension for StatementScope {
  const LABEL: Label = Label::StatementScope;
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
  Serialize,
  Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataClass {
  Actual,
  Plan,
}

impl Dimension for DataClass {
  const LABEL: Label = Label::DataClass;
}

// ─── Statement key ───────────────────────────────────────────────────────────

/// The identity of one filing: `(owner, period, type, scope, class)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementKey {
  pub owner:  String,
  pub period: PeriodId,
  pub kind:   StatementType,
  pub scope:  StatementScope,
  pub class:  DataClass,
}

impl StatementKey {
  pub fn id(&self) -> String {
    format!(
      "{}_{}_{}_{}_{}",
      self.owner,
      self.period.key(),
      self.kind,
      self.scope,
      self.class
    )
  }

  pub fn node_ref(&self) -> NodeRef { NodeRef::new(Label::FinancialStatement, self.id()) }

  /// Statement × Account.
  pub fn metric_id(&self, account_id: &str) -> String {
    format!("{}_{account_id}", self.id())
  }

  /// Statement × Segment × Account.
  pub fn segment_metric_id(&self, segment: &str, account_name: &str) -> String {
    format!("{}_{segment}_{account_name}", self.id())
  }
}
