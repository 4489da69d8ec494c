//! The property-graph write model.
//!
//! Every write the pipeline performs is a merge keyed on `(label, key)`:
//! re-applying the same [`WriteBatch`] converges to the same graph. Labels,
//! relationship names and key properties are the contract read by the query
//! layer; renaming any of them is a breaking change.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Property bag attached to nodes and edges.
pub type Props = serde_json::Map<String, Value>;

// ─── Labels ──────────────────────────────────────────────────────────────────

/// Node labels written by the pipeline.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
  Serialize,
  Deserialize,
)]
pub enum Label {
  Company,
  /// An organisational sub-unit beneath a company.
  #[strum(serialize = "CIC")]
  #[serde(rename = "CIC")]
  SubUnit,
  Account,
  Term,
  CompanyGroup,
  FinancialStatement,
  Metric,
  ValueObservation,
  BusinessSegment,
  StatementType,
  StatementScope,
  DataClass,
  Period,
  Quarter,
  HalfYear,
  Year,
  FinancialRatio,
  AnalysisViewpoint,
}

impl Label {
  /// The property that uniquely identifies a node of this label.
  pub fn key_property(self) -> &'static str {
    match self {
      Self::Term => "value",
      Self::Year => "year",
      _ => "id",
    }
  }

  pub fn as_str(self) -> &'static str { self.into() }
}

// ─── Relationship types ──────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
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
pub enum RelType {
  AlsoKnownAs,
  PartOf,
  SumOf,
  MemberOf,
  PartOfViewpoint,
  RequiresAccount,
  HasStatement,
  ForPeriod,
  HasType,
  HasScope,
  HasClass,
  Contains,
  InstanceOfRule,
  HasObservation,
  DerivedFrom,
  ForSegment,
  HasAllSegments,
  Previous,
  PriorYearEquiv,
  ComparisonFor,
}

impl RelType {
  pub fn as_str(self) -> &'static str { self.into() }
}

// ─── Node identity ───────────────────────────────────────────────────────────

/// A `(label, key)` pair naming exactly one node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeRef {
  pub label: Label,
  pub key:   String,
}

impl NodeRef {
  pub fn new(label: Label, key: impl Into<String>) -> Self {
    Self { label, key: key.into() }
  }

  /// The key rendered as the value of [`Label::key_property`]. `Year` keys are
  /// integers in the graph; every other key is a string.
  pub fn key_value(&self) -> Value {
    if self.label == Label::Year
      && let Ok(year) = self.key.parse::<i64>()
    {
      return Value::from(year);
    }
    Value::String(self.key.clone())
  }
}

impl std::fmt::Display for NodeRef {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "({}:{})", self.label, self.key)
  }
}

// ─── Read model ──────────────────────────────────────────────────────────────

/// A node as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
  pub label: Label,
  pub key:   String,
  pub props: Props,
}

impl Node {
  pub fn node_ref(&self) -> NodeRef { NodeRef::new(self.label, self.key.clone()) }

  pub fn prop_str(&self, name: &str) -> Option<&str> {
    self.props.get(name).and_then(Value::as_str)
  }

  pub fn prop_f64(&self, name: &str) -> Option<f64> {
    self.props.get(name).and_then(Value::as_f64)
  }

  pub fn prop_i64(&self, name: &str) -> Option<i64> {
    self.props.get(name).and_then(Value::as_i64)
  }
}

/// A directed relationship as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
  pub from:  NodeRef,
  pub rel:   RelType,
  pub to:    NodeRef,
  pub props: Props,
}

/// Total node and relationship counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphCounts {
  pub nodes: u64,
  pub edges: u64,
}

// ─── Write model ─────────────────────────────────────────────────────────────

/// Upsert a node: created with `on_create ∪ set` if absent, otherwise `set`
/// is patched onto the existing properties.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeNode {
  pub node:      NodeRef,
  pub on_create: Props,
  pub set:       Props,
}

/// Upsert a relationship between two existing nodes. If either endpoint does
/// not exist the merge is skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeEdge {
  pub from:  NodeRef,
  pub rel:   RelType,
  pub to:    NodeRef,
  pub props: Props,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
  Node(MergeNode),
  Edge(MergeEdge),
}

impl WriteOp {
  /// Every label this operation touches.
  pub fn labels(&self) -> impl Iterator<Item = Label> {
    let (a, b) = match self {
      Self::Node(m) => (m.node.label, None),
      Self::Edge(m) => (m.from.label, Some(m.to.label)),
    };
    std::iter::once(a).chain(b)
  }
}

/// An ordered list of merges applied by a store in a single transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
  ops: Vec<WriteOp>,
}

impl WriteBatch {
  pub fn new() -> Self { Self::default() }

  pub fn len(&self) -> usize { self.ops.len() }

  pub fn is_empty(&self) -> bool { self.ops.is_empty() }

  pub fn ops(&self) -> &[WriteOp] { &self.ops }

  pub fn into_ops(self) -> Vec<WriteOp> { self.ops }

  /// Queue a node merge. The key property is always part of the created node.
  pub fn merge_node(&mut self, node: NodeRef) -> NodeMerge<'_> {
    let mut on_create = Props::new();
    on_create.insert(node.label.key_property().to_owned(), node.key_value());
    self.ops.push(WriteOp::Node(MergeNode {
      node,
      on_create,
      set: Props::new(),
    }));
    let index = self.ops.len() - 1;
    NodeMerge { ops: &mut self.ops, index }
  }

  /// Queue a relationship merge between `from` and `to`.
  pub fn merge_edge(
    &mut self,
    from: &NodeRef,
    rel: RelType,
    to: &NodeRef,
  ) -> EdgeMerge<'_> {
    self.ops.push(WriteOp::Edge(MergeEdge {
      from: from.clone(),
      rel,
      to: to.clone(),
      props: Props::new(),
    }));
    let index = self.ops.len() - 1;
    EdgeMerge { ops: &mut self.ops, index }
  }

  pub fn extend(&mut self, other: WriteBatch) { self.ops.extend(other.ops); }

  /// Split into batches of at most `size` operations, preserving order.
  pub fn into_chunks(self, size: usize) -> Vec<WriteBatch> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(self.ops.len().div_ceil(size));
    let mut current = Vec::with_capacity(size);
    for op in self.ops {
      current.push(op);
      if current.len() == size {
        chunks.push(WriteBatch { ops: std::mem::take(&mut current) });
      }
    }
    if !current.is_empty() {
      chunks.push(WriteBatch { ops: current });
    }
    chunks
  }
}

/// Builder handle returned by [`WriteBatch::merge_node`].
pub struct NodeMerge<'a> {
  ops:   &'a mut Vec<WriteOp>,
  index: usize,
}

impl NodeMerge<'_> {
  fn target(&mut self) -> Option<&mut MergeNode> {
    match self.ops.get_mut(self.index) {
      Some(WriteOp::Node(m)) => Some(m),
      _ => None,
    }
  }

  /// Property written on create and on every subsequent merge.
  pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
    if let Some(m) = self.target() {
      m.set.insert(name.to_owned(), value.into());
    }
    self
  }

  /// Property written only when the node is first created.
  pub fn on_create(mut self, name: &str, value: impl Into<Value>) -> Self {
    if let Some(m) = self.target() {
      m.on_create.insert(name.to_owned(), value.into());
    }
    self
  }

  pub fn set_opt(self, name: &str, value: Option<impl Into<Value>>) -> Self {
    match value {
      Some(v) => self.set(name, v),
      None => self,
    }
  }
}

/// Builder handle returned by [`WriteBatch::merge_edge`].
pub struct EdgeMerge<'a> {
  ops:   &'a mut Vec<WriteOp>,
  index: usize,
}

impl EdgeMerge<'_> {
  pub fn set(self, name: &str, value: impl Into<Value>) -> Self {
    if let Some(WriteOp::Edge(m)) = self.ops.get_mut(self.index) {
      m.props.insert(name.to_owned(), value.into());
    }
    self
  }
}

/// What a store did with one [`WriteBatch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
  pub nodes_created: u64,
  pub nodes_matched: u64,
  pub edges_created: u64,
  pub edges_matched: u64,
  /// Edge merges dropped because an endpoint did not exist.
  pub edges_skipped: u64,
}

impl WriteSummary {
  pub fn absorb(&mut self, other: WriteSummary) {
    self.nodes_created += other.nodes_created;
    self.nodes_matched += other.nodes_matched;
    self.edges_created += other.edges_created;
    self.edges_matched += other.edges_matched;
    self.edges_skipped += other.edges_skipped;
  }
}
