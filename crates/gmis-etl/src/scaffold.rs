//! Statement scaffolding shared by the corporate and segment loaders.

use gmis_core::{
  graph::{Label, NodeRef, RelType, WriteBatch},
  period::TemporalUnit,
  statement::{Dimension, StatementKey},
};

/// Provenance written onto every observation.
#[derive(Debug, Clone)]
pub struct Provenance {
  pub source_file: String,
  pub run_id:      String,
  pub timestamp:   String,
}

impl Provenance {
  pub fn new(source_file: &str, run_id: uuid::Uuid, timestamp: String) -> Self {
    Self { source_file: source_file.to_owned(), run_id: run_id.to_string(), timestamp }
  }
}

/// Merge the statement, its period and its dimension links, and attach the
/// statement to `owner`.
pub fn statement(batch: &mut WriteBatch, owner: Label, key: &StatementKey) -> NodeRef {
  let period = key.period.node_ref();
  batch
    .merge_node(period.clone())
    .on_create("year", key.period.year())
    .on_create("month", key.period.month());

  let fs = key.node_ref();
  batch.merge_node(fs.clone());
  batch.merge_edge(&NodeRef::new(owner, &key.owner), RelType::HasStatement, &fs);
  batch.merge_edge(&fs, RelType::ForPeriod, &period);
  batch.merge_edge(&fs, RelType::HasType, &key.kind.node_ref());
  batch.merge_edge(&fs, RelType::HasScope, &key.scope.node_ref());
  batch.merge_edge(&fs, RelType::HasClass, &key.class.node_ref());
  fs
}

/// Merge a metric, link it to its statement and account, and return it.
pub fn metric(batch: &mut WriteBatch, fs: &NodeRef, metric_id: String, account_id: &str) -> NodeRef {
  let metric = NodeRef::new(Label::Metric, metric_id);
  batch.merge_node(metric.clone()).set("account_id", account_id);
  batch.merge_edge(fs, RelType::Contains, &metric);
  batch.merge_edge(&metric, RelType::InstanceOfRule, &NodeRef::new(Label::Account, account_id));
  metric
}
