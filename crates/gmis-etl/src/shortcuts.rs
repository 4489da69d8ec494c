//! `HAS_ALL_SEGMENTS` shortcut edges from companies and sub-units to every
//! business segment reachable through them.

use std::collections::BTreeMap;

use gmis_core::{
  graph::{Edge, Label, NodeRef, RelType, WriteBatch},
  store::GraphStore,
};

use crate::{
  Error, Result,
  context::{PipelineContext, StageReport},
};

/// Shortcut edges derived from `PART_OF`: a sub-unit owns its segments, a
/// company owns its direct segments and those of its sub-units.
pub fn shortcut_batch(part_of: &[Edge]) -> WriteBatch {
  let mut owned: BTreeMap<&NodeRef, Vec<&NodeRef>> = BTreeMap::new();
  let mut parent_of: BTreeMap<&NodeRef, &NodeRef> = BTreeMap::new();

  for e in part_of {
    match (e.from.label, e.to.label) {
      (Label::BusinessSegment, Label::Company | Label::SubUnit) => {
        owned.entry(&e.to).or_default().push(&e.from);
      }
      (Label::SubUnit, Label::Company) => {
        parent_of.insert(&e.from, &e.to);
      }
      _ => {}
    }
  }

  let mut batch = WriteBatch::new();
  for (owner, segments) in &owned {
    for segment in segments {
      batch.merge_edge(owner, RelType::HasAllSegments, segment);
      if owner.label == Label::SubUnit
        && let Some(company) = parent_of.get(owner)
      {
        batch.merge_edge(company, RelType::HasAllSegments, segment);
      }
    }
  }
  batch
}

pub async fn run<S: GraphStore>(ctx: &PipelineContext<S>) -> Result<StageReport> {
  let part_of = ctx.store().edges(RelType::PartOf).await.map_err(Error::store)?;
  let batch = shortcut_batch(&part_of);
  tracing::info!(edges = batch.len(), "linking segment shortcuts");

  let mut report = StageReport::default();
  report.record_write(ctx.write_chunked(batch).await?);
  Ok(report)
}
