//! The pipeline orchestrator: every stage in order, each completing before
//! the next begins.

use chrono::Utc;
use gmis_core::{graph::Label, store::GraphStore};
use strum::IntoEnumIterator;

use crate::{
  Error, Result, corporate,
  context::{PipelineContext, RunReport, Stage, StageReport},
  knowledge, segment, shortcuts, temporal,
};

/// Delete every node in bounded chunks until none remain.
pub async fn reset<S: GraphStore>(ctx: &PipelineContext<S>) -> Result<StageReport> {
  let mut report = StageReport::default();
  loop {
    let deleted = ctx
      .store()
      .delete_chunk(ctx.settings.delete_chunk_size)
      .await
      .map_err(Error::store)?;
    if deleted == 0 {
      break;
    }
    report.nodes_deleted += deleted as u64;
    report.batches_written += 1;
    tracing::debug!(deleted, total = report.nodes_deleted, "deleted chunk");
  }
  Ok(report)
}

/// Declare key uniqueness for every label the pipeline writes.
pub async fn declare_constraints<S: GraphStore>(ctx: &PipelineContext<S>) -> Result<StageReport> {
  let mut report = StageReport::default();
  for label in Label::iter() {
    ctx.store().declare_unique(label).await.map_err(Error::store)?;
    report.batches_written += 1;
  }
  Ok(report)
}

/// Run the full pipeline and return its report.
pub async fn run<S: GraphStore>(ctx: &PipelineContext<S>) -> Result<RunReport> {
  let settings = &ctx.settings;
  let mut report = RunReport::new(ctx.run_id);
  tracing::info!(
    run_id = %ctx.run_id,
    clear = settings.clear_before_load,
    only_segments = settings.only_segments,
    "starting pipeline"
  );

  if settings.clear_before_load {
    report.push(Stage::Reset, reset(ctx).await?);
  }
  report.push(Stage::Constraints, declare_constraints(ctx).await?);

  if !settings.only_segments {
    report.push(Stage::KnowledgeLayer, knowledge::run(ctx).await?);
    report.push(Stage::CorporateStatements, corporate::run(ctx).await?);
  }
  report.push(Stage::SegmentStatements, segment::run(ctx).await?);
  report.push(Stage::TemporalRelationships, temporal::run(ctx).await?);
  report.push(Stage::SegmentShortcuts, shortcuts::run(ctx).await?);

  report.counts = ctx.store().counts().await.map_err(Error::store)?;
  report.finished_at = Some(Utc::now());
  tracing::info!(nodes = report.counts.nodes, edges = report.counts.edges, "pipeline finished");
  Ok(report)
}
