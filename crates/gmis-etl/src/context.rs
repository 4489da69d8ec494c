//! The explicit pipeline context passed to every stage, and the run report the
//! stages fill in.

use std::{fmt, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use uuid::Uuid;

use gmis_core::{
  graph::{GraphCounts, WriteBatch, WriteSummary},
  ontology::Ontology,
  store::GraphStore,
};

use crate::{Error, Result, settings::PipelineSettings, source::TextEncoding};

// ─── Context ─────────────────────────────────────────────────────────────────

/// Store handle, ontology and settings for one pipeline run.
pub struct PipelineContext<S> {
  store:         S,
  pub ontology:  Ontology,
  pub settings:  PipelineSettings,
  pub encodings: Vec<TextEncoding>,
  /// Stamped on every observation written in this run.
  pub run_id:    Uuid,
  pub loaded_at: DateTime<Utc>,
}

impl<S: GraphStore> PipelineContext<S> {
  pub fn new(store: S, ontology: Ontology, settings: PipelineSettings) -> Result<Self> {
    let encodings = settings.validate()?;
    Ok(Self {
      store,
      ontology,
      settings,
      encodings,
      run_id: Uuid::new_v4(),
      loaded_at: Utc::now(),
    })
  }

  pub fn store(&self) -> &S { &self.store }

  /// Release the store handle.
  pub fn into_store(self) -> S { self.store }

  /// Apply one batch in one transaction.
  pub async fn write(&self, batch: WriteBatch) -> Result<WriteSummary> {
    self.store.apply(batch).await.map_err(Error::store)
  }

  /// Apply a large batch as a sequence of bounded transactions.
  pub async fn write_chunked(&self, batch: WriteBatch) -> Result<WriteSummary> {
    let mut total = WriteSummary::default();
    for chunk in batch.into_chunks(self.settings.write_chunk_size) {
      total.absorb(self.write(chunk).await?);
    }
    Ok(total)
  }

  pub fn data_path(&self, file: &str) -> PathBuf { self.settings.data_dir.join(file) }

  pub fn timestamp(&self) -> String { self.loaded_at.to_rfc3339() }
}

// ─── Reports ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  Reset,
  Constraints,
  KnowledgeLayer,
  CorporateStatements,
  SegmentStatements,
  TemporalRelationships,
  SegmentShortcuts,
}

/// Coverage counters for one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageReport {
  pub files_processed:    u64,
  pub files_skipped:      u64,
  pub rows_read:          u64,
  pub rows_written:       u64,
  pub unresolved_company: u64,
  pub malformed_rows:     u64,
  pub unknown_columns:    u64,
  pub unparseable_values: u64,
  pub zero_values:        u64,
  pub aggregate_segments: u64,
  pub generated_accounts: u64,
  pub batches_written:    u64,
  pub batches_failed:     u64,
  pub nodes_deleted:      u64,
  pub writes:             WriteSummary,
}

impl StageReport {
  pub fn record_write(&mut self, summary: WriteSummary) {
    self.batches_written += 1;
    self.writes.absorb(summary);
  }
}

impl fmt::Display for StageReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "files {}/{} skipped, rows {} read/{} written, batches {} ok/{} failed, \
       nodes +{}, edges +{} ({} skipped)",
      self.files_processed,
      self.files_skipped,
      self.rows_read,
      self.rows_written,
      self.batches_written,
      self.batches_failed,
      self.writes.nodes_created,
      self.writes.edges_created,
      self.writes.edges_skipped,
    )
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageEntry {
  pub stage:  Stage,
  pub report: StageReport,
}

/// Everything an operator needs to judge a run's coverage.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub run_id:      Uuid,
  pub started_at:  DateTime<Utc>,
  pub finished_at: Option<DateTime<Utc>>,
  pub stages:      Vec<StageEntry>,
  pub counts:      GraphCounts,
}

impl RunReport {
  pub fn new(run_id: Uuid) -> Self {
    Self {
      run_id,
      started_at: Utc::now(),
      finished_at: None,
      stages: Vec::new(),
      counts: GraphCounts::default(),
    }
  }

  pub fn push(&mut self, stage: Stage, report: StageReport) {
    tracing::info!(%stage, "{report}");
    self.stages.push(StageEntry { stage, report });
  }

  pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
    self.stages.iter().find(|e| e.stage == stage).map(|e| &e.report)
  }
}
