//! Corporate statement loading: one wide row per filing, one column per
//! account.

use std::collections::BTreeSet;

use gmis_core::{
  alias::{AliasContext, AliasMap},
  graph::{Label, NodeRef, RelType, WriteBatch},
  ontology::{Ontology, RatioKind},
  statement::{DataClass, StatementKey, StatementScope, StatementType},
  store::GraphStore,
};

use crate::{
  Result,
  context::{PipelineContext, StageReport},
  scaffold::{self, Provenance},
  source::{BoundColumns, Cell, SourceTable, is_flagged, parse_numeric},
};

// ─── Rows ────────────────────────────────────────────────────────────────────

/// One parsed corporate row.
#[derive(Debug, Clone, PartialEq)]
pub struct CorporateRow {
  pub owner_label:  Label,
  pub key:          StatementKey,
  pub sub_unit_row: bool,
  /// Groups whose membership column is flagged.
  pub groups:       Vec<String>,
  /// Account ID → value, non-zero only.
  pub values:       Vec<(String, f64)>,
}

/// Column layout of a corporate file.
#[derive(Debug, Clone)]
pub struct CorporateLayout {
  cols:        BoundColumns,
  accounts:    Vec<(usize, String)>,
  groups:      Vec<(usize, String)>,
  pub unknown: Vec<String>,
}

impl CorporateLayout {
  pub fn bind(file: &str, table: &SourceTable, ontology: &Ontology) -> Result<Self> {
    let schema = &ontology.source_schema().corporate;
    let cols = table.bind(file, schema)?;
    let account_aliases = ontology.account_alias_map();

    let groups: Vec<(usize, String)> = ontology
      .groups()
      .filter_map(|(id, g)| Some((table.column(g.membership_column()?)?, id.to_owned())))
      .collect();

    let mut accounts = Vec::new();
    let mut unknown = Vec::new();
    let mut seen = BTreeSet::new();
    for (i, header) in table.headers.iter().enumerate() {
      if schema.is_meta(header) || groups.iter().any(|(g, _)| *g == i) {
        continue;
      }
      match account_aliases.resolve(header) {
        Some(id) if seen.insert(id.to_owned()) => accounts.push((i, id.to_owned())),
        _ => unknown.push(header.clone()),
      }
    }

    Ok(Self { cols, accounts, groups, unknown })
  }

  /// Parse one row, updating `report`'s counters. `None` for rows that are
  /// dropped.
  pub fn parse_row(
    &self,
    row: &csv::StringRecord,
    companies: &AliasMap,
    ontology: &Ontology,
    report: &mut StageReport,
  ) -> Option<CorporateRow> {
    let alias = row.get(self.cols.company).unwrap_or_default();
    let Some(owner) = companies.resolve(alias) else {
      report.unresolved_company += 1;
      tracing::debug!(alias, "unresolved company alias");
      return None;
    };
    let owner_label = ontology.entity_label(owner)?;

    let Some(period) = self.cols.period(row) else {
      report.malformed_rows += 1;
      return None;
    };

    let statement = self.cols.statement.and_then(|i| row.get(i)).unwrap_or_default();
    let class = row.get(self.cols.class).unwrap_or_default();
    let key = StatementKey {
      owner: owner.to_owned(),
      period,
      kind: if statement.contains("IS") { StatementType::Income } else { StatementType::Balance },
      scope: if statement.contains("연결") {
        StatementScope::Consolidated
      } else {
        StatementScope::Separate
      },
      class: if class.trim() == "실적" { DataClass::Actual } else { DataClass::Plan },
    };

    let sub_unit_row = is_flagged(row, self.cols.sub_unit);
    let groups = self
      .groups
      .iter()
      .filter(|(i, _)| is_flagged(row, Some(*i)))
      .map(|(_, id)| id.clone())
      .collect();

    let mut values = Vec::new();
    for (i, account) in &self.accounts {
      match parse_numeric(row.get(*i).unwrap_or_default()) {
        Cell::Value(v) => values.push((account.clone(), v)),
        Cell::Zero => report.zero_values += 1,
        Cell::Unparseable => report.unparseable_values += 1,
        Cell::Empty => {}
      }
    }

    Some(CorporateRow { owner_label, key, sub_unit_row, groups, values })
  }
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Every merge one corporate row implies.
pub fn row_batch(ontology: &Ontology, row: &CorporateRow, provenance: &Provenance) -> WriteBatch {
  let mut batch = WriteBatch::new();
  let fs = scaffold::statement(&mut batch, row.owner_label, &row.key);
  let owner = NodeRef::new(row.owner_label, &row.key.owner);

  if !row.sub_unit_row {
    for group in &row.groups {
      batch.merge_edge(&owner, RelType::MemberOf, &NodeRef::new(Label::CompanyGroup, group));
    }
  }

  let metric_ref = |account: &str| NodeRef::new(Label::Metric, row.key.metric_id(account));
  let present: BTreeSet<&str> = row.values.iter().map(|(a, _)| a.as_str()).collect();

  for (account, value) in &row.values {
    let metric = scaffold::metric(&mut batch, &fs, row.key.metric_id(account), account);
    let obs = NodeRef::new(Label::ValueObservation, format!("{}_obs", metric.key));
    batch
      .merge_node(obs.clone())
      .set("metric_id", metric.key.as_str())
      .set("value", *value)
      .set("source_file", provenance.source_file.as_str())
      .set("run_id", provenance.run_id.as_str())
      .set("timestamp", provenance.timestamp.as_str());
    batch.merge_edge(&metric, RelType::HasObservation, &obs);
  }

  for (parent, components) in ontology.rollups() {
    if !present.contains(parent.as_str()) {
      continue;
    }
    for c in components.iter().filter(|c| present.contains(c.account_id.as_str())) {
      batch
        .merge_edge(&metric_ref(parent), RelType::SumOf, &metric_ref(&c.account_id))
        .set("operation", c.operation.as_str());
    }
  }

  for (_, ratio) in ontology.ratios() {
    let RatioKind::Stored { source_account, related_accounts_for_context } = &ratio.kind else {
      continue;
    };
    if !present.contains(source_account.as_str()) {
      continue;
    }
    for related in related_accounts_for_context.iter().filter(|a| present.contains(a.as_str())) {
      batch.merge_edge(&metric_ref(source_account), RelType::DerivedFrom, &metric_ref(related));
    }
  }

  batch
}

// ─── Stage ───────────────────────────────────────────────────────────────────

/// Load every configured corporate file, one transaction per row.
pub async fn run<S: GraphStore>(ctx: &PipelineContext<S>) -> Result<StageReport> {
  let ontology = &ctx.ontology;
  let companies = ontology.alias_map(AliasContext::MainData);
  let mut report = StageReport::default();

  for file in &ontology.data_sources().main_files {
    let path = ctx.data_path(file);
    if !path.exists() {
      tracing::warn!(file, "corporate file not found, skipping");
      report.files_skipped += 1;
      continue;
    }

    let loaded = SourceTable::read(&path, &ctx.encodings)
      .and_then(|(table, enc)| Ok((CorporateLayout::bind(file, &table, ontology)?, table, enc)));
    let (layout, table, encoding) = match loaded {
      Ok(loaded) => loaded,
      Err(e) => {
        tracing::warn!(file, error = %e, "cannot load corporate file, skipping");
        report.files_skipped += 1;
        continue;
      }
    };
    if !layout.unknown.is_empty() {
      tracing::warn!(file, columns = ?layout.unknown, "columns match no account");
      report.unknown_columns += layout.unknown.len() as u64;
    }
    tracing::info!(file, encoding = encoding.name(), rows = table.rows.len(), "processing corporate file");

    let provenance = Provenance::new(file, ctx.run_id, ctx.timestamp());
    for row in &table.rows {
      report.rows_read += 1;
      let Some(parsed) = layout.parse_row(row, &companies, ontology, &mut report) else {
        continue;
      };
      match ctx.write(row_batch(ontology, &parsed, &provenance)).await {
        Ok(summary) => {
          report.record_write(summary);
          report.rows_written += 1;
        }
        Err(e) => {
          tracing::warn!(file, statement = %parsed.key.id(), error = %e, "row write failed");
          report.batches_failed += 1;
        }
      }
    }
    report.files_processed += 1;
  }

  Ok(report)
}
