//! Segment statement loading: wide business-unit files reshaped into one
//! observation per (segment, account, region).

use std::{
  collections::{BTreeMap, BTreeSet, HashSet},
  path::Path,
};

use gmis_core::{
  alias::{AliasContext, AliasMap},
  graph::{Label, NodeRef, RelType, WriteBatch},
  ontology::{GENERATED_ACCOUNT_CATEGORY, EntityKind, Ontology, SegmentAccount, SegmentFileFormat},
  statement::{DataClass, StatementKey, StatementScope, StatementType},
  store::GraphStore,
};

use crate::{
  Result,
  context::{PipelineContext, StageReport},
  header::{Region, SegmentHeader, parse_segment_header},
  scaffold::{self, Provenance},
  source::{BoundColumns, Cell, SourceTable, parse_numeric},
};

const GENERATED_ACCOUNT_DESCRIPTION: &str = "사업별 손익에서 자동 생성된 계정입니다.";

// ─── Discovery ───────────────────────────────────────────────────────────────

/// One segment file and how its rows are assigned to owners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSource {
  pub file:   String,
  pub format: SegmentFileFormat,
  /// Owner of every row, for files scoped to one sub-unit.
  pub target: Option<String>,
}

/// Every segment file to load, keyed by the entity it was configured for.
/// Overrides replace discovered files for the same key.
pub fn discover(ontology: &Ontology, data_dir: &Path) -> BTreeMap<String, SegmentSource> {
  let config = &ontology.data_sources().segment_files;
  let mut sources = BTreeMap::new();

  let dynamic = &config.dynamic_discovery;
  if dynamic.enabled {
    for (id, def) in ontology.entities() {
      if def.kind() == EntityKind::SubUnit
        || dynamic.exclude_companies.iter().any(|c| c == id)
        || config.overrides.contains_key(id)
        || def.contextual_ids.segment_data.is_some()
      {
        continue;
      }
      let file_name_id = def.file_name_id.as_deref().unwrap_or(id);
      let file = dynamic.file_name_template.replace("{file_name_id}", file_name_id);
      if data_dir.join(&file).exists() {
        sources.insert(id.to_owned(), SegmentSource {
          file,
          format: SegmentFileFormat::Company,
          target: None,
        });
      } else {
        tracing::info!(company = id, file, "no segment file, skipping");
      }
    }
  }

  for (id, ov) in &config.overrides {
    if let Some(file) = &ov.file {
      sources.insert(id.clone(), SegmentSource { file: file.clone(), format: ov.format, target: None });
    }
    for (sub_unit, file) in &ov.cic_mapping_files {
      sources.insert(sub_unit.clone(), SegmentSource {
        file:   file.clone(),
        format: SegmentFileFormat::SubUnitDirect,
        target: Some(sub_unit.clone()),
      });
    }
  }

  sources
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// One non-zero segment observation.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRecord {
  pub owner_label:  Label,
  pub key:          StatementKey,
  pub segment:      String,
  pub account_name: String,
  pub region:       Region,
  pub cumulative:   bool,
  pub value:        f64,
}

impl SegmentRecord {
  pub fn segment_id(&self) -> String {
    format!("{}_{}", self.key.owner, self.segment.replace(' ', "_"))
  }

  pub fn metric_id(&self) -> String { self.key.segment_metric_id(&self.segment, &self.account_name) }

  pub fn observation_id(&self) -> String { format!("{}_{}", self.metric_id(), self.region.as_str()) }
}

/// The entity a segment row is placed under.
pub fn owner_of(ontology: &Ontology, source: &SegmentSource, company: &str, segment: &str) -> String {
  match source.format {
    SegmentFileFormat::Company => company,
    SegmentFileFormat::InferSubUnit => ontology.infer_sub_unit(company, segment).unwrap_or(company),
    SegmentFileFormat::SubUnitDirect => source.target.as_deref().unwrap_or(company),
  }
  .to_owned()
}

/// Column layout of a segment file.
#[derive(Debug, Clone)]
pub struct SegmentLayout {
  cols:        BoundColumns,
  values:      Vec<(usize, SegmentHeader)>,
  pub unknown: Vec<String>,
}

impl SegmentLayout {
  pub fn bind(file: &str, table: &SourceTable, ontology: &Ontology) -> Result<Self> {
    let schema = &ontology.source_schema().segment;
    let cols = table.bind(file, schema)?;
    let group_columns: BTreeSet<&str> =
      ontology.groups().filter_map(|(_, g)| g.membership_column()).collect();

    let mut values = Vec::new();
    let mut unknown = Vec::new();
    for (i, raw) in table.headers.iter().enumerate() {
      if schema.is_meta(raw) || group_columns.contains(raw.as_str()) {
        continue;
      }
      let header = parse_segment_header(raw);
      if header.account.is_empty() {
        unknown.push(raw.clone());
      } else {
        values.push((i, header));
      }
    }

    Ok(Self { cols, values, unknown })
  }

  /// Reshape one wide row into records, updating `report`'s counters.
  pub fn parse_row(
    &self,
    row: &csv::StringRecord,
    companies: &AliasMap,
    ontology: &Ontology,
    source: &SegmentSource,
    report: &mut StageReport,
  ) -> Vec<SegmentRecord> {
    let alias = row.get(self.cols.company).unwrap_or_default();
    let Some(company) = companies.resolve(alias) else {
      report.unresolved_company += 1;
      tracing::debug!(alias, "unresolved company alias");
      return Vec::new();
    };
    let Some(period) = self.cols.period(row) else {
      report.malformed_rows += 1;
      return Vec::new();
    };
    let class = match row.get(self.cols.class).map(str::trim) {
      Some("실적") => DataClass::Actual,
      _ => DataClass::Plan,
    };

    let mut records = Vec::new();
    for (i, header) in &self.values {
      let raw = row.get(*i).unwrap_or_default();
      if raw.trim().is_empty() {
        continue;
      }
      if ontology.is_excluded_segment(&header.segment) {
        report.aggregate_segments += 1;
        continue;
      }
      let value = match parse_numeric(raw) {
        Cell::Value(v) => v,
        Cell::Zero => {
          report.zero_values += 1;
          continue;
        }
        Cell::Unparseable => {
          report.unparseable_values += 1;
          continue;
        }
        Cell::Empty => continue,
      };

      let owner = owner_of(ontology, source, company, &header.segment);
      let Some(owner_label) = ontology.entity_label(&owner) else {
        report.unresolved_company += 1;
        continue;
      };
      records.push(SegmentRecord {
        owner_label,
        key: StatementKey {
          owner,
          period,
          kind: StatementType::Income,
          scope: StatementScope::Separate,
          class,
        },
        segment: header.segment.clone(),
        account_name: header.account.clone(),
        region: header.region,
        cumulative: header.cumulative,
        value,
      });
    }
    records
  }
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Every merge a batch of records implies. Returns the batch and the IDs of
/// generated accounts it registers.
pub fn records_batch(
  ontology: &Ontology,
  records: &[SegmentRecord],
  provenance: &Provenance,
) -> (WriteBatch, BTreeSet<String>) {
  let mut batch = WriteBatch::new();

  let mut generated = BTreeSet::new();
  for r in records {
    if let SegmentAccount::Generated(id) = ontology.segment_account(&r.account_name)
      && generated.insert(id.clone())
    {
      batch
        .merge_node(NodeRef::new(Label::Account, id))
        .on_create("name", r.account_name.as_str())
        .on_create("official_name", r.account_name.as_str())
        .on_create("category", GENERATED_ACCOUNT_CATEGORY)
        .on_create("aggregation", "SUM")
        .on_create("description", GENERATED_ACCOUNT_DESCRIPTION)
        .on_create("generated", true);
    }
  }

  for r in records {
    let fs = scaffold::statement(&mut batch, r.owner_label, &r.key);

    let segment = NodeRef::new(Label::BusinessSegment, r.segment_id());
    batch
      .merge_node(segment.clone())
      .on_create("name", r.segment.as_str())
      .on_create("company_id", r.key.owner.as_str());
    batch.merge_edge(&segment, RelType::PartOf, &NodeRef::new(r.owner_label, &r.key.owner));

    let account = ontology.segment_account(&r.account_name);
    let metric = scaffold::metric(&mut batch, &fs, r.metric_id(), account.id());

    let obs = NodeRef::new(Label::ValueObservation, r.observation_id());
    batch
      .merge_node(obs.clone())
      .on_create("metric_id", metric.key.as_str())
      .on_create("region", r.region.as_str())
      .on_create("source_file", provenance.source_file.as_str())
      .on_create("run_id", provenance.run_id.as_str())
      .on_create("timestamp", provenance.timestamp.as_str())
      .set(if r.cumulative { "cumulative_value" } else { "value" }, r.value);
    batch.merge_edge(&metric, RelType::HasObservation, &obs);
    batch.merge_edge(&metric, RelType::ForSegment, &segment);
  }

  (batch, generated)
}

// ─── Stage ───────────────────────────────────────────────────────────────────

/// Load every discovered segment file in batches of `segment_batch_size`
/// records.
pub async fn run<S: GraphStore>(ctx: &PipelineContext<S>) -> Result<StageReport> {
  let ontology = &ctx.ontology;
  let companies = ontology.alias_map(AliasContext::SegmentData);
  let mut report = StageReport::default();
  let mut generated = HashSet::new();

  for (target, source) in discover(ontology, &ctx.settings.data_dir) {
    let file = source.file.as_str();
    let path = ctx.data_path(file);
    if !path.exists() {
      tracing::warn!(file, "segment file not found, skipping");
      report.files_skipped += 1;
      continue;
    }

    let loaded = SourceTable::read(&path, &ctx.encodings)
      .and_then(|(table, enc)| Ok((SegmentLayout::bind(file, &table, ontology)?, table, enc)));
    let (layout, table, encoding) = match loaded {
      Ok(loaded) => loaded,
      Err(e) => {
        tracing::warn!(file, error = %e, "cannot load segment file, skipping");
        report.files_skipped += 1;
        continue;
      }
    };
    if !layout.unknown.is_empty() {
      tracing::warn!(file, columns = ?layout.unknown, "headers name no account");
      report.unknown_columns += layout.unknown.len() as u64;
    }

    let mut records = Vec::new();
    for row in &table.rows {
      report.rows_read += 1;
      records.extend(layout.parse_row(row, &companies, ontology, &source, &mut report));
    }
    let batch_size = ctx.settings.segment_batch_size.max(1);
    tracing::info!(
      file,
      entity = target.as_str(),
      encoding = encoding.name(),
      records = records.len(),
      batches = records.len().div_ceil(batch_size),
      "processing segment file"
    );

    let provenance = Provenance::new(file, ctx.run_id, ctx.timestamp());
    for chunk in records.chunks(batch_size) {
      let (batch, accounts) = records_batch(ontology, chunk, &provenance);
      match ctx.write(batch).await {
        Ok(summary) => {
          report.record_write(summary);
          report.rows_written += chunk.len() as u64;
          generated.extend(accounts);
        }
        Err(e) => {
          tracing::warn!(file, error = %e, "segment batch failed");
          report.batches_failed += 1;
        }
      }
    }
    report.files_processed += 1;
  }

  report.generated_accounts = generated.len() as u64;
  Ok(report)
}
