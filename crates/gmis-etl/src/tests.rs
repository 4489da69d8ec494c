//! End-to-end pipeline tests against an in-memory store and fixture files in
//! a temporary directory.

use gmis_core::{
  graph::{Edge, GraphCounts, Label, Node, RelType, WriteBatch, WriteOp, WriteSummary},
  ontology::{Aggregation, Ontology},
  store::GraphStore,
};
use gmis_store_sqlite::SqliteGraphStore;
use tempfile::TempDir;

use crate::{
  PipelineContext, PipelineSettings, RunReport,
  context::{Stage, StageReport},
  pipeline,
};

const ONTOLOGY: &str = r#"{
  "entities": {
    "companies": {
      "MnM": { "official_name": "LS MnM", "aliases": ["엠앤엠"], "groups": ["MFG"] },
      "ELECTRIC": { "official_name": "LS ELECTRIC", "aliases": ["일렉트릭"], "file_name_id": "LSE" },
      "POWER_CIC": { "official_name": "전력CIC", "type": "CIC", "parent_company": "ELECTRIC" }
    },
    "accounts": {
      "매출액": { "official_name": "매출액", "aliases": ["Revenue"], "category": "IS", "aggregation": "SUM" },
      "영업이익": { "official_name": "영업이익", "category": "IS", "aggregation": "SUM" },
      "자산총계": { "official_name": "자산총계", "category": "BS", "aggregation": "LAST" },
      "영업이익률": { "official_name": "영업이익률", "category": "IS", "aggregation": "LAST" }
    }
  },
  "financial_ratios": {
    "viewpoints": { "PROFIT": { "name": "수익성" } },
    "ratios": {
      "OPM": {
        "official_name": "영업이익률", "type": "STORED", "viewpoint": "PROFIT", "unit": "%",
        "source_account": "영업이익률", "related_accounts_for_context": ["매출액", "영업이익"]
      }
    }
  },
  "business_rules": {
    "company_groups": { "MFG": { "name": "제조 4개사", "aliases": ["4개사"] } },
    "cic_mapping_rules": {
      "ELECTRIC": { "target_cics": ["POWER_CIC"], "keywords": { "POWER_CIC": ["전력"] } }
    }
  },
  "segment_to_main_account_mapping": { "매출": "매출액" },
  "data_sources": {
    "main_files": ["main.csv", "broken.csv"],
    "segment_files": {
      "overrides": { "ELECTRIC": { "file": "seg_electric.csv", "format": "ELECTRIC_CIC" } },
      "dynamic_discovery": { "enabled": true }
    }
  }
}"#;

const MAIN: &str = "\
회사,year,month,계정,항목,4개사,CIC,매출액,영업이익,자산총계,영업이익률
LS MnM,2023,1,IS(연결),실적,Y,,100,10,,10
ls mnm,2023,2,IS(연결),실적,Y,,200,0.0001,,
엠앤엠,2023,3,IS(연결),실적,Y,,300,0,,
LS MnM,2023,3,IS(연결),계획,Y,,280,20,,
LS MnM,2022,3,IS(연결),실적,Y,,250,15,,
LS MnM,2023,4,IS(연결),실적,Y,,310,30,,
LS MnM,2023,1,BS(연결),실적,Y,,,,1000,
LS MnM,2023,2,BS(연결),실적,Y,,,,1100,
LS MnM,2023,3,BS(연결),실적,Y,,,,1050,
";

const BROKEN: &str = "회사,year,계정,항목,매출액\nLS MnM,2023,IS(연결),실적,1\n";

const MNM_SEGMENTS: &str = "\
회사,year,month,항목,4개사,전력기기 매출,전력기기 매출 누계,합계 매출
LS MnM,2023,1,실적,Y,40,45,100
";

const ELECTRIC_SEGMENTS: &str = "\
회사,year,month,항목,전력기기 매출,금속 영업이익(해외)
일렉트릭,2023,1,실적,70,5
";

fn write_fixtures(dir: &TempDir) {
  let path = |name: &str| dir.path().join(name);
  std::fs::write(path("main.csv"), MAIN).unwrap();
  std::fs::write(path("broken.csv"), BROKEN).unwrap();
  std::fs::write(path("사업별손익_MnM.csv"), MNM_SEGMENTS).unwrap();
  // Legacy Korean encoding; must be picked up by the fallback list.
  let (encoded, _, _) = encoding_rs::EUC_KR.encode(ELECTRIC_SEGMENTS);
  std::fs::write(path("seg_electric.csv"), &encoded).unwrap();
}

fn settings(dir: &TempDir) -> PipelineSettings {
  PipelineSettings {
    data_dir: dir.path().to_path_buf(),
    clear_before_load: false,
    ..PipelineSettings::default()
  }
}

async fn context(dir: &TempDir, only_segments: bool) -> PipelineContext<SqliteGraphStore> {
  let store = SqliteGraphStore::open_in_memory().await.unwrap();
  let settings = PipelineSettings { only_segments, ..settings(dir) };
  PipelineContext::new(store, Ontology::from_json_str(ONTOLOGY).unwrap(), settings).unwrap()
}

/// Refuses any batch that merges a node keyed in `refused`.
struct RefusingStore {
  inner:   SqliteGraphStore,
  refused: &'static [&'static str],
}

impl GraphStore for RefusingStore {
  type Error = gmis_store_sqlite::Error;

  async fn declare_unique(&self, label: Label) -> gmis_store_sqlite::Result<()> {
    self.inner.declare_unique(label).await
  }

  async fn declared_labels(&self) -> gmis_store_sqlite::Result<Vec<Label>> {
    self.inner.declared_labels().await
  }

  async fn apply(&self, batch: WriteBatch) -> gmis_store_sqlite::Result<WriteSummary> {
    let refused = batch.ops().iter().find_map(|op| match op {
      WriteOp::Node(m) if self.refused.contains(&m.node.key.as_str()) => Some(m.node.key.clone()),
      _ => None,
    });
    if let Some(key) = refused {
      return Err(gmis_store_sqlite::Error::Decode { what: "node", value: key });
    }
    self.inner.apply(batch).await
  }

  async fn delete_chunk(&self, limit: usize) -> gmis_store_sqlite::Result<usize> {
    self.inner.delete_chunk(limit).await
  }

  async fn nodes(&self, label: Label) -> gmis_store_sqlite::Result<Vec<Node>> {
    self.inner.nodes(label).await
  }

  async fn edges(&self, rel: RelType) -> gmis_store_sqlite::Result<Vec<Edge>> {
    self.inner.edges(rel).await
  }

  async fn counts(&self) -> gmis_store_sqlite::Result<GraphCounts> { self.inner.counts().await }
}

async fn loaded() -> (TempDir, PipelineContext<SqliteGraphStore>, RunReport) {
  let dir = tempfile::tempdir().unwrap();
  write_fixtures(&dir);
  let ctx = context(&dir, false).await;
  let report = pipeline::run(&ctx).await.unwrap();
  (dir, ctx, report)
}

async fn has_edge(store: &impl GraphStore, rel: RelType, from: &str, to: &str) -> bool {
  store
    .edges(rel)
    .await
    .unwrap()
    .iter()
    .any(|e| e.from.key == from && e.to.key == to)
}

async fn observation(store: &impl GraphStore, key: &str) -> Option<Node> {
  store
    .nodes(Label::ValueObservation)
    .await
    .unwrap()
    .into_iter()
    .find(|n| n.key == key)
}

fn stage(report: &RunReport, stage: Stage) -> &StageReport {
  report.stage(stage).expect("stage ran")
}

// ─── Whole runs ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn rerunning_converges_to_the_same_graph() {
  let (_dir, ctx, first) = loaded().await;
  let second = pipeline::run(&ctx).await.unwrap();

  assert!(first.counts.nodes > 0);
  assert_eq!(first.counts, second.counts);
  assert_eq!(stage(&second, Stage::CorporateStatements).writes.nodes_created, 0);
  assert_eq!(stage(&second, Stage::SegmentStatements).writes.edges_created, 0);
}

#[tokio::test]
async fn reset_empties_the_graph_in_chunks() {
  let (_dir, ctx, first) = loaded().await;
  let mut ctx = ctx;
  ctx.settings.delete_chunk_size = 7;

  let report = pipeline::reset(&ctx).await.unwrap();
  assert_eq!(report.nodes_deleted, first.counts.nodes);
  assert_eq!(report.batches_written, first.counts.nodes.div_ceil(7));
  assert_eq!(ctx.store().counts().await.unwrap().nodes, 0);
}

#[tokio::test]
async fn only_segments_skips_knowledge_and_corporate_stages() {
  let dir = tempfile::tempdir().unwrap();
  write_fixtures(&dir);
  let ctx = context(&dir, true).await;
  let report = pipeline::run(&ctx).await.unwrap();

  assert!(report.stage(Stage::KnowledgeLayer).is_none());
  assert!(report.stage(Stage::CorporateStatements).is_none());
  assert!(stage(&report, Stage::SegmentStatements).rows_written > 0);
  assert!(ctx.store().nodes(Label::Term).await.unwrap().is_empty());
}

// ─── Corporate data ──────────────────────────────────────────────────────────

#[tokio::test]
async fn schema_mismatch_skips_only_that_file() {
  let (_dir, _ctx, report) = loaded().await;
  let corporate = stage(&report, Stage::CorporateStatements);
  assert_eq!(corporate.files_processed, 1);
  assert_eq!(corporate.files_skipped, 1);
  assert_eq!(corporate.rows_written, 9);
}

#[tokio::test]
async fn aliases_resolve_case_insensitively() {
  let (_dir, ctx, _) = loaded().await;
  assert!(
    has_edge(ctx.store(), RelType::HasStatement, "MnM", "MnM_202302_IS_CONSOLIDATED_ACTUAL").await
  );
}

#[tokio::test]
async fn zero_is_dropped_but_tiny_values_are_kept() {
  let (_dir, ctx, report) = loaded().await;
  let store = ctx.store();

  let tiny = observation(store, "MnM_202302_IS_CONSOLIDATED_ACTUAL_영업이익_obs").await.unwrap();
  assert_eq!(tiny.prop_f64("value"), Some(0.0001));
  assert!(observation(store, "MnM_202303_IS_CONSOLIDATED_ACTUAL_영업이익_obs").await.is_none());
  assert_eq!(stage(&report, Stage::CorporateStatements).zero_values, 1);
}

#[tokio::test]
async fn quarter_values_fold_by_account_aggregation() {
  let (_dir, ctx, _) = loaded().await;
  let store = ctx.store();

  async fn series(store: &SqliteGraphStore, statement: &str, account: &str) -> Vec<f64> {
    let mut values = Vec::new();
    for month in 1..=3 {
      let key = format!("MnM_2023{month:02}_{statement}_CONSOLIDATED_ACTUAL_{account}_obs");
      values.extend(observation(store, &key).await.and_then(|n| n.prop_f64("value")));
    }
    values
  }

  let revenue = series(store, "IS", "매출액").await;
  assert_eq!(Aggregation::Sum.fold(revenue), Some(600.0));

  let assets = series(store, "BS", "자산총계").await;
  assert_eq!(Aggregation::Last.fold(assets), Some(1050.0));
}

#[tokio::test]
async fn stored_ratio_metric_derives_from_its_context_metrics() {
  let (_dir, ctx, _) = loaded().await;
  let store = ctx.store();
  let metric = |account: &str| format!("MnM_202301_IS_CONSOLIDATED_ACTUAL_{account}");

  assert!(has_edge(store, RelType::DerivedFrom, &metric("영업이익률"), &metric("매출액")).await);
  assert!(has_edge(store, RelType::DerivedFrom, &metric("영업이익률"), &metric("영업이익")).await);
  // No ratio value in February, so nothing to derive.
  let derived = store.edges(RelType::DerivedFrom).await.unwrap();
  assert_eq!(derived.len(), 2);
}

#[tokio::test]
async fn failed_row_is_counted_and_the_run_continues() {
  let dir = tempfile::tempdir().unwrap();
  write_fixtures(&dir);
  let store = RefusingStore {
    inner:   SqliteGraphStore::open_in_memory().await.unwrap(),
    refused: &["MnM_202302_IS_CONSOLIDATED_ACTUAL"],
  };
  let ontology = Ontology::from_json_str(ONTOLOGY).unwrap();
  let ctx = PipelineContext::new(store, ontology, settings(&dir)).unwrap();
  let report = pipeline::run(&ctx).await.unwrap();

  let corporate = stage(&report, Stage::CorporateStatements);
  assert_eq!(corporate.batches_failed, 1);
  assert_eq!(corporate.rows_written, 8);
  let store = ctx.store();
  assert!(!has_edge(store, RelType::HasStatement, "MnM", "MnM_202302_IS_CONSOLIDATED_ACTUAL").await);
  assert!(has_edge(store, RelType::HasStatement, "MnM", "MnM_202303_IS_CONSOLIDATED_ACTUAL").await);
}

#[tokio::test]
async fn observations_carry_provenance() {
  let (_dir, ctx, _) = loaded().await;
  let obs = observation(ctx.store(), "MnM_202301_IS_CONSOLIDATED_ACTUAL_매출액_obs").await.unwrap();
  assert_eq!(obs.prop_str("source_file"), Some("main.csv"));
  assert_eq!(obs.prop_str("run_id"), Some(ctx.run_id.to_string().as_str()));
  assert_eq!(obs.prop_str("metric_id"), Some("MnM_202301_IS_CONSOLIDATED_ACTUAL_매출액"));
}

// ─── Segment data ────────────────────────────────────────────────────────────

#[tokio::test]
async fn same_segment_name_under_two_owners_stays_distinct() {
  let (_dir, ctx, _) = loaded().await;
  let segments: Vec<String> = ctx
    .store()
    .nodes(Label::BusinessSegment)
    .await
    .unwrap()
    .into_iter()
    .map(|n| n.key)
    .collect();
  assert_eq!(segments, ["ELECTRIC_금속", "MnM_전력기기", "POWER_CIC_전력기기"]);
}

#[tokio::test]
async fn legacy_encoded_segment_file_is_loaded() {
  let (_dir, ctx, report) = loaded().await;
  let segment = stage(&report, Stage::SegmentStatements);
  assert_eq!(segment.files_processed, 2);
  assert_eq!(segment.aggregate_segments, 1);
  assert_eq!(segment.generated_accounts, 1);

  let overseas =
    observation(ctx.store(), "ELECTRIC_202301_IS_SEPARATE_ACTUAL_금속_영업이익_해외").await.unwrap();
  assert_eq!(overseas.prop_f64("value"), Some(5.0));
  assert!(
    has_edge(
      ctx.store(),
      RelType::InstanceOfRule,
      "ELECTRIC_202301_IS_SEPARATE_ACTUAL_금속_영업이익",
      "segment_영업이익"
    )
    .await
  );
}

#[tokio::test]
async fn monthly_and_cumulative_share_one_observation() {
  let (_dir, ctx, _) = loaded().await;
  let obs =
    observation(ctx.store(), "MnM_202301_IS_SEPARATE_ACTUAL_전력기기_매출_전체").await.unwrap();
  assert_eq!(obs.prop_f64("value"), Some(40.0));
  assert_eq!(obs.prop_f64("cumulative_value"), Some(45.0));
  assert_eq!(obs.prop_str("region"), Some("전체"));
}

#[tokio::test]
async fn failed_segment_batch_leaves_the_other_batches_written() {
  let dir = tempfile::tempdir().unwrap();
  write_fixtures(&dir);
  let store = RefusingStore {
    inner:   SqliteGraphStore::open_in_memory().await.unwrap(),
    refused: &["ELECTRIC_금속"],
  };
  let settings = PipelineSettings { segment_batch_size: 1, ..settings(&dir) };
  let ontology = Ontology::from_json_str(ONTOLOGY).unwrap();
  let ctx = PipelineContext::new(store, ontology, settings).unwrap();
  let report = pipeline::run(&ctx).await.unwrap();

  let segment = stage(&report, Stage::SegmentStatements);
  assert_eq!(segment.batches_failed, 1);
  assert_eq!(segment.files_processed, 2);
  let segments: Vec<String> = ctx
    .store()
    .nodes(Label::BusinessSegment)
    .await
    .unwrap()
    .into_iter()
    .map(|n| n.key)
    .collect();
  assert_eq!(segments, ["MnM_전력기기", "POWER_CIC_전력기기"]);
  assert!(
    observation(ctx.store(), "ELECTRIC_202301_IS_SEPARATE_ACTUAL_금속_영업이익_해외")
      .await
      .is_none()
  );
}

#[tokio::test]
async fn companies_reach_sub_unit_segments_directly() {
  let (_dir, ctx, _) = loaded().await;
  let store = ctx.store();
  assert!(has_edge(store, RelType::HasAllSegments, "ELECTRIC", "POWER_CIC_전력기기").await);
  assert!(has_edge(store, RelType::HasAllSegments, "ELECTRIC", "ELECTRIC_금속").await);
  assert!(has_edge(store, RelType::HasAllSegments, "POWER_CIC", "POWER_CIC_전력기기").await);
  assert!(!has_edge(store, RelType::HasAllSegments, "POWER_CIC", "ELECTRIC_금속").await);
}

// ─── Post-load relationships ─────────────────────────────────────────────────

#[tokio::test]
async fn temporal_chains_link_prior_year_and_previous_quarter() {
  let (_dir, ctx, _) = loaded().await;
  let store = ctx.store();
  assert!(has_edge(store, RelType::PriorYearEquiv, "202303", "202203").await);
  assert!(has_edge(store, RelType::Previous, "2023-Q2", "2023-Q1").await);
  assert!(has_edge(store, RelType::Previous, "2023-Q1", "2022-Q1").await);
  assert!(has_edge(store, RelType::PartOf, "2023-H1", "2023").await);
  assert!(has_edge(store, RelType::PriorYearEquiv, "2023", "2022").await);
}

#[tokio::test]
async fn every_actual_links_to_every_plan_of_the_same_owner_and_period() {
  let (_dir, ctx, _) = loaded().await;
  let mut comparisons: Vec<(String, String)> = ctx
    .store()
    .edges(RelType::ComparisonFor)
    .await
    .unwrap()
    .into_iter()
    .map(|e| (e.from.key, e.to.key))
    .collect();
  comparisons.sort();
  assert_eq!(comparisons, [
    ("MnM_202303_BS_CONSOLIDATED_ACTUAL".to_owned(), "MnM_202303_IS_CONSOLIDATED_PLAN".to_owned()),
    ("MnM_202303_IS_CONSOLIDATED_ACTUAL".to_owned(), "MnM_202303_IS_CONSOLIDATED_PLAN".to_owned()),
  ]);
}
