//! Post-load synthesis of temporal and plan-vs-actual relationships.
//!
//! Runs once every statement is loaded: it reads back the full node set at
//! each granularity, so it must see the complete graph.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use gmis_core::{
  graph::{Edge, Label, NodeRef, RelType, WriteBatch},
  ontology::ComparisonRule,
  period::{HalfYearId, PeriodId, QuarterId, TemporalUnit, YearId},
  statement::Dimension,
  store::GraphStore,
};

use crate::{
  Error, Result,
  context::{PipelineContext, StageReport},
};

// ─── Hierarchy ───────────────────────────────────────────────────────────────

/// Quarter, half-year and year nodes for `periods`, with the
/// Period → Quarter → HalfYear → Year containment chain.
pub fn hierarchy_batch(periods: &BTreeSet<PeriodId>) -> WriteBatch {
  let mut batch = WriteBatch::new();
  let mut quarters = BTreeSet::new();
  let mut halves = BTreeSet::new();
  let mut years = BTreeSet::new();

  for p in periods {
    let quarter = p.quarter();
    let half = quarter.half_year();
    let year = p.year_id();

    if years.insert(year) {
      batch.merge_node(year.node_ref());
    }
    if halves.insert(half) {
      batch
        .merge_node(half.node_ref())
        .on_create("year", half.year())
        .on_create("half", half.half());
      batch.merge_edge(&half.node_ref(), RelType::PartOf, &year.node_ref());
    }
    if quarters.insert(quarter) {
      batch
        .merge_node(quarter.node_ref())
        .on_create("year", quarter.year())
        .on_create("quarter", quarter.quarter());
      batch.merge_edge(&quarter.node_ref(), RelType::PartOf, &half.node_ref());
    }
    batch.merge_edge(&p.node_ref(), RelType::PartOf, &quarter.node_ref());
  }

  batch
}

/// `PREVIOUS` from each unit to its predecessor in key order, and
/// `PRIOR_YEAR_EQUIV` to the same position a year earlier where it exists.
pub fn chain_batch<U: TemporalUnit>(units: &BTreeSet<U>) -> WriteBatch {
  let mut batch = WriteBatch::new();

  let ordered: Vec<&U> = units.iter().collect();
  for pair in ordered.windows(2) {
    batch.merge_edge(&pair[1].node_ref(), RelType::Previous, &pair[0].node_ref());
  }

  for unit in units {
    let prior = unit.prior_year();
    if units.contains(&prior) {
      batch.merge_edge(&unit.node_ref(), RelType::PriorYearEquiv, &prior.node_ref());
    }
  }

  batch
}

// ─── Comparison ──────────────────────────────────────────────────────────────

/// One comparison edge for every `(from, to)` statement pair that shares an
/// owner and a period, where the classes match `rule`.
///
/// `attributes` holds the statements' `FOR_PERIOD` and `HAS_CLASS` edges.
pub fn comparison_batch(rule: ComparisonRule, has_statement: &[Edge], attributes: &[Edge]) -> WriteBatch {
  let mut facts: HashMap<&str, HashMap<Label, &str>> = HashMap::new();
  for e in attributes {
    facts.entry(e.from.key.as_str()).or_default().insert(e.to.label, e.to.key.as_str());
  }

  let mut groups: BTreeMap<(&NodeRef, &str), (Vec<&NodeRef>, Vec<&NodeRef>)> = BTreeMap::new();
  for e in has_statement {
    let Some(f) = facts.get(e.to.key.as_str()) else {
      continue;
    };
    let (Some(period), Some(class)) = (f.get(&Label::Period), f.get(&Label::DataClass)) else {
      continue;
    };
    let (from, to) = groups.entry((&e.from, *period)).or_default();
    if *class == rule.from.id() {
      from.push(&e.to);
    } else if *class == rule.to.id() {
      to.push(&e.to);
    }
  }

  let mut batch = WriteBatch::new();
  for (from, to) in groups.values() {
    for a in from {
      for b in to {
        batch.merge_edge(a, rule.rel, b);
      }
    }
  }
  batch
}

// ─── Stage ───────────────────────────────────────────────────────────────────

async fn units<U: TemporalUnit, S: GraphStore>(store: &S) -> Result<BTreeSet<U>> {
  let nodes = store.nodes(U::LABEL).await.map_err(Error::store)?;
  let mut units = BTreeSet::new();
  for node in nodes {
    match U::parse_key(&node.key) {
      Some(unit) => {
        units.insert(unit);
      }
      None => tracing::warn!(label = %U::LABEL, key = %node.key, "unparseable temporal key"),
    }
  }
  Ok(units)
}

async fn chain<U: TemporalUnit, S: GraphStore>(
  ctx: &PipelineContext<S>,
  report: &mut StageReport,
) -> Result<()> {
  let units = units::<U, S>(ctx.store()).await?;
  let batch = chain_batch(&units);
  tracing::info!(label = %U::LABEL, nodes = units.len(), operations = batch.len(), "linking chain");
  report.record_write(ctx.write_chunked(batch).await?);
  Ok(())
}

/// Build the temporal hierarchy, the sequence chains at every granularity and
/// the plan-vs-actual edges.
pub async fn run<S: GraphStore>(ctx: &PipelineContext<S>) -> Result<StageReport> {
  let mut report = StageReport::default();

  let periods = units::<PeriodId, S>(ctx.store()).await?;
  tracing::info!(periods = periods.len(), "building temporal hierarchy");
  report.record_write(ctx.write_chunked(hierarchy_batch(&periods)).await?);

  chain::<PeriodId, S>(ctx, &mut report).await?;
  chain::<QuarterId, S>(ctx, &mut report).await?;
  chain::<HalfYearId, S>(ctx, &mut report).await?;
  chain::<YearId, S>(ctx, &mut report).await?;

  let store = ctx.store();
  let has_statement = store.edges(RelType::HasStatement).await.map_err(Error::store)?;
  let mut attributes = Vec::new();
  for rel in [RelType::ForPeriod, RelType::HasClass] {
    attributes.extend(store.edges(rel).await.map_err(Error::store)?);
  }
  let rule = ctx.ontology.comparison_rule();
  let batch = comparison_batch(rule, &has_statement, &attributes);
  tracing::info!(rel = %rule.rel, edges = batch.len(), "linking plan and actual statements");
  report.record_write(ctx.write_chunked(batch).await?);

  Ok(report)
}

#[cfg(test)]
mod tests {
  use gmis_core::graph::{Props, WriteOp};

  use super::*;

  fn edges(batch: &WriteBatch, rel: RelType) -> Vec<(String, String)> {
    batch
      .ops()
      .iter()
      .filter_map(|op| match op {
        WriteOp::Edge(e) if e.rel == rel => Some((e.from.key.clone(), e.to.key.clone())),
        _ => None,
      })
      .collect()
  }

  fn pair(a: &str, b: &str) -> (String, String) { (a.to_owned(), b.to_owned()) }

  fn periods(ids: &[(i32, u32)]) -> BTreeSet<PeriodId> {
    ids.iter().map(|&(y, m)| PeriodId::new(y, m).unwrap()).collect()
  }

  #[test]
  fn hierarchy_links_each_level_once() {
    let batch = hierarchy_batch(&periods(&[(2023, 1), (2023, 2), (2023, 7)]));
    assert_eq!(edges(&batch, RelType::PartOf), [
      pair("2023-H1", "2023"),
      pair("2023-Q1", "2023-H1"),
      pair("202301", "2023-Q1"),
      pair("202302", "2023-Q1"),
      pair("2023-H2", "2023"),
      pair("2023-Q3", "2023-H2"),
      pair("202307", "2023-Q3"),
    ]);
  }

  #[test]
  fn year_nodes_use_integer_keys() {
    let batch = hierarchy_batch(&periods(&[(2023, 1)]));
    let year = batch.ops().iter().find_map(|op| match op {
      WriteOp::Node(m) if m.node.label == Label::Year => Some(m.on_create["year"].clone()),
      _ => None,
    });
    assert_eq!(year, Some(serde_json::json!(2023)));
  }

  #[test]
  fn periods_chain_previous_and_prior_year() {
    let batch = chain_batch(&periods(&[(2022, 3), (2023, 2), (2023, 3)]));
    assert_eq!(edges(&batch, RelType::Previous), [
      pair("202302", "202203"),
      pair("202303", "202302"),
    ]);
    assert_eq!(edges(&batch, RelType::PriorYearEquiv), [pair("202303", "202203")]);
  }

  #[test]
  fn quarters_chain_in_order() {
    let quarters: BTreeSet<QuarterId> =
      ["2023-Q2", "2022-Q2", "2023-Q1"].iter().filter_map(|k| QuarterId::parse_key(k)).collect();
    let batch = chain_batch(&quarters);
    assert_eq!(edges(&batch, RelType::Previous), [
      pair("2023-Q1", "2022-Q2"),
      pair("2023-Q2", "2023-Q1"),
    ]);
    assert_eq!(edges(&batch, RelType::PriorYearEquiv), [pair("2023-Q2", "2022-Q2")]);
  }

  #[test]
  fn years_link_prior_year() {
    let years: BTreeSet<YearId> = [YearId(2021), YearId(2022)].into_iter().collect();
    let batch = chain_batch(&years);
    assert_eq!(edges(&batch, RelType::Previous), [pair("2022", "2021")]);
    assert_eq!(edges(&batch, RelType::PriorYearEquiv), [pair("2022", "2021")]);
  }

  fn edge(from: NodeRef, rel: RelType, to: NodeRef) -> Edge {
    Edge { from, rel, to, props: Props::new() }
  }

  #[test]
  fn comparison_pairs_every_actual_with_every_plan_of_the_same_owner_and_period() {
    let fs = |id: &str| NodeRef::new(Label::FinancialStatement, id);
    let statements = [
      ("A", "A_202303_IS_SEPARATE_ACTUAL", "202303", "ACTUAL"),
      ("A", "A_202303_BS_SEPARATE_ACTUAL", "202303", "ACTUAL"),
      ("A", "A_202303_IS_SEPARATE_PLAN", "202303", "PLAN"),
      ("A", "A_202304_IS_SEPARATE_PLAN", "202304", "PLAN"),
      ("B", "B_202303_IS_SEPARATE_PLAN", "202303", "PLAN"),
    ];

    let mut has_statement = Vec::new();
    let mut attributes = Vec::new();
    for (owner, id, period, class) in statements {
      has_statement.push(edge(NodeRef::new(Label::Company, owner), RelType::HasStatement, fs(id)));
      attributes.extend([
        edge(fs(id), RelType::ForPeriod, NodeRef::new(Label::Period, period)),
        edge(fs(id), RelType::HasClass, NodeRef::new(Label::DataClass, class)),
      ]);
    }

    let rule = ComparisonRule {
      rel:  RelType::ComparisonFor,
      from: gmis_core::statement::DataClass::Actual,
      to:   gmis_core::statement::DataClass::Plan,
    };
    let batch = comparison_batch(rule, &has_statement, &attributes);
    assert_eq!(edges(&batch, RelType::ComparisonFor), [
      pair("A_202303_IS_SEPARATE_ACTUAL", "A_202303_IS_SEPARATE_PLAN"),
      pair("A_202303_BS_SEPARATE_ACTUAL", "A_202303_IS_SEPARATE_PLAN"),
    ]);
  }
}
