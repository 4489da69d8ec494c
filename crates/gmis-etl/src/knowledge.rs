//! The knowledge layer: the static ontology written as graph structure.
//!
//! Everything here is keyed by canonical ID, so rebuilding from an unchanged
//! ontology changes nothing.

use gmis_core::{
  graph::{Label, NodeRef, RelType, WriteBatch},
  ontology::Ontology,
  statement::{DataClass, Dimension, StatementScope, StatementType},
  store::GraphStore,
};
use serde_json::Value;
use strum::IntoEnumIterator;

use crate::{
  Result,
  context::{PipelineContext, StageReport},
};

fn dimension_nodes<D: Dimension>(batch: &mut WriteBatch) {
  for value in <D as IntoEnumIterator>::iter() {
    batch.merge_node(value.node_ref());
  }
}

fn terms<'a>(
  batch: &mut WriteBatch,
  owner: &NodeRef,
  terms: impl Iterator<Item = &'a str>,
) {
  for term in terms {
    let node = NodeRef::new(Label::Term, term);
    batch.merge_node(node.clone());
    batch.merge_edge(owner, RelType::AlsoKnownAs, &node);
  }
}

/// Every merge the ontology implies, in dependency order.
pub fn build_batch(ontology: &Ontology) -> WriteBatch {
  let mut batch = WriteBatch::new();

  dimension_nodes::<StatementType>(&mut batch);
  dimension_nodes::<StatementScope>(&mut batch);
  dimension_nodes::<DataClass>(&mut batch);

  for (id, group) in ontology.groups() {
    batch
      .merge_node(NodeRef::new(Label::CompanyGroup, id))
      .set("name", group.name.as_str());
  }

  // Companies before sub-units so PART_OF finds its parent.
  let mut entities: Vec<_> = ontology.entities().collect();
  entities.sort_by_key(|(id, def)| (def.kind().label() != Label::Company, *id));

  for (id, def) in entities {
    let node = NodeRef::new(def.kind().label(), id);
    let available: Vec<Value> = def
      .available_data
      .iter()
      .map(|t| Value::from(t.id()))
      .collect();
    batch
      .merge_node(node.clone())
      .set("name", def.official_name.as_str())
      .set("official_name", def.official_name.as_str())
      .set("file_name_id", def.file_name_id.as_deref().unwrap_or(id))
      .set("available_data", available)
      .set_opt("operating_income_account", ontology.operating_income_account(id));
    terms(&mut batch, &node, def.terms());

    if let Some(parent) = &def.parent_company {
      batch.merge_edge(&node, RelType::PartOf, &NodeRef::new(Label::Company, parent));
    }
    for group in &def.groups {
      batch.merge_edge(&node, RelType::MemberOf, &NodeRef::new(Label::CompanyGroup, group));
    }
  }

  for (id, def) in ontology.accounts() {
    let node = NodeRef::new(Label::Account, id);
    batch
      .merge_node(node.clone())
      .set("name", def.official_name.as_str())
      .set("official_name", def.official_name.as_str())
      .set("category", def.category.as_str())
      .set("aggregation", def.aggregation.as_str())
      .set("description", def.description.as_str());
    terms(&mut batch, &node, def.terms());
  }

  for (parent, components) in ontology.rollups() {
    let parent = NodeRef::new(Label::Account, parent);
    for c in components {
      batch
        .merge_edge(&parent, RelType::SumOf, &NodeRef::new(Label::Account, &c.account_id))
        .set("operation", c.operation.as_str());
    }
  }

  for (id, vp) in ontology.viewpoints() {
    batch
      .merge_node(NodeRef::new(Label::AnalysisViewpoint, id))
      .set("name", vp.name.as_str());
  }

  for (id, ratio) in ontology.ratios() {
    let node = NodeRef::new(Label::FinancialRatio, id);
    batch
      .merge_node(node.clone())
      .set("name", ratio.official_name.as_str())
      .set("description", ratio.description.as_str())
      .set("type", ratio.type_name())
      .set_opt("unit", ratio.unit.as_deref())
      .set_opt("formula", ratio.formula());
    batch.merge_edge(
      &node,
      RelType::PartOfViewpoint,
      &NodeRef::new(Label::AnalysisViewpoint, &ratio.viewpoint),
    );
    for account in ratio.required_accounts() {
      batch.merge_edge(&node, RelType::RequiresAccount, &NodeRef::new(Label::Account, account));
    }
  }

  batch
}

/// Write the knowledge layer in one transaction.
pub async fn run<S: GraphStore>(ctx: &PipelineContext<S>) -> Result<StageReport> {
  let batch = build_batch(&ctx.ontology);
  tracing::info!(operations = batch.len(), "writing knowledge layer");

  let mut report = StageReport::default();
  report.record_write(ctx.write(batch).await?);
  Ok(report)
}

#[cfg(test)]
mod tests {
  use gmis_core::graph::WriteOp;

  use super::*;

  fn ontology() -> Ontology {
    Ontology::from_json_str(
      r#"{
        "entities": {
          "companies": {
            "ELECTRIC": { "official_name": "LS ELECTRIC", "aliases": ["일렉트릭"], "groups": ["MFG"] },
            "POWER_CIC": { "official_name": "전력CIC", "type": "CIC", "parent_company": "ELECTRIC" }
          },
          "accounts": {
            "매출액": { "official_name": "매출액", "category": "IS", "aggregation": "SUM" },
            "매출원가": { "official_name": "매출원가", "category": "IS", "aggregation": "SUM" },
            "매출총이익": { "official_name": "매출총이익", "category": "IS", "aggregation": "SUM" }
          }
        },
        "relationships": {
          "account_hierarchy": {
            "매출총이익": [
              { "account_id": "매출액", "operation": "sum" },
              { "account_id": "매출원가", "operation": "subtract" }
            ]
          }
        },
        "business_rules": {
          "company_groups": { "MFG": { "name": "제조 4개사", "aliases": ["4개사"] } }
        },
        "financial_ratios": {
          "viewpoints": { "PROFIT": { "name": "수익성" } },
          "ratios": {
            "GPM": {
              "official_name": "매출총이익률", "viewpoint": "PROFIT", "unit": "%",
              "type": "CALCULATED", "components": ["매출총이익", "매출액"],
              "formula_human": "매출총이익 / 매출액"
            }
          }
        }
      }"#,
    )
    .unwrap()
  }

  fn position(batch: &WriteBatch, target: &NodeRef) -> Option<usize> {
    batch.ops().iter().position(|op| matches!(op, WriteOp::Node(m) if &m.node == target))
  }

  #[test]
  fn parents_precede_sub_units() {
    let batch = build_batch(&ontology());
    let parent = position(&batch, &NodeRef::new(Label::Company, "ELECTRIC")).unwrap();
    let child = position(&batch, &NodeRef::new(Label::SubUnit, "POWER_CIC")).unwrap();
    assert!(parent < child);
  }

  #[test]
  fn rollup_edges_carry_operation() {
    let batch = build_batch(&ontology());
    let ops: Vec<_> = batch
      .ops()
      .iter()
      .filter_map(|op| match op {
        WriteOp::Edge(e) if e.rel == RelType::SumOf => {
          Some((e.to.key.as_str(), e.props["operation"].as_str()))
        }
        _ => None,
      })
      .collect();
    assert_eq!(ops, [("매출액", Some("sum")), ("매출원가", Some("subtract"))]);
  }

  #[test]
  fn ratio_requires_its_components() {
    let batch = build_batch(&ontology());
    let required: Vec<_> = batch
      .ops()
      .iter()
      .filter_map(|op| match op {
        WriteOp::Edge(e) if e.rel == RelType::RequiresAccount => Some(e.to.key.as_str()),
        _ => None,
      })
      .collect();
    assert_eq!(required, ["매출총이익", "매출액"]);
  }

  #[test]
  fn dimension_vocabulary_is_written() {
    let batch = build_batch(&ontology());
    for node in [
      NodeRef::new(Label::StatementType, "IS"),
      NodeRef::new(Label::StatementScope, "SEPARATE"),
      NodeRef::new(Label::DataClass, "PLAN"),
    ] {
      assert!(position(&batch, &node).is_some(), "{node} missing");
    }
  }
}
