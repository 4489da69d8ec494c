//! The domain ontology: companies, sub-units, accounts, groups, ratios and the
//! business rules that tie them together.
//!
//! [`OntologyDocument`] mirrors the JSON configuration document. [`Ontology`]
//! is the validated form every pipeline stage reads from: references are
//! checked, string-keyed rules are parsed into typed tables, and alias
//! collisions are rejected. A partially valid ontology is never returned.

use std::{
  collections::{BTreeMap, HashMap},
  path::Path,
};

use serde::Deserialize;

use crate::{
  Error, Result,
  alias::{AliasContext, AliasMap},
  graph::{Label, RelType},
  statement::{DataClass, StatementType},
};

/// Segment names that stand for an aggregate of the whole company.
pub const WHOLE_COMPANY_SEGMENT: &str = "전사";

/// Category of accounts auto-registered from segment data.
pub const GENERATED_ACCOUNT_CATEGORY: &str = "SEGMENT_IS";

// ─── Entities ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
  Company,
  SubUnit,
}

impl EntityKind {
  pub fn label(self) -> Label {
    match self {
      Self::Company => Label::Company,
      Self::SubUnit => Label::SubUnit,
    }
  }
}

/// A company or an organisational sub-unit (`"type": "CIC"`).
#[derive(Debug, Clone, Deserialize)]
pub struct EntityDef {
  pub official_name:  String,
  #[serde(default)]
  pub aliases:        Vec<String>,
  #[serde(rename = "type", default)]
  pub entity_type:    Option<String>,
  #[serde(default)]
  pub parent_company: Option<String>,
  /// Identifier used in source file names; defaults to the entity ID.
  #[serde(default)]
  pub file_name_id:   Option<String>,
  #[serde(default = "default_available_data")]
  pub available_data: Vec<StatementType>,
  #[serde(default)]
  pub contextual_ids: ContextualIds,
  #[serde(default)]
  pub groups:         Vec<String>,
}

fn default_available_data() -> Vec<StatementType> {
  vec![StatementType::Income, StatementType::Balance]
}

impl EntityDef {
  pub fn kind(&self) -> EntityKind {
    match self.entity_type.as_deref() {
      Some(t) if t.eq_ignore_ascii_case("CIC") => EntityKind::SubUnit,
      _ => EntityKind::Company,
    }
  }

  /// Official name followed by every declared alias.
  pub fn terms(&self) -> impl Iterator<Item = &str> {
    std::iter::once(self.official_name.as_str()).chain(self.aliases.iter().map(String::as_str))
  }
}

/// Alternate identifiers an entity is filed under in specific source kinds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextualIds {
  #[serde(default)]
  pub segment_data: Option<String>,
}

// ─── Accounts ────────────────────────────────────────────────────────────────

/// How monthly observations of an account combine into a longer period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Aggregation {
  /// Flow accounts: the period value is the sum of its months.
  Sum,
  /// Stock accounts: the period value is the final month's value.
  Last,
}

impl Aggregation {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Sum => "SUM",
      Self::Last => "LAST",
    }
  }

  /// Combine month-ordered values into one period value.
  pub fn fold(self, monthly: impl IntoIterator<Item = f64>) -> Option<f64> {
    match self {
      Self::Sum => monthly.into_iter().fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v)),
      Self::Last => monthly.into_iter().last(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountDef {
  pub official_name: String,
  #[serde(default)]
  pub aliases:       Vec<String>,
  pub category:      String,
  pub aggregation:   Aggregation,
  #[serde(default)]
  pub description:   String,
}

impl AccountDef {
  pub fn terms(&self) -> impl Iterator<Item = &str> {
    std::iter::once(self.official_name.as_str()).chain(self.aliases.iter().map(String::as_str))
  }
}

/// The operation a parent account applies to one of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RollupOperation {
  #[serde(alias = "SUM", alias = "ADD", alias = "add", alias = "+")]
  #[serde(rename = "sum")]
  Sum,
  #[serde(alias = "SUBTRACT", alias = "SUB", alias = "-")]
  #[serde(rename = "subtract")]
  Subtract,
  #[serde(alias = "MULTIPLY", alias = "*")]
  #[serde(rename = "multiply")]
  Multiply,
  #[serde(alias = "DIVIDE", alias = "/")]
  #[serde(rename = "divide")]
  Divide,
}

impl RollupOperation {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Sum => "sum",
      Self::Subtract => "subtract",
      Self::Multiply => "multiply",
      Self::Divide => "divide",
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RollupComponent {
  pub account_id: String,
  pub operation:  RollupOperation,
}

// ─── Relationships ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Relationships {
  /// Parent account → components. Non-array entries are annotations.
  #[serde(default)]
  pub account_hierarchy:        BTreeMap<String, serde_json::Value>,
  #[serde(default)]
  pub contextual_relationships: ContextualRelationships,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextualRelationships {
  #[serde(rename = "PLAN_VS_ACTUAL", default)]
  pub plan_vs_actual: PlanVsActualDef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanVsActualDef {
  #[serde(default = "default_comparison_rel")]
  pub relationship_type: String,
  #[serde(default)]
  pub direction:         ComparisonDirection,
}

fn default_comparison_rel() -> String { RelType::ComparisonFor.as_str().to_owned() }

impl Default for PlanVsActualDef {
  fn default() -> Self {
    Self {
      relationship_type: default_comparison_rel(),
      direction:         ComparisonDirection::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComparisonDirection {
  pub from_id: DataClass,
  pub to_id:   DataClass,
}

impl Default for ComparisonDirection {
  fn default() -> Self { Self { from_id: DataClass::Actual, to_id: DataClass::Plan } }
}

/// Validated plan-vs-actual comparison rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonRule {
  pub rel:  RelType,
  pub from: DataClass,
  pub to:   DataClass,
}

// ─── Business rules ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusinessRules {
  #[serde(default)]
  pub company_groups:    BTreeMap<String, GroupDef>,
  #[serde(default)]
  pub special_handling:  SpecialHandling,
  #[serde(default)]
  pub cic_mapping_rules: BTreeMap<String, SubUnitRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupDef {
  pub name:              String,
  #[serde(default)]
  pub aliases:           Vec<String>,
  /// Source column flagging membership with `Y`; defaults to the first alias.
  #[serde(default)]
  pub membership_column: Option<String>,
}

impl GroupDef {
  pub fn membership_column(&self) -> Option<&str> {
    self.membership_column.as_deref().or_else(|| self.aliases.first().map(String::as_str))
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpecialHandling {
  #[serde(default)]
  pub use_adjusted_operating_income: Option<AccountSubstitution>,
}

/// Companies that report a substitute account in place of a standard one.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSubstitution {
  pub companies:      Vec<String>,
  pub account_to_use: String,
  pub replaces:       String,
}

/// Keyword inference of the sub-unit owning a segment of `company`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubUnitRule {
  /// Candidate sub-units, tried in order.
  pub target_cics: Vec<String>,
  /// Sub-unit → substrings of segment names it owns.
  #[serde(default)]
  pub keywords:    BTreeMap<String, Vec<String>>,
}

// ─── Ratios ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FinancialRatios {
  #[serde(default)]
  pub viewpoints: BTreeMap<String, ViewpointDef>,
  #[serde(default)]
  pub ratios:     BTreeMap<String, RatioDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewpointDef {
  pub name:    String,
  #[serde(default)]
  pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RatioDef {
  pub official_name: String,
  #[serde(default)]
  pub aliases:       Vec<String>,
  #[serde(default)]
  pub description:   String,
  pub viewpoint:     String,
  #[serde(default)]
  pub unit:          Option<String>,
  #[serde(flatten)]
  pub kind:          RatioKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RatioKind {
  /// The value is already present in source data under `source_account`.
  Stored {
    source_account:              String,
    #[serde(default)]
    related_accounts_for_context: Vec<String>,
  },
  /// The value must be computed from `components`.
  Calculated {
    components:    Vec<String>,
    #[serde(default)]
    formula_human: Option<String>,
  },
}

impl RatioDef {
  pub fn type_name(&self) -> &'static str {
    match self.kind {
      RatioKind::Stored { .. } => "STORED",
      RatioKind::Calculated { .. } => "CALCULATED",
    }
  }

  /// Accounts this ratio needs as inputs.
  pub fn required_accounts(&self) -> &[String] {
    match &self.kind {
      RatioKind::Stored { source_account, .. } => std::slice::from_ref(source_account),
      RatioKind::Calculated { components, .. } => components,
    }
  }

  pub fn formula(&self) -> Option<&str> {
    match &self.kind {
      RatioKind::Calculated { formula_human, .. } => formula_human.as_deref(),
      RatioKind::Stored { .. } => None,
    }
  }
}

// ─── Data sources ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataSources {
  #[serde(default)]
  pub main_files:    Vec<String>,
  #[serde(default)]
  pub segment_files: SegmentFiles,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentFiles {
  #[serde(default)]
  pub overrides:         BTreeMap<String, SegmentOverride>,
  #[serde(default)]
  pub dynamic_discovery: DynamicDiscovery,
  /// Aggregate pseudo-segments already present in corporate data.
  #[serde(default = "default_excluded_segments")]
  pub exclude_segments:  Vec<String>,
}

impl Default for SegmentFiles {
  fn default() -> Self {
    Self {
      overrides:         BTreeMap::new(),
      dynamic_discovery: DynamicDiscovery::default(),
      exclude_segments:  default_excluded_segments(),
    }
  }
}

fn default_excluded_segments() -> Vec<String> {
  ["합계", WHOLE_COMPANY_SEGMENT, "본사", "계", "총계", "Total"]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

/// How a segment file assigns rows to an owning entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SegmentFileFormat {
  /// Rows belong to the resolved company.
  #[default]
  #[serde(rename = "DEFAULT")]
  Company,
  /// Rows are assigned to a sub-unit by segment-name keyword inference.
  #[serde(rename = "ELECTRIC_CIC", alias = "INFER_SUB_UNIT")]
  InferSubUnit,
  /// The whole file is scoped to one sub-unit.
  #[serde(rename = "CIC_DIRECT")]
  SubUnitDirect,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmentOverride {
  #[serde(default)]
  pub file:              Option<String>,
  #[serde(default)]
  pub format:            SegmentFileFormat,
  /// Sub-unit → file holding only that sub-unit's segments.
  #[serde(default)]
  pub cic_mapping_files: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DynamicDiscovery {
  #[serde(default)]
  pub enabled:           bool,
  #[serde(default = "default_file_name_template")]
  pub file_name_template: String,
  #[serde(default)]
  pub exclude_companies: Vec<String>,
}

impl Default for DynamicDiscovery {
  fn default() -> Self {
    Self {
      enabled:            false,
      file_name_template: default_file_name_template(),
      exclude_companies:  Vec::new(),
    }
  }
}

fn default_file_name_template() -> String { "사업별손익_{file_name_id}.csv".to_owned() }

// ─── Source schemas ──────────────────────────────────────────────────────────

/// Column declarations for one kind of source file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileSchema {
  pub company_column:       String,
  pub year_column:          String,
  pub month_column:         String,
  pub class_column:         String,
  #[serde(default)]
  pub statement_column:     Option<String>,
  #[serde(default)]
  pub sub_unit_flag_column: Option<String>,
  /// Other descriptive columns that never carry values.
  #[serde(default)]
  pub meta_columns:         Vec<String>,
}

impl FileSchema {
  pub fn corporate() -> Self {
    Self {
      company_column:       "회사".into(),
      year_column:          "year".into(),
      month_column:         "month".into(),
      class_column:         "항목".into(),
      statement_column:     Some("계정".into()),
      sub_unit_flag_column: Some("CIC".into()),
      meta_columns:         ["그룹", "4개사", "11개사", "반기", "분기"]
        .into_iter()
        .map(str::to_owned)
        .collect(),
    }
  }

  pub fn segment() -> Self {
    Self {
      statement_column: None,
      sub_unit_flag_column: None,
      meta_columns: ["그룹", "4개사", "11개사", "CIC", "반기", "분기"]
        .into_iter()
        .map(str::to_owned)
        .collect(),
      ..Self::corporate()
    }
  }

  /// Columns a file must contain.
  pub fn required_columns(&self) -> Vec<&str> {
    let mut cols = vec![
      self.company_column.as_str(),
      self.year_column.as_str(),
      self.month_column.as_str(),
      self.class_column.as_str(),
    ];
    cols.extend(self.statement_column.as_deref());
    cols
  }

  /// Every declared non-value column.
  pub fn is_meta(&self, column: &str) -> bool {
    self.required_columns().contains(&column)
      || self.sub_unit_flag_column.as_deref() == Some(column)
      || self.meta_columns.iter().any(|c| c == column)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSchema {
  #[serde(default = "FileSchema::corporate")]
  pub corporate: FileSchema,
  #[serde(default = "FileSchema::segment")]
  pub segment:   FileSchema,
}

impl Default for SourceSchema {
  fn default() -> Self {
    Self { corporate: FileSchema::corporate(), segment: FileSchema::segment() }
  }
}

// ─── Document ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Entities {
  #[serde(default)]
  pub companies: BTreeMap<String, EntityDef>,
  #[serde(default)]
  pub accounts:  BTreeMap<String, AccountDef>,
}

/// The configuration document as written on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct OntologyDocument {
  pub entities:                         Entities,
  #[serde(default)]
  pub relationships:                    Relationships,
  #[serde(default)]
  pub business_rules:                   BusinessRules,
  #[serde(default)]
  pub financial_ratios:                 FinancialRatios,
  /// Segment account name → corporate account ID.
  #[serde(default)]
  pub segment_to_main_account_mapping:  BTreeMap<String, String>,
  #[serde(default)]
  pub data_sources:                     DataSources,
  #[serde(default)]
  pub source_schema:                    SourceSchema,
}

// ─── Validated ontology ──────────────────────────────────────────────────────

/// Account a segment column maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentAccount<'a> {
  /// Curated account from the ontology.
  Mapped(&'a str),
  /// Deterministic generated ID for an account only segment data knows.
  Generated(String),
}

impl SegmentAccount<'_> {
  pub fn id(&self) -> &str {
    match self {
      Self::Mapped(id) => id,
      Self::Generated(id) => id,
    }
  }
}

#[derive(Debug, Clone)]
pub struct Ontology {
  doc:        OntologyDocument,
  rollups:    BTreeMap<String, Vec<RollupComponent>>,
  comparison: ComparisonRule,
}

impl Ontology {
  /// Read, parse and validate the document at `path`.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| Error::OntologyUnreadable {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json_str(&raw)
  }

  pub fn from_json_str(raw: &str) -> Result<Self> {
    Self::from_document(serde_json::from_str(raw)?)
  }

  pub fn from_document(doc: OntologyDocument) -> Result<Self> {
    let mut rollups = BTreeMap::new();
    for (parent, entry) in &doc.relationships.account_hierarchy {
      if entry.is_array() {
        let components: Vec<RollupComponent> = serde_json::from_value(entry.clone())?;
        rollups.insert(parent.clone(), components);
      }
    }

    let def = &doc.relationships.contextual_relationships.plan_vs_actual;
    let rel = def
      .relationship_type
      .parse::<RelType>()
      .map_err(|_| Error::UnknownRelationship(def.relationship_type.clone()))?;
    let comparison = ComparisonRule {
      rel,
      from: def.direction.from_id,
      to: def.direction.to_id,
    };

    let ontology = Self { doc, rollups, comparison };
    ontology.validate()?;
    Ok(ontology)
  }

  fn validate(&self) -> Result<()> {
    let doc = &self.doc;
    let companies = &doc.entities.companies;
    let accounts = &doc.entities.accounts;

    let check = |owner: &str, kind: &'static str, id: &str, ok: bool| {
      if ok {
        Ok(())
      } else {
        Err(Error::UnknownReference { owner: owner.to_owned(), kind, id: id.to_owned() })
      }
    };
    let is_kind = |id: &str, kind: EntityKind| companies.get(id).is_some_and(|c| c.kind() == kind);

    // Every term names exactly one entity.
    let mut terms: HashMap<String, String> = HashMap::new();
    let entity_terms = companies
      .iter()
      .flat_map(|(id, def)| def.terms().map(move |t| (t, format!("{}:{id}", def.kind().label()))));
    let account_terms = accounts
      .iter()
      .flat_map(|(id, def)| def.terms().map(move |t| (t, format!("Account:{id}"))));
    for (term, target) in entity_terms.chain(account_terms) {
      let norm = AliasMap::normalize(term);
      match terms.get(&norm) {
        Some(existing) if *existing != target => {
          return Err(Error::AliasCollision {
            alias:  term.to_owned(),
            first:  existing.clone(),
            second: target,
          });
        }
        Some(_) => {}
        None => {
          terms.insert(norm, target);
        }
      }
    }

    for (id, def) in companies {
      if let Some(parent) = &def.parent_company {
        check(id, "parent company", parent, is_kind(parent, EntityKind::Company))?;
      }
      if let Some(alt) = &def.contextual_ids.segment_data {
        check(id, "contextual id", alt, companies.contains_key(alt))?;
      }
      for group in &def.groups {
        check(id, "company group", group, doc.business_rules.company_groups.contains_key(group))?;
      }
    }

    for (parent, components) in &self.rollups {
      check("account_hierarchy", "account", parent, accounts.contains_key(parent))?;
      for c in components {
        check(parent, "account", &c.account_id, accounts.contains_key(&c.account_id))?;
      }
    }

    for (id, ratio) in &doc.financial_ratios.ratios {
      check(
        id,
        "viewpoint",
        &ratio.viewpoint,
        doc.financial_ratios.viewpoints.contains_key(&ratio.viewpoint),
      )?;
      for acc in ratio.required_accounts() {
        check(id, "account", acc, accounts.contains_key(acc))?;
      }
      if let RatioKind::Stored { related_accounts_for_context, .. } = &ratio.kind {
        for acc in related_accounts_for_context {
          check(id, "account", acc, accounts.contains_key(acc))?;
        }
      }
    }

    for (name, target) in &doc.segment_to_main_account_mapping {
      check(name, "account", target, accounts.contains_key(target))?;
    }

    if let Some(rule) = &doc.business_rules.special_handling.use_adjusted_operating_income {
      check("use_adjusted_operating_income", "account", &rule.account_to_use, accounts.contains_key(&rule.account_to_use))?;
      check("use_adjusted_operating_income", "account", &rule.replaces, accounts.contains_key(&rule.replaces))?;
      for company in &rule.companies {
        check("use_adjusted_operating_income", "company", company, companies.contains_key(company))?;
      }
    }

    for (company, rule) in &doc.business_rules.cic_mapping_rules {
      check("cic_mapping_rules", "company", company, is_kind(company, EntityKind::Company))?;
      for target in rule.target_cics.iter().chain(rule.keywords.keys()) {
        check(company, "sub-unit", target, is_kind(target, EntityKind::SubUnit))?;
      }
    }

    for (company, ov) in &doc.data_sources.segment_files.overrides {
      check("segment overrides", "company", company, companies.contains_key(company))?;
      for sub_unit in ov.cic_mapping_files.keys() {
        check(company, "sub-unit", sub_unit, is_kind(sub_unit, EntityKind::SubUnit))?;
      }
    }

    Ok(())
  }

  pub fn document(&self) -> &OntologyDocument { &self.doc }

  // ── Entities ──────────────────────────────────────────────────────────

  pub fn entities(&self) -> impl Iterator<Item = (&str, &EntityDef)> {
    self.doc.entities.companies.iter().map(|(id, def)| (id.as_str(), def))
  }

  pub fn entity(&self, id: &str) -> Option<&EntityDef> { self.doc.entities.companies.get(id) }

  /// Label of the node representing entity `id`.
  pub fn entity_label(&self, id: &str) -> Option<Label> {
    self.entity(id).map(|def| def.kind().label())
  }

  /// Company or sub-unit alias → ID for the given loader context.
  pub fn alias_map(&self, context: AliasContext) -> AliasMap {
    let mut map = AliasMap::new();
    for (id, def) in self.entities() {
      for term in def.terms() {
        map.insert(term, id);
      }
    }
    if context == AliasContext::SegmentData {
      for (_, def) in self.entities() {
        if let Some(alt) = &def.contextual_ids.segment_data {
          for term in def.terms() {
            map.insert(term, alt.as_str());
          }
        }
      }
    }
    map
  }

  /// The substitute operating-income account for `company`, if any.
  pub fn operating_income_account(&self, company: &str) -> Option<&str> {
    self
      .doc
      .business_rules
      .special_handling
      .use_adjusted_operating_income
      .as_ref()
      .filter(|rule| rule.companies.iter().any(|c| c == company))
      .map(|rule| rule.account_to_use.as_str())
  }

  /// Infer which sub-unit of `company` owns `segment`: the first candidate
  /// whose keyword list has an entry contained in the segment name.
  pub fn infer_sub_unit(&self, company: &str, segment: &str) -> Option<&str> {
    let rule = self.doc.business_rules.cic_mapping_rules.get(company)?;
    rule
      .target_cics
      .iter()
      .find(|sub_unit| {
        rule
          .keywords
          .get(sub_unit.as_str())
          .is_some_and(|kws| kws.iter().any(|kw| !kw.is_empty() && segment.contains(kw.as_str())))
      })
      .map(String::as_str)
  }

  // ── Accounts ──────────────────────────────────────────────────────────

  pub fn accounts(&self) -> impl Iterator<Item = (&str, &AccountDef)> {
    self.doc.entities.accounts.iter().map(|(id, def)| (id.as_str(), def))
  }

  pub fn account(&self, id: &str) -> Option<&AccountDef> { self.doc.entities.accounts.get(id) }

  /// Account alias (and ID) → account ID.
  pub fn account_alias_map(&self) -> AliasMap {
    let mut map = AliasMap::new();
    for (id, def) in self.accounts() {
      for term in def.terms() {
        map.insert(term, id);
      }
      map.insert(id, id);
    }
    map
  }

  /// Parent account → its components, in document order.
  pub fn rollups(&self) -> &BTreeMap<String, Vec<RollupComponent>> { &self.rollups }

  pub fn segment_account(&self, account_name: &str) -> SegmentAccount<'_> {
    match self.doc.segment_to_main_account_mapping.get(account_name) {
      Some(id) => SegmentAccount::Mapped(id),
      None => SegmentAccount::Generated(format!("segment_{}", account_name.replace(' ', "_"))),
    }
  }

  // ── Groups and ratios ─────────────────────────────────────────────────

  pub fn groups(&self) -> impl Iterator<Item = (&str, &GroupDef)> {
    self.doc.business_rules.company_groups.iter().map(|(id, def)| (id.as_str(), def))
  }

  pub fn viewpoints(&self) -> impl Iterator<Item = (&str, &ViewpointDef)> {
    self.doc.financial_ratios.viewpoints.iter().map(|(id, def)| (id.as_str(), def))
  }

  pub fn ratios(&self) -> impl Iterator<Item = (&str, &RatioDef)> {
    self.doc.financial_ratios.ratios.iter().map(|(id, def)| (id.as_str(), def))
  }

  pub fn comparison_rule(&self) -> ComparisonRule { self.comparison }

  // ── Sources ───────────────────────────────────────────────────────────

  pub fn data_sources(&self) -> &DataSources { &self.doc.data_sources }

  pub fn source_schema(&self) -> &SourceSchema { &self.doc.source_schema }

  pub fn is_excluded_segment(&self, segment: &str) -> bool {
    self.doc.data_sources.segment_files.exclude_segments.iter().any(|s| s == segment)
  }
}
