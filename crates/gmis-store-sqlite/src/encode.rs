//! Encoding and decoding helpers between graph model types and the plain-text
//! representations stored in SQLite columns.
//!
//! Labels and relationship types are stored by their graph-contract names.
//! Property bags are stored as compact JSON objects.

use gmis_core::graph::{Edge, Label, Node, NodeRef, Props, RelType, WriteOp};

use crate::{Error, Result};

// ─── Names ───────────────────────────────────────────────────────────────────

pub fn decode_label(s: &str) -> Result<Label> {
  s.parse().map_err(|_| Error::Decode { what: "label", value: s.to_owned() })
}

pub fn decode_rel(s: &str) -> Result<RelType> {
  s.parse()
    .map_err(|_| Error::Decode { what: "relationship type", value: s.to_owned() })
}

// ─── Props ───────────────────────────────────────────────────────────────────

pub fn encode_props(props: &Props) -> Result<String> { Ok(serde_json::to_string(props)?) }

pub fn decode_props(s: &str) -> Result<Props> { Ok(serde_json::from_str(s)?) }

// ─── Write operations ────────────────────────────────────────────────────────

/// A [`WriteOp`] with every field rendered to its column representation, so
/// the database closure does no fallible encoding.
pub enum EncodedOp {
  Node {
    label:   &'static str,
    key:     String,
    /// `on_create ∪ set`, written when the node is new.
    created: String,
    /// `set`, patched onto an existing node; `None` when empty.
    patch:   Option<String>,
  },
  Edge {
    src_label: &'static str,
    src_key:   String,
    rel:       &'static str,
    dst_label: &'static str,
    dst_key:   String,
    props:     String,
    patch:     bool,
  },
}

pub fn encode_op(op: WriteOp) -> Result<EncodedOp> {
  Ok(match op {
    WriteOp::Node(m) => {
      let patch = (!m.set.is_empty()).then(|| encode_props(&m.set)).transpose()?;
      let mut created = m.on_create;
      created.extend(m.set);
      EncodedOp::Node {
        label: m.node.label.as_str(),
        key: m.node.key,
        created: encode_props(&created)?,
        patch,
      }
    }
    WriteOp::Edge(m) => EncodedOp::Edge {
      src_label: m.from.label.as_str(),
      src_key:   m.from.key,
      rel:       m.rel.as_str(),
      dst_label: m.to.label.as_str(),
      dst_key:   m.to.key,
      patch:     !m.props.is_empty(),
      props:     encode_props(&m.props)?,
    },
  })
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// Raw strings read directly from a `nodes` row.
pub struct RawNode {
  pub label: String,
  pub key:   String,
  pub props: String,
}

impl RawNode {
  pub fn into_node(self) -> Result<Node> {
    Ok(Node {
      label: decode_label(&self.label)?,
      key:   self.key,
      props: decode_props(&self.props)?,
    })
  }
}

/// Raw strings read from an `edges` row joined with both endpoints.
pub struct RawEdge {
  pub src_label: String,
  pub src_key:   String,
  pub rel:       String,
  pub dst_label: String,
  pub dst_key:   String,
  pub props:     String,
}

impl RawEdge {
  pub fn into_edge(self) -> Result<Edge> {
    Ok(Edge {
      from:  NodeRef::new(decode_label(&self.src_label)?, self.src_key),
      rel:   decode_rel(&self.rel)?,
      to:    NodeRef::new(decode_label(&self.dst_label)?, self.dst_key),
      props: decode_props(&self.props)?,
    })
  }
}
