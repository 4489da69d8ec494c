//! [`SqliteGraphStore`], the SQLite implementation of [`GraphStore`].

use std::{collections::BTreeSet, path::Path};

use rusqlite::OptionalExtension as _;

use gmis_core::{
  graph::{Edge, GraphCounts, Label, Node, RelType, WriteBatch, WriteOp, WriteSummary},
  store::GraphStore,
};

use crate::{
  Error, Result,
  encode::{EncodedOp, RawEdge, RawNode, decode_label, encode_op},
  schema::{SCHEMA, unique_index_ddl},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A property graph backed by a single SQLite file.
///
/// Clones share one connection.
#[derive(Clone)]
pub struct SqliteGraphStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteGraphStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Close the underlying connection, flushing pending work.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

fn declared_in(conn: &rusqlite::Connection) -> rusqlite::Result<BTreeSet<String>> {
  let mut stmt = conn.prepare_cached("SELECT label FROM constraints")?;
  let labels = stmt.query_map([], |row| row.get(0))?.collect();
  labels
}

fn node_id(
  tx: &rusqlite::Transaction<'_>,
  label: &str,
  key: &str,
) -> rusqlite::Result<Option<i64>> {
  tx.prepare_cached("SELECT node_id FROM nodes WHERE label = ?1 AND key = ?2")?
    .query_row(rusqlite::params![label, key], |row| row.get(0))
    .optional()
}

fn apply_ops(
  tx: &rusqlite::Transaction<'_>,
  ops: Vec<EncodedOp>,
) -> rusqlite::Result<WriteSummary> {
  let mut summary = WriteSummary::default();

  for op in ops {
    match op {
      EncodedOp::Node { label, key, created, patch } => {
        let inserted = tx
          .prepare_cached("INSERT OR IGNORE INTO nodes (label, key, props) VALUES (?1, ?2, ?3)")?
          .execute(rusqlite::params![label, key, created])?;
        if inserted > 0 {
          summary.nodes_created += 1;
          continue;
        }
        summary.nodes_matched += 1;
        if let Some(patch) = patch {
          tx.prepare_cached(
            "UPDATE nodes SET props = json_patch(props, ?3) WHERE label = ?1 AND key = ?2",
          )?
          .execute(rusqlite::params![label, key, patch])?;
        }
      }
      EncodedOp::Edge { src_label, src_key, rel, dst_label, dst_key, props, patch } => {
        let (Some(src), Some(dst)) =
          (node_id(tx, src_label, &src_key)?, node_id(tx, dst_label, &dst_key)?)
        else {
          summary.edges_skipped += 1;
          continue;
        };
        let inserted = tx
          .prepare_cached(
            "INSERT OR IGNORE INTO edges (src, rel, dst, props) VALUES (?1, ?2, ?3, ?4)",
          )?
          .execute(rusqlite::params![src, rel, dst, props])?;
        if inserted > 0 {
          summary.edges_created += 1;
          continue;
        }
        summary.edges_matched += 1;
        if patch {
          tx.prepare_cached(
            "UPDATE edges SET props = json_patch(props, ?4)
             WHERE src = ?1 AND rel = ?2 AND dst = ?3",
          )?
          .execute(rusqlite::params![src, rel, dst, props])?;
        }
      }
    }
  }

  Ok(summary)
}

// ─── GraphStore impl ─────────────────────────────────────────────────────────

impl GraphStore for SqliteGraphStore {
  type Error = Error;

  // ── Schema ────────────────────────────────────────────────────────────────

  async fn declare_unique(&self, label: Label) -> Result<()> {
    let name = label.as_str();
    let property = label.key_property();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT OR IGNORE INTO constraints (label, property) VALUES (?1, ?2)",
          rusqlite::params![name, property],
        )?;
        tx.execute_batch(&unique_index_ddl(name))?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(label = name, property, "uniqueness constraint declared");
    Ok(())
  }

  async fn declared_labels(&self) -> Result<Vec<Label>> {
    let names = self.conn.call(|conn| Ok(declared_in(conn)?)).await?;
    names.iter().map(|s| decode_label(s)).collect()
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn apply(&self, batch: WriteBatch) -> Result<WriteSummary> {
    if batch.is_empty() {
      return Ok(WriteSummary::default());
    }

    let node_labels: BTreeSet<Label> = batch
      .ops()
      .iter()
      .filter_map(|op| match op {
        WriteOp::Node(m) => Some(m.node.label),
        WriteOp::Edge(_) => None,
      })
      .collect();
    let ops = batch
      .into_ops()
      .into_iter()
      .map(encode_op)
      .collect::<Result<Vec<_>>>()?;

    let outcome = self
      .conn
      .call(move |conn| {
        let declared = declared_in(conn)?;
        if let Some(missing) = node_labels.iter().find(|l| !declared.contains(l.as_str())) {
          return Ok(Err(*missing));
        }
        let tx = conn.transaction()?;
        let summary = apply_ops(&tx, ops)?;
        tx.commit()?;
        Ok(Ok(summary))
      })
      .await?;

    outcome.map_err(Error::UndeclaredConstraint)
  }

  async fn delete_chunk(&self, limit: usize) -> Result<usize> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM nodes WHERE node_id IN (SELECT node_id FROM nodes LIMIT ?1)",
          rusqlite::params![limit],
        )?)
      })
      .await?;

    Ok(deleted)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn nodes(&self, label: Label) -> Result<Vec<Node>> {
    let name = label.as_str();

    let raws: Vec<RawNode> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT label, key, props FROM nodes WHERE label = ?1 ORDER BY key")?;
        let rows = stmt
          .query_map(rusqlite::params![name], |row| {
            Ok(RawNode { label: row.get(0)?, key: row.get(1)?, props: row.get(2)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNode::into_node).collect()
  }

  async fn edges(&self, rel: RelType) -> Result<Vec<Edge>> {
    let name = rel.as_str();

    let raws: Vec<RawEdge> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT s.label, s.key, e.rel, d.label, d.key, e.props
           FROM edges e
           JOIN nodes s ON s.node_id = e.src
           JOIN nodes d ON d.node_id = e.dst
           WHERE e.rel = ?1
           ORDER BY e.edge_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![name], |row| {
            Ok(RawEdge {
              src_label: row.get(0)?,
              src_key:   row.get(1)?,
              rel:       row.get(2)?,
              dst_label: row.get(3)?,
              dst_key:   row.get(4)?,
              props:     row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEdge::into_edge).collect()
  }

  async fn counts(&self) -> Result<GraphCounts> {
    let (nodes, edges): (i64, i64) = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT (SELECT COUNT(*) FROM nodes), (SELECT COUNT(*) FROM edges)",
          [],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?)
      })
      .await?;

    Ok(GraphCounts { nodes: nodes.max(0) as u64, edges: edges.max(0) as u64 })
  }
}
