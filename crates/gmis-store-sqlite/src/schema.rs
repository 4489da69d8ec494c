//! SQL schema for the GMIS SQLite graph store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS nodes (
    node_id INTEGER PRIMARY KEY,
    label   TEXT NOT NULL,
    key     TEXT NOT NULL,           -- value of the label's key property
    props   TEXT NOT NULL DEFAULT '{}',
    UNIQUE (label, key)
);

-- Deleting a node detaches it.
CREATE TABLE IF NOT EXISTS edges (
    edge_id INTEGER PRIMARY KEY,
    src     INTEGER NOT NULL REFERENCES nodes(node_id) ON DELETE CASCADE,
    rel     TEXT    NOT NULL,
    dst     INTEGER NOT NULL REFERENCES nodes(node_id) ON DELETE CASCADE,
    props   TEXT    NOT NULL DEFAULT '{}',
    UNIQUE (src, rel, dst)
);

-- Declared uniqueness constraints, one per label.
CREATE TABLE IF NOT EXISTS constraints (
    label    TEXT PRIMARY KEY,
    property TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS edges_rel_idx ON edges(rel);
CREATE INDEX IF NOT EXISTS edges_dst_idx ON edges(dst);

PRAGMA user_version = 1;
";

/// DDL for the per-label unique index backing a declared constraint.
pub fn unique_index_ddl(label: &str) -> String {
  format!(
    "CREATE UNIQUE INDEX IF NOT EXISTS nodes_unique_{label} ON nodes(key) WHERE label = '{label}'"
  )
}
