//! The `GraphStore` trait.
//!
//! Implemented by storage backends (e.g. `gmis-store-sqlite`). The pipeline
//! depends on this abstraction only.

use std::future::Future;

use crate::graph::{Edge, GraphCounts, Label, Node, RelType, WriteBatch, WriteSummary};

/// Abstraction over a property-graph backend.
///
/// Writes are merges: applying the same batch twice leaves the graph as the
/// first application did. A backend refuses to write a label whose key
/// uniqueness has not been declared with [`GraphStore::declare_unique`].
pub trait GraphStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Schema ────────────────────────────────────────────────────────────

  /// Ensure the key property of `label` is unique. Idempotent.
  fn declare_unique(
    &self,
    label: Label,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Labels with a declared uniqueness constraint.
  fn declared_labels(
    &self,
  ) -> impl Future<Output = Result<Vec<Label>, Self::Error>> + Send + '_;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Apply every operation of `batch` in one transaction, in order.
  ///
  /// Edge merges whose endpoints are missing are skipped and counted in
  /// [`WriteSummary::edges_skipped`].
  fn apply(
    &self,
    batch: WriteBatch,
  ) -> impl Future<Output = Result<WriteSummary, Self::Error>> + Send + '_;

  /// Delete up to `limit` nodes together with their relationships. Returns
  /// the number of nodes deleted; `0` once the graph is empty.
  fn delete_chunk(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// All nodes carrying `label`, ordered by key.
  fn nodes(
    &self,
    label: Label,
  ) -> impl Future<Output = Result<Vec<Node>, Self::Error>> + Send + '_;

  /// All relationships of type `rel`.
  fn edges(
    &self,
    rel: RelType,
  ) -> impl Future<Output = Result<Vec<Edge>, Self::Error>> + Send + '_;

  fn counts(&self) -> impl Future<Output = Result<GraphCounts, Self::Error>> + Send + '_;
}
