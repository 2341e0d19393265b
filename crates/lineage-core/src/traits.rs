use async_trait::async_trait;

use crate::{Direction, LayoutEdge, LayoutNode, LineageResponse, NodePosition, Result};

/// Remote metadata service boundary.
///
/// Implementations fetch lineage over the wire; the engine never computes
/// lineage itself, it only models what the service returns.
#[async_trait]
pub trait LineageDataSource: Send + Sync {
    /// Initial fetch, symmetric depth in both directions.
    async fn get_lineage(&self, fqn: &str, entity_type: &str) -> Result<LineageResponse>;

    /// Incremental single-direction fetch rooted at `node_id`. `center_fqn`
    /// identifies the session the request belongs to. Empty `nodes`/`edges`
    /// is a valid "no further lineage" response.
    async fn expand_lineage(
        &self,
        center_fqn: &str,
        node_id: &str,
        direction: Direction,
        entity_type: &str,
    ) -> Result<LineageResponse>;
}

/// External layout engine boundary: node boxes and edges in, positions out.
#[async_trait]
pub trait LayoutEngine: Send + Sync {
    async fn layout(
        &self,
        nodes: &[LayoutNode],
        edges: &[LayoutEdge],
    ) -> Result<Vec<NodePosition>>;
}
