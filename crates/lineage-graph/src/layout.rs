use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use lineage_core::{
    LayoutEdge, LayoutEngine, LayoutNode, NodePosition, Result, CENTER_HEIGHT_BOOST, NODE_HEIGHT,
    NODE_WIDTH,
};

use crate::state::GraphSnapshot;

/// A graph snapshot with positions assigned by the layout engine.
#[derive(Debug, Clone)]
pub struct PositionedSnapshot {
    pub snapshot: GraphSnapshot,
    pub positions: HashMap<String, NodePosition>,
}

/// Serializes layout recomputation against the external layout engine.
///
/// Every request gets a monotonically increasing sequence number; a result
/// resolving after a newer request was issued is discarded, so a rapid
/// burst of expand/collapse actions can never paint an out-of-order
/// layout. No cancellation signal is sent to the engine itself.
pub struct LayoutRequestCoordinator {
    engine: Arc<dyn LayoutEngine>,
    latest: AtomicU64,
}

impl LayoutRequestCoordinator {
    pub fn new(engine: Arc<dyn LayoutEngine>) -> Self {
        Self {
            engine,
            latest: AtomicU64::new(0),
        }
    }

    /// Lay out a full snapshot. Returns `None` when the result was
    /// superseded by a fresher request while the engine was working.
    pub async fn request_layout(
        &self,
        snapshot: GraphSnapshot,
    ) -> Result<Option<PositionedSnapshot>> {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        let nodes: Vec<LayoutNode> = snapshot
            .entities
            .iter()
            .map(|entity| {
                let key = entity.key();
                let height = if key == snapshot.center {
                    NODE_HEIGHT + CENTER_HEIGHT_BOOST
                } else {
                    NODE_HEIGHT
                };
                LayoutNode {
                    id: key.to_string(),
                    width: NODE_WIDTH,
                    height,
                }
            })
            .collect();
        let edges: Vec<LayoutEdge> = snapshot
            .edges
            .iter()
            .enumerate()
            .map(|(i, (from, to))| LayoutEdge {
                id: format!("edge-{i}"),
                source: from.to_string(),
                target: to.to_string(),
            })
            .collect();

        let positions = self.engine.layout(&nodes, &edges).await?;

        if self.latest.load(Ordering::SeqCst) != ticket {
            debug!(ticket, "discarding superseded layout result");
            return Ok(None);
        }

        Ok(Some(PositionedSnapshot {
            snapshot,
            positions: positions.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }))
    }
}
