use tracing::{debug, info};

use lineage_core::{Direction, EntityKey, LineageEntity};

use crate::state::GraphState;
use crate::traversal::visible_set;

/// What a collapse removed from the graph. Kept verbatim so a later
/// re-expand can restore the exact subgraph without a refetch.
#[derive(Debug, Clone, Default)]
pub struct PruneOutcome {
    pub removed_entities: Vec<LineageEntity>,
    pub removed_edges: Vec<(EntityKey, EntityKey)>,
}

impl PruneOutcome {
    pub fn is_empty(&self) -> bool {
        self.removed_entities.is_empty() && self.removed_edges.is_empty()
    }
}

/// Reference-counted pruning: recompute which entities remain connected to
/// the center once every collapsed `(node, direction)` boundary is cut,
/// and drop the rest.
///
/// This is a full reachability recomputation, not a "remove direct
/// children" pass: an entity shared between a collapsed branch and a
/// retained one survives as long as one retained path reaches it. The
/// center and the collapsed node itself are never removed.
pub fn prune_unreachable(
    state: &mut GraphState,
    boundaries: &[(EntityKey, Direction)],
    collapsed_node: &EntityKey,
) -> PruneOutcome {
    let center = state.center().clone();
    let mut visible = visible_set(&state.edges, &center, boundaries);
    visible.insert(collapsed_node.clone());

    let doomed: Vec<EntityKey> = state
        .registry
        .keys()
        .filter(|key| !visible.contains(*key))
        .cloned()
        .collect();

    if doomed.is_empty() {
        debug!(node = %collapsed_node, "collapse removed nothing; all entities retained elsewhere");
        return PruneOutcome::default();
    }

    let mut outcome = PruneOutcome::default();

    for key in &doomed {
        // remove_touching physically drops the edges, so an edge between
        // two doomed nodes is returned exactly once across this loop.
        outcome.removed_edges.extend(state.edges.remove_touching(key));
        if let Some(entity) = state.registry.remove(key) {
            outcome.removed_entities.push(entity);
        }
    }

    state.reclassify();

    info!(
        node = %collapsed_node,
        removed_entities = outcome.removed_entities.len(),
        removed_edges = outcome.removed_edges.len(),
        "pruned unreachable lineage"
    );

    outcome
}
