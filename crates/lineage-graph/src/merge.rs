use tracing::{debug, info};

use lineage_core::{EntityKey, LineageError, LineageFetch, Result};

use crate::state::GraphState;

/// Add-diff produced by reconciling one fetch into the graph. Re-merging
/// an identical fetch yields empty diffs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added_entities: Vec<EntityKey>,
    pub added_edges: Vec<(EntityKey, EntityKey)>,
}

impl MergeOutcome {
    pub fn is_empty(&self) -> bool {
        self.added_entities.is_empty() && self.added_edges.is_empty()
    }
}

/// Reconciles raw directional fetch results into the canonical graph.
pub struct MergeEngine;

impl MergeEngine {
    /// Merge a fetch into the graph and return what was newly added.
    ///
    /// Rejects the whole fetch with `CenterNotFound` when the session
    /// center is neither registered already nor present in the fetch. No
    /// partial merge happens in that case, since classification against a
    /// missing center would be meaningless.
    pub fn merge(state: &mut GraphState, fetch: &LineageFetch) -> Result<MergeOutcome> {
        let center = state.center().clone();
        if fetch.center != center {
            return Err(LineageError::InvalidOperation(format!(
                "fetch anchored on {} merged into session centered on {}",
                fetch.center, center
            )));
        }
        let center_known = state.registry.contains(&center)
            || fetch.nodes.iter().any(|n| n.key() == center);
        if !center_known {
            return Err(LineageError::CenterNotFound(center.to_string()));
        }

        let mut outcome = MergeOutcome::default();

        for node in &fetch.nodes {
            let result = state.registry.upsert(node.clone());
            if result.inserted {
                outcome.added_entities.push(result.key);
            }
        }

        for (from, to) in &fetch.edges {
            if state
                .edges
                .upsert(&state.registry, from.clone(), to.clone())
            {
                outcome.added_edges.push((from.clone(), to.clone()));
            }
        }

        // Classification runs over the full edge set, not the diff: a new
        // edge can give a previously merged node a second role.
        state.reclassify();

        if outcome.is_empty() {
            debug!(center = %center, "merge added nothing new");
        } else {
            info!(
                center = %center,
                direction = ?fetch.direction,
                added_entities = outcome.added_entities.len(),
                added_edges = outcome.added_edges.len(),
                "merged lineage fetch"
            );
        }

        Ok(outcome)
    }
}
