use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use lineage_core::{
    Direction, EntityKey, LineageDataSource, LineageEntity, LineageError, LineageFetch,
};

use crate::merge::{MergeEngine, MergeOutcome};
use crate::prune::{prune_unreachable, PruneOutcome};
use crate::state::GraphState;

/// Lifecycle of one (entity, direction) pair:
/// `Idle -> Loading -> {Expanded | Error}`, `Expanded -> Collapsed`,
/// `Collapsed -> Loading/Expanded` on re-expand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionPhase {
    Idle,
    Loading,
    Expanded,
    Collapsed,
    Error(String),
}

impl Default for ExpansionPhase {
    fn default() -> Self {
        ExpansionPhase::Idle
    }
}

/// Expansion state of one (entity, direction) pair. Owned by the
/// controller, not by the entity: a node can be visible via one path while
/// collapsed from another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectionState {
    pub phase: ExpansionPhase,
    /// `None` until the direction has been fetched at least once;
    /// `Some(false)` records a confirmed "no further lineage".
    pub has_known_connections: Option<bool>,
}

impl DirectionState {
    pub fn is_loading(&self) -> bool {
        self.phase == ExpansionPhase::Loading
    }

    pub fn is_collapsed(&self) -> bool {
        self.phase == ExpansionPhase::Collapsed
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            ExpansionPhase::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Subgraph removed by a collapse, kept so that re-expanding without an
/// intervening fetch restores exactly what was visible before.
#[derive(Debug, Clone, Default)]
struct HiddenSubgraph {
    entities: Vec<LineageEntity>,
    edges: Vec<(EntityKey, EntityKey)>,
}

/// Result of an expand request. Fetch failures are reported here and as
/// per-pair `Error` state; they never corrupt the graph stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandOutcome {
    /// A request for this (node, direction) is already in flight.
    AlreadyInFlight,
    Expanded(MergeOutcome),
    /// Valid empty answer: this direction has no further lineage.
    NoConnections,
    Failed(String),
}

/// Per-node per-direction expand/collapse state machine. Expansion fetches
/// through the data source and merges on success; collapse is synchronous,
/// cannot fail, and prunes via reachability recomputation.
pub struct ExpansionController {
    graph: Arc<RwLock<GraphState>>,
    source: Arc<dyn LineageDataSource>,
    states: DashMap<(EntityKey, Direction), DirectionState>,
    hidden: DashMap<(EntityKey, Direction), HiddenSubgraph>,
    fetch_timeout: Duration,
}

impl ExpansionController {
    pub fn new(
        graph: Arc<RwLock<GraphState>>,
        source: Arc<dyn LineageDataSource>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            graph,
            source,
            states: DashMap::new(),
            hidden: DashMap::new(),
            fetch_timeout,
        }
    }

    pub fn state(&self, key: &EntityKey, direction: Direction) -> DirectionState {
        self.states
            .get(&(key.clone(), direction))
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Every currently collapsed (node, direction) boundary. Pruning cuts
    /// them all together so that earlier collapses keep counting.
    pub fn collapsed_boundaries(&self) -> Vec<(EntityKey, Direction)> {
        self.states
            .iter()
            .filter(|entry| entry.value().is_collapsed())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Expand one (node, direction). At most one request per pair is in
    /// flight; requests for different pairs proceed independently. A
    /// collapse that was pruned earlier is restored from the local cache
    /// without touching the network.
    pub async fn request_expand(&self, key: &EntityKey, direction: Direction) -> ExpandOutcome {
        if let Some(hidden) = self.take_hidden(key, direction) {
            return self.restore_hidden(key, direction, hidden);
        }

        if !self.begin_loading(key, direction) {
            debug!(node = %key, %direction, "expand already in flight; ignoring");
            return ExpandOutcome::AlreadyInFlight;
        }

        // Snapshot the identifiers we need, then release the lock before
        // suspending on the network.
        let (center_fqn, node_fqn, entity_type) = {
            let graph = self.graph.read();
            let center_fqn = graph.center().to_string();
            match graph.registry.get(key) {
                Some(entity) => (
                    center_fqn,
                    entity.key().to_string(),
                    entity.entity_type.clone(),
                ),
                None => {
                    drop(graph);
                    let message = format!("cannot expand unknown entity {key}");
                    self.mark_error(key, direction, message.clone());
                    return ExpandOutcome::Failed(message);
                }
            }
        };

        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            self.source
                .expand_lineage(&center_fqn, &node_fqn, direction, &entity_type),
        )
        .await
        .unwrap_or_else(|_| Err(LineageError::Timeout(node_fqn.clone())));

        let response = match fetched {
            Ok(response) => response,
            Err(e) => {
                let message = e.to_string();
                warn!(node = %key, %direction, error = %message, "lineage expand failed");
                self.mark_error(key, direction, message.clone());
                return ExpandOutcome::Failed(message);
            }
        };

        if response.is_empty() {
            // Not an error: record that this direction is exhausted so the
            // UI can stop offering expansion there.
            self.finish(key, direction, Some(false));
            return ExpandOutcome::NoConnections;
        }

        let edges_found = !response.edges.is_empty();
        let center = EntityKey::new(center_fqn);
        let fetch = response.into_fetch(center, Some(direction));

        let merged = {
            let mut graph = self.graph.write();
            MergeEngine::merge(&mut graph, &fetch)
        };

        match merged {
            Ok(outcome) => {
                let has_connections = !outcome.added_entities.is_empty() || edges_found;
                self.finish(key, direction, Some(has_connections));
                ExpandOutcome::Expanded(outcome)
            }
            Err(e) => {
                let message = e.to_string();
                self.mark_error(key, direction, message.clone());
                ExpandOutcome::Failed(message)
            }
        }
    }

    /// Collapse one (node, direction). Synchronous, no network call, no
    /// failure mode. Entities reachable only through this boundary are
    /// pruned; anything retained by another path stays visible.
    ///
    /// Collapsing an already collapsed pair is a no-op: the subgraph is
    /// pruned already, and re-pruning would replace the stashed copy with
    /// an empty one, losing it for re-expand.
    pub fn request_collapse(&self, key: &EntityKey, direction: Direction) -> PruneOutcome {
        if self.state(key, direction).is_collapsed() {
            debug!(node = %key, %direction, "already collapsed; keeping stashed subgraph");
            return PruneOutcome::default();
        }

        let mut boundaries = self.collapsed_boundaries();
        boundaries.push((key.clone(), direction));

        let outcome = {
            let mut graph = self.graph.write();
            prune_unreachable(&mut graph, &boundaries, key)
        };

        self.hidden.insert(
            (key.clone(), direction),
            HiddenSubgraph {
                entities: outcome.removed_entities.clone(),
                edges: outcome.removed_edges.clone(),
            },
        );
        self.states
            .entry((key.clone(), direction))
            .or_default()
            .phase = ExpansionPhase::Collapsed;

        outcome
    }

    /// Forget all per-pair state. Invoked when the session closes.
    pub fn clear(&self) {
        self.states.clear();
        self.hidden.clear();
    }

    fn restore_hidden(
        &self,
        key: &EntityKey,
        direction: Direction,
        hidden: HiddenSubgraph,
    ) -> ExpandOutcome {
        debug!(node = %key, %direction, "re-expanding from local cache, no refetch");
        let fetch = {
            let graph = self.graph.read();
            LineageFetch {
                center: graph.center().clone(),
                direction: Some(direction),
                nodes: hidden.entities,
                edges: hidden.edges,
            }
        };

        let merged = {
            let mut graph = self.graph.write();
            MergeEngine::merge(&mut graph, &fetch)
        };

        match merged {
            Ok(outcome) => {
                self.finish(key, direction, None);
                ExpandOutcome::Expanded(outcome)
            }
            Err(e) => {
                let message = e.to_string();
                self.mark_error(key, direction, message.clone());
                ExpandOutcome::Failed(message)
            }
        }
    }

    /// Move the pair into `Loading`; false if a request is already in
    /// flight there.
    fn begin_loading(&self, key: &EntityKey, direction: Direction) -> bool {
        let mut entry = self.states.entry((key.clone(), direction)).or_default();
        if entry.is_loading() {
            return false;
        }
        entry.phase = ExpansionPhase::Loading;
        true
    }

    fn finish(&self, key: &EntityKey, direction: Direction, has_connections: Option<bool>) {
        let mut entry = self.states.entry((key.clone(), direction)).or_default();
        entry.phase = ExpansionPhase::Expanded;
        if has_connections.is_some() {
            entry.has_known_connections = has_connections;
        }
    }

    fn mark_error(&self, key: &EntityKey, direction: Direction, message: String) {
        let mut entry = self.states.entry((key.clone(), direction)).or_default();
        entry.phase = ExpansionPhase::Error(message);
    }

    fn take_hidden(&self, key: &EntityKey, direction: Direction) -> Option<HiddenSubgraph> {
        self.hidden
            .remove(&(key.clone(), direction))
            .map(|(_, hidden)| hidden)
    }
}
