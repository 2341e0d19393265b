use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

use lineage_core::{
    Direction, EntityKey, LayoutEngine, LineageConfig, LineageDataSource, LineageError, Result,
};

use crate::expansion::{DirectionState, ExpandOutcome, ExpansionController};
use crate::layout::{LayoutRequestCoordinator, PositionedSnapshot};
use crate::merge::MergeEngine;
use crate::prune::PruneOutcome;
use crate::state::{Classification, GraphSnapshot, GraphState};

/// One lineage viewing session, anchored on a single center entity.
///
/// Owns the registry, edge store, expansion state and layout coordination;
/// all components share this object instead of module-level singletons, so
/// concurrent sessions never interfere.
pub struct LineageSession {
    id: Uuid,
    center: EntityKey,
    graph: Arc<RwLock<GraphState>>,
    controller: ExpansionController,
    coordinator: LayoutRequestCoordinator,
}

impl LineageSession {
    /// Open a session on `fqn`: one initial fetch, symmetric depth in both
    /// directions. Fails with `CenterNotFound` when the response does not
    /// contain the requested entity; nothing is merged in that case.
    pub async fn open(
        config: &LineageConfig,
        source: Arc<dyn LineageDataSource>,
        engine: Arc<dyn LayoutEngine>,
        fqn: &str,
        entity_type: &str,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let response = tokio::time::timeout(timeout, source.get_lineage(fqn, entity_type))
            .await
            .unwrap_or_else(|_| Err(LineageError::Timeout(fqn.to_string())))?;

        let center = EntityKey::new(fqn);
        let center_present = response
            .center_node
            .as_ref()
            .map(|n| EntityKey::of(n.fully_qualified_name.as_deref().unwrap_or(""), &n.id))
            .is_some_and(|key| key == center)
            || response.nodes.iter().any(|n| {
                EntityKey::of(n.fully_qualified_name.as_deref().unwrap_or(""), &n.id) == center
            });
        if !center_present {
            return Err(LineageError::CenterNotFound(fqn.to_string()));
        }

        let mut state = GraphState::new(center.clone());
        let fetch = response.into_fetch(center.clone(), None);
        MergeEngine::merge(&mut state, &fetch)?;

        let graph = Arc::new(RwLock::new(state));
        let session = Self {
            id: Uuid::new_v4(),
            center,
            graph: graph.clone(),
            controller: ExpansionController::new(graph, source, timeout),
            coordinator: LayoutRequestCoordinator::new(engine),
        };
        info!(session = %session.id, center = %session.center, "lineage session opened");
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn center(&self) -> &EntityKey {
        &self.center
    }

    /// Incrementally fetch and merge more lineage in one direction.
    pub async fn expand(&self, key: &EntityKey, direction: Direction) -> ExpandOutcome {
        self.controller.request_expand(key, direction).await
    }

    /// Hide everything reachable only through `(key, direction)`.
    /// Synchronous and infallible.
    pub fn collapse(&self, key: &EntityKey, direction: Direction) -> PruneOutcome {
        self.controller.request_collapse(key, direction)
    }

    pub fn direction_state(&self, key: &EntityKey, direction: Direction) -> DirectionState {
        self.controller.state(key, direction)
    }

    pub fn classification(&self, key: &EntityKey) -> Classification {
        self.graph.read().classification(key)
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.graph.read().snapshot()
    }

    pub fn entity_count(&self) -> usize {
        self.graph.read().registry.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.read().edges.len()
    }

    /// Lay out the current snapshot. `None` means the result was
    /// superseded by a newer request and must not be rendered.
    pub async fn positioned(&self) -> Result<Option<PositionedSnapshot>> {
        let snapshot = self.snapshot();
        self.coordinator.request_layout(snapshot).await
    }

    /// Close the session: drop the entire graph and all expansion state.
    pub fn close(&self) {
        self.graph.write().clear();
        self.controller.clear();
        info!(session = %self.id, center = %self.center, "lineage session closed");
    }
}
