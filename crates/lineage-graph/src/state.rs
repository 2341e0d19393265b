use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use lineage_core::{EntityKey, LineageEntity};

use crate::edges::EdgeStore;
use crate::registry::EntityRegistry;
use crate::traversal::{reachable_downstream, reachable_upstream};

/// Center-relative role of an entity, recomputed from the full edge set
/// after every merge or prune. A node can be both (a cycle through the
/// center), so this is a bit pair rather than a single label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub is_upstream: bool,
    pub is_downstream: bool,
}

/// Point-in-time copy of the graph handed to layout and rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub entities: Vec<LineageEntity>,
    pub edges: Vec<(EntityKey, EntityKey)>,
    pub center: EntityKey,
}

/// The mutable graph of one lineage session: registry + edge store +
/// center anchor + derived classifications. Mutated synchronously from the
/// single turn that receives a resolved fetch or a user action.
#[derive(Debug)]
pub struct GraphState {
    pub registry: EntityRegistry,
    pub edges: EdgeStore,
    center: EntityKey,
    classifications: HashMap<EntityKey, Classification>,
}

impl GraphState {
    pub fn new(center: EntityKey) -> Self {
        Self {
            registry: EntityRegistry::new(),
            edges: EdgeStore::new(),
            center,
            classifications: HashMap::new(),
        }
    }

    pub fn center(&self) -> &EntityKey {
        &self.center
    }

    pub fn is_center(&self, key: &EntityKey) -> bool {
        self.center == *key
    }

    pub fn classification(&self, key: &EntityKey) -> Classification {
        self.classifications.get(key).copied().unwrap_or_default()
    }

    /// Recompute every entity's upstream/downstream role by walking the
    /// full edge set from the center. Called after merge and after prune;
    /// new edges can give an already-known node a second role, so this is
    /// never computed from a partial diff.
    pub fn reclassify(&mut self) {
        let upstream = reachable_upstream(&self.edges, &self.center);
        let downstream = reachable_downstream(&self.edges, &self.center);

        self.classifications.clear();
        for key in self.registry.keys() {
            if *key == self.center {
                continue;
            }
            let classification = Classification {
                is_upstream: upstream.contains(key),
                is_downstream: downstream.contains(key),
            };
            if classification != Classification::default() {
                self.classifications.insert(key.clone(), classification);
            }
        }
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            entities: self.registry.iter().cloned().collect(),
            edges: self.edges.iter().cloned().collect(),
            center: self.center.clone(),
        }
    }

    /// Drop everything. The session is gone; a new center means a new state.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.edges.clear();
        self.classifications.clear();
    }
}
