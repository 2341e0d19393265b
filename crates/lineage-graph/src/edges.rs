use std::collections::BTreeSet;

use tracing::warn;

use lineage_core::EntityKey;

use crate::registry::EntityRegistry;

/// Canonical, deduplicated set of directed relationships between
/// registered entities. Edge identity is the `(from, to)` pair; duplicate
/// sightings coalesce silently.
#[derive(Debug, Default)]
pub struct EdgeStore {
    edges: BTreeSet<(EntityKey, EntityKey)>,
}

impl EdgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an edge. Returns `true` iff it was newly added. An edge whose
    /// endpoints are not both registered is rejected as a no-op: the store
    /// never holds a dangling edge.
    pub fn upsert(&mut self, registry: &EntityRegistry, from: EntityKey, to: EntityKey) -> bool {
        if !registry.contains(&from) || !registry.contains(&to) {
            warn!(%from, %to, "rejecting edge with unregistered endpoint");
            return false;
        }
        self.edges.insert((from, to))
    }

    pub fn contains(&self, from: &EntityKey, to: &EntityKey) -> bool {
        self.edges.contains(&(from.clone(), to.clone()))
    }

    /// Used only by the pruning routine.
    pub fn remove(&mut self, from: &EntityKey, to: &EntityKey) -> bool {
        self.edges.remove(&(from.clone(), to.clone()))
    }

    /// Remove every edge touching `key`, returning the removed pairs.
    /// Used only by the pruning routine.
    pub fn remove_touching(&mut self, key: &EntityKey) -> Vec<(EntityKey, EntityKey)> {
        let removed: Vec<_> = self
            .edges
            .iter()
            .filter(|(from, to)| from == key || to == key)
            .cloned()
            .collect();
        for edge in &removed {
            self.edges.remove(edge);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(EntityKey, EntityKey)> {
        self.edges.iter()
    }

    pub fn outgoing<'a>(&'a self, key: &'a EntityKey) -> impl Iterator<Item = &'a EntityKey> {
        self.edges
            .iter()
            .filter(move |(from, _)| from == key)
            .map(|(_, to)| to)
    }

    pub fn incoming<'a>(&'a self, key: &'a EntityKey) -> impl Iterator<Item = &'a EntityKey> {
        self.edges
            .iter()
            .filter(move |(_, to)| to == key)
            .map(|(from, _)| from)
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }
}
