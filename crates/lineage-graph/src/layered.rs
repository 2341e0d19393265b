use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;

use lineage_core::{LayoutEdge, LayoutEngine, LayoutNode, NodePosition, Result};

/// Built-in layered layout: sources on the left, each node one column to
/// the right of its furthest predecessor, rows stacked within a column.
/// Deterministic, dependency-free stand-in for an external layout engine
/// and the default engine for tests.
pub struct LayeredLayout {
    pub layer_gap: f64,
    pub row_gap: f64,
}

impl Default for LayeredLayout {
    fn default() -> Self {
        Self {
            layer_gap: 100.0,
            row_gap: 80.0,
        }
    }
}

impl LayeredLayout {
    fn layers(nodes: &[LayoutNode], edges: &[LayoutEdge]) -> HashMap<String, usize> {
        let mut indegree: HashMap<&str, usize> = nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
        let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in edges {
            // Edges referencing unknown nodes are ignored rather than laid out.
            if !indegree.contains_key(edge.source.as_str())
                || !indegree.contains_key(edge.target.as_str())
            {
                continue;
            }
            *indegree.entry(edge.target.as_str()).or_insert(0) += 1;
            successors
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
        }

        // Longest-path layering via Kahn's ordering.
        let mut layer: HashMap<String, usize> = HashMap::new();
        let mut queue: VecDeque<&str> = nodes
            .iter()
            .filter(|n| indegree[n.id.as_str()] == 0)
            .map(|n| n.id.as_str())
            .collect();
        for id in &queue {
            layer.insert((*id).to_string(), 0);
        }

        while let Some(current) = queue.pop_front() {
            let current_layer = layer[current];
            for &next in successors.get(current).into_iter().flatten() {
                let entry = layer.entry(next.to_string()).or_insert(0);
                *entry = (*entry).max(current_layer + 1);
                let remaining = indegree.get_mut(next).expect("known node");
                *remaining -= 1;
                if *remaining == 0 {
                    queue.push_back(next);
                }
            }
        }

        // Nodes caught in a cycle never reach indegree zero; park them in
        // the first column instead of spinning.
        for node in nodes {
            layer.entry(node.id.clone()).or_insert(0);
        }

        layer
    }
}

#[async_trait]
impl LayoutEngine for LayeredLayout {
    async fn layout(
        &self,
        nodes: &[LayoutNode],
        edges: &[LayoutEdge],
    ) -> Result<Vec<NodePosition>> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }

        let layers = Self::layers(nodes, edges);

        // Group into columns, ordered by layer then id for determinism.
        let mut columns: BTreeMap<usize, Vec<&LayoutNode>> = BTreeMap::new();
        for node in nodes {
            columns.entry(layers[&node.id]).or_default().push(node);
        }
        for column in columns.values_mut() {
            column.sort_by(|a, b| a.id.cmp(&b.id));
        }

        let mut positions = Vec::with_capacity(nodes.len());
        let mut x = 0.0;
        for column in columns.values() {
            let column_width = column
                .iter()
                .map(|n| n.width)
                .fold(0.0_f64, f64::max);
            let mut y = 0.0;
            for node in column {
                positions.push(NodePosition {
                    id: node.id.clone(),
                    x,
                    y,
                });
                y += node.height + self.row_gap;
            }
            x += column_width + self.layer_gap;
        }

        Ok(positions)
    }
}
