use std::collections::{HashSet, VecDeque};

use lineage_core::{Direction, EntityKey};

use crate::edges::EdgeStore;

/// Keys reachable from `start` following edge direction (`from -> to`).
/// `start` itself is not included.
pub fn reachable_downstream(edges: &EdgeStore, start: &EntityKey) -> HashSet<EntityKey> {
    walk(edges, start, Direction::Downstream)
}

/// Keys from which `start` can be reached, i.e. walking edges in reverse.
/// `start` itself is not included.
pub fn reachable_upstream(edges: &EdgeStore, start: &EntityKey) -> HashSet<EntityKey> {
    walk(edges, start, Direction::Upstream)
}

fn walk(edges: &EdgeStore, start: &EntityKey, direction: Direction) -> HashSet<EntityKey> {
    let mut visited: HashSet<EntityKey> = HashSet::new();
    let mut queue: VecDeque<EntityKey> = VecDeque::new();
    queue.push_back(start.clone());

    while let Some(current) = queue.pop_front() {
        let neighbors: Vec<EntityKey> = match direction {
            Direction::Downstream => edges.outgoing(&current).cloned().collect(),
            Direction::Upstream => edges.incoming(&current).cloned().collect(),
        };
        for neighbor in neighbors {
            if neighbor != *start && visited.insert(neighbor.clone()) {
                queue.push_back(neighbor);
            }
        }
    }

    visited
}

/// Entities still connected to `center` when every collapsed
/// `(node, direction)` boundary is cut.
///
/// Visibility is orientation-agnostic: any chain of edges connects a node
/// to the center regardless of which way the individual edges point. A
/// boundary `(n, Downstream)` cuts n's outgoing edges, `(n, Upstream)` its
/// incoming ones. The center is always part of the returned set.
pub fn visible_set(
    edges: &EdgeStore,
    center: &EntityKey,
    boundaries: &[(EntityKey, Direction)],
) -> HashSet<EntityKey> {
    let cut = |from: &EntityKey, to: &EntityKey| -> bool {
        boundaries.iter().any(|(node, direction)| match direction {
            Direction::Downstream => from == node,
            Direction::Upstream => to == node,
        })
    };

    let mut visible: HashSet<EntityKey> = HashSet::new();
    visible.insert(center.clone());
    let mut queue: VecDeque<EntityKey> = VecDeque::new();
    queue.push_back(center.clone());

    while let Some(current) = queue.pop_front() {
        for (from, to) in edges.iter() {
            if cut(from, to) {
                continue;
            }
            let neighbor = if *from == current {
                to
            } else if *to == current {
                from
            } else {
                continue;
            };
            if visible.insert(neighbor.clone()) {
                queue.push_back(neighbor.clone());
            }
        }
    }

    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EntityRegistry;
    use lineage_core::LineageEntity;

    fn graph(fqns: &[&str], edge_pairs: &[(&str, &str)]) -> (EntityRegistry, EdgeStore) {
        let mut registry = EntityRegistry::new();
        for (i, fqn) in fqns.iter().enumerate() {
            registry.upsert(LineageEntity::new(format!("u-{i}"), *fqn, "table"));
        }
        let mut edges = EdgeStore::new();
        for (from, to) in edge_pairs {
            assert!(edges.upsert(&registry, (*from).into(), (*to).into()));
        }
        (registry, edges)
    }

    #[test]
    fn directional_reachability_follows_orientation() {
        // a -> b -> c, with d -> b
        let (_, edges) = graph(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("d", "b")]);

        let down = reachable_downstream(&edges, &"a".into());
        assert!(down.contains(&"b".into()) && down.contains(&"c".into()));
        assert!(!down.contains(&"d".into()));

        let up = reachable_upstream(&edges, &"c".into());
        assert!(up.contains(&"a".into()) && up.contains(&"b".into()) && up.contains(&"d".into()));
    }

    #[test]
    fn visible_set_crosses_edge_orientation() {
        // center c; u -> c and c -> d; x -> d (upstream of a downstream node)
        let (_, edges) = graph(&["c", "u", "d", "x"], &[("u", "c"), ("c", "d"), ("x", "d")]);
        let visible = visible_set(&edges, &"c".into(), &[]);
        assert_eq!(visible.len(), 4);
        assert!(visible.contains(&"x".into()));
    }

    #[test]
    fn boundary_cuts_traversal_through_collapsed_node() {
        // a -> b1 -> c and a -> b2 -> c
        let (_, edges) = graph(
            &["a", "b1", "b2", "c"],
            &[("a", "b1"), ("b1", "c"), ("a", "b2"), ("b2", "c")],
        );

        let one = visible_set(&edges, &"c".into(), &[("b1".into(), Direction::Upstream)]);
        assert!(one.contains(&"a".into()), "a still reachable via b2");

        let both = visible_set(
            &edges,
            &"c".into(),
            &[
                ("b1".into(), Direction::Upstream),
                ("b2".into(), Direction::Upstream),
            ],
        );
        assert!(!both.contains(&"a".into()));
        assert!(both.contains(&"b1".into()) && both.contains(&"b2".into()));
    }
}
