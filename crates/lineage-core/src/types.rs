use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::entity::LineageEntity;

/// Default box handed to the layout engine for every node.
pub const NODE_WIDTH: f64 = 200.0;
pub const NODE_HEIGHT: f64 = 120.0;
/// Extra height given to the center node so it stands out in the layout.
pub const CENTER_HEIGHT_BOOST: f64 = 20.0;

/// Canonical identity of an entity inside a lineage session.
///
/// Keyed by fully-qualified name, falling back to the opaque service id
/// when no fqn is available.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for an entity with the fqn/id fallback rule applied.
    pub fn of(fqn: &str, id: &str) -> Self {
        if fqn.is_empty() {
            Self(id.to_string())
        } else {
            Self(fqn.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Upstream,
    Downstream,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Upstream => "upstream",
            Direction::Downstream => "downstream",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "upstream" => Ok(Direction::Upstream),
            "downstream" => Ok(Direction::Downstream),
            other => Err(format!("unknown lineage direction: {}", other)),
        }
    }
}

/// Reference to an entity as it appears on edge endpoints in the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub id: String,
    #[serde(default)]
    pub fully_qualified_name: Option<String>,
}

impl EntityRef {
    pub fn key(&self) -> EntityKey {
        EntityKey::of(self.fully_qualified_name.as_deref().unwrap_or(""), &self.id)
    }
}

/// Entity as returned by the metadata service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEntity {
    pub id: String,
    #[serde(default)]
    pub fully_qualified_name: Option<String>,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deleted: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEdge {
    pub from_entity: EntityRef,
    pub to_entity: EntityRef,
}

/// Full response of a lineage fetch, initial or incremental.
///
/// `center_node` is null on incremental expansion responses; empty
/// `nodes`/`edges` is the valid "no further lineage" answer, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageResponse {
    #[serde(default)]
    pub nodes: Vec<WireEntity>,
    #[serde(default)]
    pub edges: Vec<WireEdge>,
    #[serde(default)]
    pub center_node: Option<WireEntity>,
}

impl LineageResponse {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Convert the wire response into the fetch shape consumed by the
    /// merge engine, rooted at `center`.
    pub fn into_fetch(self, center: EntityKey, direction: Option<Direction>) -> LineageFetch {
        let mut nodes: Vec<LineageEntity> =
            self.nodes.into_iter().map(LineageEntity::from).collect();
        if let Some(center_node) = self.center_node {
            let center_entity = LineageEntity::from(center_node);
            if !nodes.iter().any(|n| n.key() == center_entity.key()) {
                nodes.push(center_entity);
            }
        }
        let edges = self
            .edges
            .iter()
            .map(|e| (e.from_entity.key(), e.to_entity.key()))
            .collect();
        LineageFetch {
            center,
            direction,
            nodes,
            edges,
        }
    }
}

/// A directional (or initial, symmetric) fetch result ready for merging.
#[derive(Debug, Clone)]
pub struct LineageFetch {
    /// The entity the whole session is anchored on.
    pub center: EntityKey,
    /// `None` for the initial symmetric fetch.
    pub direction: Option<Direction>,
    pub nodes: Vec<LineageEntity>,
    pub edges: Vec<(EntityKey, EntityKey)>,
}

/// Input box for one node handed to the layout engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutNode {
    pub id: String,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// Position assigned to a node by the layout engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    pub id: String,
    pub x: f64,
    pub y: f64,
}
