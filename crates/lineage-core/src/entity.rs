use serde::{Deserialize, Serialize};

use crate::{EntityKey, WireEntity};

/// A registered lineage entity (table, pipeline, dashboard, ...).
///
/// Identity is the fqn (fall back to id); displayable fields may be
/// refreshed by later fetches but identity never changes once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEntity {
    pub id: String,
    pub fqn: String,
    pub entity_type: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub deleted: bool,
}

impl LineageEntity {
    pub fn new(
        id: impl Into<String>,
        fqn: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            fqn: fqn.into(),
            entity_type: entity_type.into(),
            display_name: None,
            description: None,
            deleted: false,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::of(&self.fqn, &self.id)
    }

    /// Fold the displayable fields of a re-sighted entity into this record.
    /// Identity fields (`id`, `fqn`, `entity_type`) are left untouched.
    pub fn refresh_from(&mut self, other: &LineageEntity) {
        if other.display_name.is_some() {
            self.display_name = other.display_name.clone();
        }
        if other.description.is_some() {
            self.description = other.description.clone();
        }
        self.deleted = other.deleted;
    }
}

impl From<WireEntity> for LineageEntity {
    fn from(wire: WireEntity) -> Self {
        Self {
            id: wire.id,
            fqn: wire.fully_qualified_name.unwrap_or_default(),
            entity_type: wire.entity_type,
            display_name: wire.display_name,
            description: wire.description,
            deleted: wire.deleted.unwrap_or(false),
        }
    }
}
