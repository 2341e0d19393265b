use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use lineage_core::{EntityKey, LineageEntity};

/// A registered entity together with its sighting timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity: LineageEntity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of an entity upsert: the canonical key and whether the entity
/// was newly registered (vs. merely refreshed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertResult {
    pub key: EntityKey,
    pub inserted: bool,
}

/// Canonical store of entity identities for one lineage session.
///
/// Deduplicates by fully-qualified name (falling back to the service id).
/// Re-sighting an fqn refreshes displayable fields but never changes
/// identity.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: BTreeMap<EntityKey, EntityRecord>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, entity: LineageEntity) -> UpsertResult {
        let key = entity.key();
        let now = Utc::now();
        match self.entities.get_mut(&key) {
            Some(record) => {
                record.entity.refresh_from(&entity);
                record.updated_at = now;
                UpsertResult {
                    key,
                    inserted: false,
                }
            }
            None => {
                debug!(key = %key, entity_type = %entity.entity_type, "registering entity");
                self.entities.insert(
                    key.clone(),
                    EntityRecord {
                        entity,
                        created_at: now,
                        updated_at: now,
                    },
                );
                UpsertResult {
                    key,
                    inserted: true,
                }
            }
        }
    }

    pub fn get(&self, key: &EntityKey) -> Option<&LineageEntity> {
        self.entities.get(key).map(|r| &r.entity)
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    /// Used only by the pruning routine.
    pub fn remove(&mut self, key: &EntityKey) -> Option<LineageEntity> {
        self.entities.remove(key).map(|r| r.entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.entities.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LineageEntity> {
        self.entities.values().map(|r| &r.entity)
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}
