//! In-memory entity and relationship registries.
//!
//! `Registry` owns both collections and is the single seam through which the
//! resolvers mutate state. It performs no locking: callers that share an
//! engine across threads must serialize access (see [`crate::EngineRuntime`]).
//!
//! Iteration order is insertion order, which keeps first-match resolution
//! deterministic for a given ingestion sequence.

use std::collections::{BTreeMap, HashMap};

use crate::entity::{EntityId, EntityType, UnifiedEntity};
use crate::error::{ExecutionError, UnifyError, UnifyResult};
use crate::relationship::{DataRelationship, RelationshipId};
use crate::value::Value;

type PlatformKey = (EntityType, String, String);

fn platform_key(entity_type: EntityType, platform: &str, platform_id: &str) -> PlatformKey {
    (entity_type, platform.to_string(), platform_id.to_string())
}

fn index_err(message: String) -> UnifyError {
    UnifyError::Execution(ExecutionError::Index { message })
}

/// Authoritative collection of unified entities.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: Vec<UnifiedEntity>,
    by_id: HashMap<EntityId, usize>,
    /// Keyed by type as well: platforms number each object type separately.
    by_platform_id: HashMap<PlatformKey, EntityId>,
}

impl EntityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new entity and indexes its platform mappings.
    ///
    /// # Errors
    /// Returns an index error if the entity ID is already registered.
    pub fn insert(&mut self, entity: UnifiedEntity) -> UnifyResult<EntityId> {
        let id = entity.entity_id;
        if self.by_id.contains_key(&id) {
            return Err(index_err(format!("duplicate entity id {id}")));
        }
        for (platform, platform_id) in &entity.platform_mappings {
            self.by_platform_id
                .insert(platform_key(entity.entity_type, platform, platform_id), id);
        }
        self.by_id.insert(id, self.entities.len());
        self.entities.push(entity);
        Ok(id)
    }

    /// Merges one platform observation into an existing entity.
    ///
    /// # Errors
    /// Returns `EntityNotFound` if `id` is not registered.
    pub fn merge_observation(
        &mut self,
        id: EntityId,
        platform: &str,
        platform_id: &str,
        attributes: BTreeMap<String, Value>,
    ) -> UnifyResult<&UnifiedEntity> {
        let slot = *self
            .by_id
            .get(&id)
            .ok_or(ExecutionError::EntityNotFound { id })?;
        let entity = self
            .entities
            .get_mut(slot)
            .ok_or_else(|| index_err(format!("slot {slot} missing for {id}")))?;

        if let Some(previous) = entity.platform_mappings.get(platform) {
            if previous != platform_id {
                self.by_platform_id
                    .remove(&platform_key(entity.entity_type, platform, previous));
            }
        }
        entity.merge_observation(platform, platform_id, attributes);
        self.by_platform_id
            .insert(platform_key(entity.entity_type, platform, platform_id), id);
        Ok(entity)
    }

    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&UnifiedEntity> {
        self.by_id.get(&id).and_then(|&slot| self.entities.get(slot))
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut UnifiedEntity> {
        let slot = *self.by_id.get(&id)?;
        self.entities.get_mut(slot)
    }

    /// Entity of `entity_type` previously seen with this exact platform-native ID.
    #[must_use]
    pub fn find_by_platform_id(
        &self,
        entity_type: EntityType,
        platform: &str,
        platform_id: &str,
    ) -> Option<&UnifiedEntity> {
        self.by_platform_id
            .get(&platform_key(entity_type, platform, platform_id))
            .and_then(|&id| self.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnifiedEntity> {
        self.entities.iter()
    }

    pub fn of_type(&self, entity_type: EntityType) -> impl Iterator<Item = &UnifiedEntity> {
        self.entities
            .iter()
            .filter(move |e| e.entity_type == entity_type)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Deduplicated store of directed, typed, weighted edges.
#[derive(Debug, Default)]
pub struct RelationshipRegistry {
    relationships: Vec<DataRelationship>,
    by_id: HashMap<RelationshipId, usize>,
}

impl RelationshipRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `relationship` unless one with the same ID exists.
    ///
    /// Returns true when the edge was new.
    pub fn insert(&mut self, relationship: DataRelationship) -> bool {
        if self.by_id.contains_key(&relationship.relationship_id) {
            return false;
        }
        self.by_id
            .insert(relationship.relationship_id, self.relationships.len());
        self.relationships.push(relationship);
        true
    }

    #[must_use]
    pub fn contains(&self, id: RelationshipId) -> bool {
        self.by_id.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: RelationshipId) -> Option<&DataRelationship> {
        self.by_id.get(&id).and_then(|&slot| self.relationships.get(slot))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataRelationship> {
        self.relationships.iter()
    }

    /// Edges where `id` is either endpoint.
    pub fn touching(&self, id: EntityId) -> impl Iterator<Item = &DataRelationship> {
        self.relationships.iter().filter(move |r| r.involves(id))
    }

    /// Edges leaving `id`.
    pub fn outgoing(&self, id: EntityId) -> impl Iterator<Item = &DataRelationship> {
        self.relationships
            .iter()
            .filter(move |r| r.source_entity_id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }
}

/// Both registries of one engine instance.
#[derive(Debug, Default)]
pub struct Registry {
    pub entities: EntityRegistry,
    pub relationships: RelationshipRegistry,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
