//! Read-only queries over the registries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityType, UnifiedEntity};
use crate::registry::Registry;
use crate::relationship::DataRelationship;

/// Case-insensitive substring search over names and string attributes.
///
/// Results are ranked by (name matched, number of matching attributes),
/// descending; ties keep registry order.
#[must_use]
pub fn search<'a>(
    registry: &'a Registry,
    query: &str,
    types: Option<&[EntityType]>,
) -> Vec<&'a UnifiedEntity> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<(bool, usize, &UnifiedEntity)> = registry
        .entities
        .iter()
        .filter(|e| types.map_or(true, |t| t.contains(&e.entity_type)))
        .filter_map(|e| {
            let name_match = e.canonical_name.to_lowercase().contains(&needle);
            let attr_hits = e
                .attributes
                .values()
                .filter_map(|v| v.as_str())
                .filter(|s| s.to_lowercase().contains(&needle))
                .count();
            (name_match || attr_hits > 0).then_some((name_match, attr_hits, e))
        })
        .collect();

    hits.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
    hits.into_iter().map(|(_, _, e)| e).collect()
}

/// Edges touching `entity_id`, optionally restricted to one type.
#[must_use]
pub fn relationships_for<'a>(
    registry: &'a Registry,
    entity_id: EntityId,
    relationship_type: Option<&str>,
) -> Vec<&'a DataRelationship> {
    registry
        .relationships
        .touching(entity_id)
        .filter(|r| relationship_type.map_or(true, |t| r.relationship_type == t))
        .collect()
}

/// Entities carrying a mapping for `platform`, optionally of one type.
#[must_use]
pub fn platform_entities<'a>(
    registry: &'a Registry,
    platform: &str,
    entity_type: Option<EntityType>,
) -> Vec<&'a UnifiedEntity> {
    registry
        .entities
        .iter()
        .filter(|e| e.has_platform(platform))
        .filter(|e| entity_type.map_or(true, |t| e.entity_type == t))
        .collect()
}

/// Kind of synthesized timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventKind {
    Created,
    PlatformLinked,
    RelationshipCreated,
}

/// One synthesized event in an entity's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub kind: TimelineEventKind,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_entity: Option<EntityId>,
}

/// Chronological pseudo-history of an entity.
///
/// Platform links are stamped with the entity's `updated_at` because the
/// actual link time is not recorded.
#[must_use]
pub fn timeline(registry: &Registry, entity_id: EntityId) -> Vec<TimelineEvent> {
    let Some(entity) = registry.entities.get(entity_id) else {
        return Vec::new();
    };

    let mut events = vec![TimelineEvent {
        kind: TimelineEventKind::Created,
        timestamp: entity.created_at,
        description: format!("{} '{}' created", entity.entity_type.label(), entity.canonical_name),
        platform: None,
        related_entity: None,
    }];

    events.extend(entity.platform_mappings.iter().map(|(platform, native_id)| TimelineEvent {
        kind: TimelineEventKind::PlatformLinked,
        timestamp: entity.updated_at,
        description: format!("Linked to {platform} record {native_id}"),
        platform: Some(platform.clone()),
        related_entity: None,
    }));

    events.extend(registry.relationships.touching(entity_id).map(|r| {
        let other = if r.source_entity_id == entity_id {
            r.target_entity_id
        } else {
            r.source_entity_id
        };
        TimelineEvent {
            kind: TimelineEventKind::RelationshipCreated,
            timestamp: r.created_at,
            description: format!("Relationship '{}' created", r.relationship_type),
            platform: None,
            related_entity: Some(other),
        }
    }));

    events.sort_by_key(|e| e.timestamp);
    events
}
