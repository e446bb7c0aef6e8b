//! Unified entity types and identity management.
//!
//! A `UnifiedEntity` is the deduplicated view of one real-world thing that
//! may have been observed on several platforms. Its `EntityId` is assigned at
//! creation and never reused.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::Value;

/// Globally unique, stable entity identifier.
///
/// # Examples
///
/// ```
/// use entity_unify::EntityId;
///
/// let id = EntityId::new();
/// assert!(!id.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Creates a new random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entity ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Closed set of entity kinds the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Contact,
    Company,
    Task,
    Project,
    File,
    Message,
    Deal,
    Campaign,
    Event,
    User,
}

impl EntityType {
    /// All entity types, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Contact,
        Self::Company,
        Self::Task,
        Self::Project,
        Self::File,
        Self::Message,
        Self::Deal,
        Self::Campaign,
        Self::Event,
        Self::User,
    ];

    /// Lowercase identifier used in logs and serialized output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Company => "company",
            Self::Task => "task",
            Self::Project => "project",
            Self::File => "file",
            Self::Message => "message",
            Self::Deal => "deal",
            Self::Campaign => "campaign",
            Self::Event => "event",
            Self::User => "user",
        }
    }

    /// Display label used for placeholder names.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Contact => "Contact",
            Self::Company => "Company",
            Self::Task => "Task",
            Self::Project => "Project",
            Self::File => "File",
            Self::Message => "Message",
            Self::Deal => "Deal",
            Self::Campaign => "Campaign",
            Self::Event => "Event",
            Self::User => "User",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unknown entity type: {value}"))
    }
}

/// The canonical, cross-platform representation of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedEntity {
    pub entity_id: EntityId,
    pub entity_type: EntityType,

    /// Never empty; falls back to `"Unnamed <type>"`.
    pub canonical_name: String,

    /// Platform identifier to platform-native record ID.
    pub platform_mappings: BTreeMap<String, String>,

    pub attributes: BTreeMap<String, Value>,

    /// Outgoing adjacency cache, keyed by relationship type.
    #[serde(default)]
    pub relationships: BTreeMap<String, Vec<EntityId>>,

    pub source_platforms: BTreeSet<String>,
    pub confidence_score: f64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UnifiedEntity {
    /// Creates an entity first observed on `platform`.
    #[must_use]
    pub fn new(
        entity_type: EntityType,
        canonical_name: impl Into<String>,
        platform: impl Into<String>,
        platform_id: impl Into<String>,
        attributes: BTreeMap<String, Value>,
    ) -> Self {
        let platform = platform.into();
        let mut name: String = canonical_name.into();
        if name.trim().is_empty() {
            name = placeholder_name(entity_type);
        }
        let now = Utc::now();
        Self {
            entity_id: EntityId::new(),
            entity_type,
            canonical_name: name,
            platform_mappings: BTreeMap::from([(platform.clone(), platform_id.into())]),
            attributes,
            relationships: BTreeMap::new(),
            source_platforms: BTreeSet::from([platform]),
            confidence_score: 1.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Folds another platform's observation into this entity.
    ///
    /// Prior platform mappings are kept; attribute keys present in `attributes`
    /// are overwritten (last writer wins).
    pub fn merge_observation(
        &mut self,
        platform: &str,
        platform_id: &str,
        attributes: BTreeMap<String, Value>,
    ) {
        self.platform_mappings
            .insert(platform.to_string(), platform_id.to_string());
        self.source_platforms.insert(platform.to_string());
        self.attributes.extend(attributes);
        self.updated_at = Utc::now();
    }

    /// Appends `target` to the adjacency cache. Returns false if already present.
    pub fn link(&mut self, relationship_type: &str, target: EntityId) -> bool {
        let targets = self
            .relationships
            .entry(relationship_type.to_string())
            .or_default();
        if targets.contains(&target) {
            return false;
        }
        targets.push(target);
        true
    }

    #[must_use]
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_non_empty_str)
    }

    #[must_use]
    pub fn has_platform(&self, platform: &str) -> bool {
        self.platform_mappings.contains_key(platform)
    }
}

/// Placeholder name for records that carry no usable label.
#[must_use]
pub fn placeholder_name(entity_type: EntityType) -> String {
    format!("Unnamed {}", entity_type.label())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_creation() {
        let id1 = EntityId::new();
        let id2 = EntityId::new();
        assert_ne!(id1, id2);
        assert!(!id1.is_nil());
    }

    #[test]
    fn test_entity_type_round_trip() {
        for t in EntityType::ALL {
            assert_eq!(t.as_str().parse::<EntityType>().unwrap(), t);
        }
        assert_eq!("  DEAL ".parse::<EntityType>().unwrap(), EntityType::Deal);
        assert!("widget".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_new_entity_defaults() {
        let entity = UnifiedEntity::new(EntityType::Task, "Ship it", "asana", "t1", BTreeMap::new());
        assert_eq!(entity.confidence_score, 1.0);
        assert_eq!(entity.platform_mappings.get("asana").map(String::as_str), Some("t1"));
        assert!(entity.source_platforms.contains("asana"));
        assert_eq!(entity.created_at, entity.updated_at);
    }

    #[test]
    fn test_blank_name_gets_placeholder() {
        let entity = UnifiedEntity::new(EntityType::File, "  ", "google_drive", "f1", BTreeMap::new());
        assert_eq!(entity.canonical_name, "Unnamed File");
    }

    #[test]
    fn test_merge_keeps_prior_mappings() {
        let mut entity = UnifiedEntity::new(
            EntityType::Contact,
            "John Doe",
            "salesforce",
            "c1",
            BTreeMap::from([("email".to_string(), Value::from("a@x.com"))]),
        );
        entity.merge_observation(
            "hubspot",
            "c1b",
            BTreeMap::from([("email".to_string(), Value::from("b@x.com"))]),
        );
        assert!(entity.has_platform("salesforce"));
        assert!(entity.has_platform("hubspot"));
        assert_eq!(entity.source_platforms.len(), 2);
        assert_eq!(entity.attribute_str("email"), Some("b@x.com"));
        assert!(entity.updated_at >= entity.created_at);
    }

    #[test]
    fn test_link_is_deduplicated() {
        let mut entity = UnifiedEntity::new(EntityType::Contact, "Jane", "hubspot", "1", BTreeMap::new());
        let target = EntityId::new();
        assert!(entity.link("works_at", target));
        assert!(!entity.link("works_at", target));
        assert_eq!(entity.relationships["works_at"], vec![target]);
    }
}
