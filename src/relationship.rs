//! Relationship types and inference.
//!
//! Edges are inferred from reference attributes (a contact's `company`, a
//! task's `project`, ...) by comparing the attribute value against the
//! canonical names of candidate entities. Every candidate above the
//! threshold gets an edge, not only the best one.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::entity::{EntityId, EntityType};
use crate::registry::Registry;
use crate::similarity::name_similarity;

/// Namespace for name-based relationship IDs.
const RELATIONSHIP_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_4b9e_2d7a_4f03_9a51_0e8c_3b72_d4a6);

/// Deterministic relationship identifier.
///
/// Derived from `(source, target, type)`, so creating the same edge twice
/// yields the same ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipId(Uuid);

impl RelationshipId {
    #[must_use]
    pub fn derive(source: EntityId, target: EntityId, relationship_type: &str) -> Self {
        let key = format!("{source}:{target}:{relationship_type}");
        Self(Uuid::new_v5(&RELATIONSHIP_NAMESPACE, key.as_bytes()))
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed, typed, weighted edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRelationship {
    pub relationship_id: RelationshipId,
    pub source_entity_id: EntityId,
    pub target_entity_id: EntityId,
    pub relationship_type: String,
    pub strength: f64,
    pub evidence: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl DataRelationship {
    #[must_use]
    pub fn new(
        source: EntityId,
        target: EntityId,
        relationship_type: impl Into<String>,
        strength: f64,
        evidence: Vec<String>,
    ) -> Self {
        let relationship_type = relationship_type.into();
        Self {
            relationship_id: RelationshipId::derive(source, target, &relationship_type),
            source_entity_id: source,
            target_entity_id: target,
            relationship_type,
            strength: strength.clamp(0.0, 1.0),
            evidence,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn involves(&self, id: EntityId) -> bool {
        self.source_entity_id == id || self.target_entity_id == id
    }
}

/// One reference-attribute scan.
#[derive(Debug, Clone, Copy)]
struct ReferenceRule {
    attribute: &'static str,
    target_type: EntityType,
    relationship_type: &'static str,
    strength: f64,
}

const CONTACT_RULES: &[ReferenceRule] = &[ReferenceRule {
    attribute: "company",
    target_type: EntityType::Company,
    relationship_type: "works_at",
    strength: 0.8,
}];

const TASK_RULES: &[ReferenceRule] = &[ReferenceRule {
    attribute: "project",
    target_type: EntityType::Project,
    relationship_type: "belongs_to",
    strength: 0.8,
}];

const FILE_RULES: &[ReferenceRule] = &[ReferenceRule {
    attribute: "project",
    target_type: EntityType::Project,
    relationship_type: "stored_in",
    strength: 0.7,
}];

const DEAL_RULES: &[ReferenceRule] = &[
    ReferenceRule {
        attribute: "contact",
        target_type: EntityType::Contact,
        relationship_type: "owned_by",
        strength: 0.8,
    },
    ReferenceRule {
        attribute: "task",
        target_type: EntityType::Task,
        relationship_type: "has_task",
        strength: 0.7,
    },
];

const fn rules_for(entity_type: EntityType) -> &'static [ReferenceRule] {
    match entity_type {
        EntityType::Contact => CONTACT_RULES,
        EntityType::Task => TASK_RULES,
        EntityType::File => FILE_RULES,
        EntityType::Deal => DEAL_RULES,
        EntityType::Company
        | EntityType::Project
        | EntityType::Message
        | EntityType::Campaign
        | EntityType::Event
        | EntityType::User => &[],
    }
}

/// Infers edges for the given entities and records them in `registry`.
///
/// Returns the edges that were newly created. Re-running over the same
/// entities is a no-op.
pub fn resolve_relationships(
    registry: &mut Registry,
    entity_ids: &[EntityId],
    threshold: f64,
) -> Vec<DataRelationship> {
    let mut created = Vec::new();
    let mut seen = HashSet::new();

    for &source_id in entity_ids {
        if !seen.insert(source_id) {
            continue;
        }
        let Some(source) = registry.entities.get(source_id) else {
            continue;
        };

        let mut edges = Vec::new();
        for rule in rules_for(source.entity_type) {
            let Some(reference) = source.attribute_str(rule.attribute) else {
                continue;
            };
            for candidate in registry.entities.of_type(rule.target_type) {
                if candidate.entity_id == source_id {
                    continue;
                }
                let score = name_similarity(reference, &candidate.canonical_name);
                if score > threshold {
                    let evidence = vec![
                        format!(
                            "{} attribute '{reference}' matches {} '{}'",
                            rule.attribute, rule.target_type, candidate.canonical_name
                        ),
                        format!("name similarity {score:.2}"),
                    ];
                    edges.push(DataRelationship::new(
                        source_id,
                        candidate.entity_id,
                        rule.relationship_type,
                        rule.strength,
                        evidence,
                    ));
                }
            }
        }

        for edge in edges {
            if let Some(source) = registry.entities.get_mut(source_id) {
                source.link(&edge.relationship_type, edge.target_entity_id);
            }
            if registry.relationships.insert(edge.clone()) {
                debug!(
                    relationship_type = %edge.relationship_type,
                    source = %edge.source_entity_id,
                    target = %edge.target_entity_id,
                    "created relationship"
                );
                created.push(edge);
            }
        }
    }

    created
}
