//! Entity resolution: merge into an existing entity or create a new one.
//!
//! A record that was already seen with the same platform-native ID, as the
//! same entity type, is merged into that entity directly. Otherwise every registered entity of the same
//! type is scanned in insertion order and the *first* one whose overall
//! similarity exceeds the threshold absorbs the record. This is greedy
//! first-match, not best-match: a later, closer entity is never considered
//! once an earlier one qualifies.
//!
//! The scan is O(entities of the same type) per record.

use tracing::debug;

use crate::canonical::CanonicalRecord;
use crate::entity::{EntityId, UnifiedEntity};
use crate::error::UnifyResult;
use crate::registry::EntityRegistry;
use crate::similarity::overall_similarity;

/// How a record was resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// A new entity was registered.
    Created(EntityId),
    /// The record carried a platform ID already mapped to this entity.
    MergedByPlatformId(EntityId),
    /// The record was similar enough to this entity.
    MergedBySimilarity { entity_id: EntityId, score: f64 },
}

impl Resolution {
    #[must_use]
    pub const fn entity_id(&self) -> EntityId {
        match self {
            Self::Created(id) | Self::MergedByPlatformId(id) => *id,
            Self::MergedBySimilarity { entity_id, .. } => *entity_id,
        }
    }

    #[must_use]
    pub const fn is_merge(&self) -> bool {
        !matches!(self, Self::Created(_))
    }
}

/// First registered entity of the same type scoring above `threshold`.
#[must_use]
pub fn find_match(
    registry: &EntityRegistry,
    candidate: &CanonicalRecord,
    threshold: f64,
) -> Option<(EntityId, f64)> {
    registry.of_type(candidate.entity_type).find_map(|existing| {
        let score = overall_similarity(
            &candidate.canonical_name,
            &candidate.attributes,
            &existing.canonical_name,
            &existing.attributes,
        );
        (score > threshold).then_some((existing.entity_id, score))
    })
}

/// Resolves `candidate` against the registry, mutating it.
///
/// # Errors
/// Propagates registry errors; the caller treats them as a per-record failure.
pub fn resolve(
    registry: &mut EntityRegistry,
    platform: &str,
    candidate: CanonicalRecord,
    threshold: f64,
) -> UnifyResult<Resolution> {
    let known = (!candidate.platform_id_generated)
        .then(|| registry.find_by_platform_id(candidate.entity_type, platform, &candidate.platform_id))
        .flatten()
        .map(|e| e.entity_id);

    let resolution = if let Some(id) = known {
        Resolution::MergedByPlatformId(id)
    } else if let Some((entity_id, score)) = find_match(registry, &candidate, threshold) {
        Resolution::MergedBySimilarity { entity_id, score }
    } else {
        let entity = UnifiedEntity::new(
            candidate.entity_type,
            candidate.canonical_name,
            platform,
            candidate.platform_id,
            candidate.attributes,
        );
        let id = registry.insert(entity)?;
        debug!(entity_id = %id, platform, "created entity");
        return Ok(Resolution::Created(id));
    };

    let id = resolution.entity_id();
    registry.merge_observation(id, platform, &candidate.platform_id, candidate.attributes)?;
    debug!(entity_id = %id, platform, ?resolution, "merged record into entity");
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::entity::EntityType;
    use crate::value::Value;

    fn candidate(name: &str, platform_id: &str, attrs: &[(&str, &str)]) -> CanonicalRecord {
        CanonicalRecord {
            entity_type: EntityType::Contact,
            canonical_name: name.to_string(),
            platform_id: platform_id.to_string(),
            platform_id_generated: false,
            attributes: attrs
                .iter()
                .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_creates_when_registry_empty() {
        let mut registry = EntityRegistry::new();
        let res = resolve(&mut registry, "hubspot", candidate("Jane", "1", &[]), 0.7).unwrap();
        assert!(matches!(res, Resolution::Created(_)));
        assert!(!res.is_merge());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_merges_on_similarity() {
        let mut registry = EntityRegistry::new();
        let email = [("email", "john@example.com")];
        let first = resolve(&mut registry, "salesforce", candidate("John Doe", "c1", &email), 0.7)
            .unwrap()
            .entity_id();
        let second = resolve(&mut registry, "hubspot", candidate("John Doe", "c1b", &email), 0.7).unwrap();

        assert!(matches!(second, Resolution::MergedBySimilarity { score, .. } if score == 1.0));
        assert_eq!(second.entity_id(), first);
        let entity = registry.get(first).unwrap();
        assert_eq!(entity.platform_mappings.len(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_merges_on_platform_id_even_when_renamed() {
        let mut registry = EntityRegistry::new();
        let id = resolve(&mut registry, "asana", candidate("Draft", "t1", &[]), 0.7)
            .unwrap()
            .entity_id();
        let res = resolve(&mut registry, "asana", candidate("Totally different", "t1", &[]), 0.7).unwrap();
        assert_eq!(res, Resolution::MergedByPlatformId(id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_shared_platform_id_across_types_stays_separate() {
        let mut registry = EntityRegistry::new();
        let person = resolve(
            &mut registry,
            "hubspot",
            candidate("Jane Roe", "101", &[("email", "jane@globex.com")]),
            0.7,
        )
        .unwrap()
        .entity_id();

        let mut company = candidate("Globex", "101", &[("domain", "globex.com")]);
        company.entity_type = EntityType::Company;
        let res = resolve(&mut registry, "hubspot", company, 0.7).unwrap();

        assert!(matches!(res, Resolution::Created(_)));
        assert_ne!(res.entity_id(), person);
        assert_eq!(registry.len(), 2);
        let jane = registry.get(person).unwrap();
        assert_eq!(jane.entity_type, EntityType::Contact);
        assert!(!jane.attributes.contains_key("domain"));
    }

    #[test]
    fn test_different_types_never_merge() {
        let mut registry = EntityRegistry::new();
        resolve(&mut registry, "x", candidate("Acme", "1", &[]), 0.7).unwrap();
        let mut company = candidate("Acme", "2", &[]);
        company.entity_type = EntityType::Company;
        assert!(matches!(
            resolve(&mut registry, "x", company, 0.7).unwrap(),
            Resolution::Created(_)
        ));
    }

    #[test]
    fn test_first_match_wins_over_better_match() {
        let mut registry = EntityRegistry::new();
        let team = || BTreeMap::from([("team".to_string(), Value::from("core"))]);
        let earlier = registry
            .insert(UnifiedEntity::new(EntityType::Contact, "Alex Smith Jr", "x", "1", team()))
            .unwrap();
        let exact = registry
            .insert(UnifiedEntity::new(EntityType::Contact, "Alex Smith", "x", "2", team()))
            .unwrap();

        // "Alex Smith Jr" scores 0.9, "Alex Smith" scores 1.0; the earlier one wins.
        let res = resolve(&mut registry, "z", candidate("Alex Smith", "3", &[("team", "core")]), 0.7).unwrap();
        assert_eq!(res.entity_id(), earlier);
        assert_ne!(res.entity_id(), exact);
    }
}
