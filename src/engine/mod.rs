//! The unification engine.
//!
//! `UnificationEngine` owns the registries and wires the pipeline:
//! classify → canonicalize → resolve → infer relationships. Queries and
//! anomaly detection read the registries without mutating them.
//!
//! The engine has no internal locking. Mutating calls take `&mut self`;
//! share an engine across threads through [`EngineRuntime`].

pub mod runtime;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::anomaly::{self, DataAnomaly};
use crate::canonical::canonicalize;
use crate::classify::classify;
use crate::config::EngineConfig;
use crate::entity::{EntityId, EntityType, UnifiedEntity};
use crate::error::{UnifyResult, ValidationError};
use crate::query::{self, TimelineEvent};
use crate::record::{normalize_platform, RawRecord};
use crate::registry::Registry;
use crate::relationship::{resolve_relationships, DataRelationship};
use crate::resolver::{resolve, Resolution};

pub use runtime::{EngineRequest, EngineResponse, EngineRuntime, RequestHandle};

/// A record that could not be ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    /// Position of the record in the submitted batch.
    pub index: usize,
    pub reason: String,
}

/// Outcome of one ingestion batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// One entry per successfully ingested record, in batch order.
    pub entities: Vec<UnifiedEntity>,
    /// Records whose entity type could not be determined.
    pub unknown_records: usize,
    pub failures: Vec<RecordFailure>,
    /// Relationships created by this batch.
    pub relationships_created: usize,
}

/// Aggregate counts over the registries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnificationStats {
    pub entity_count: usize,
    pub relationship_count: usize,
    pub entities_by_type: BTreeMap<EntityType, usize>,
    pub relationships_by_type: BTreeMap<String, usize>,
    /// Entities observed on more than one platform.
    pub multi_platform_entities: usize,
}

/// Cross-platform entity unification engine.
///
/// # Examples
///
/// ```
/// use entity_unify::{RawRecord, UnificationEngine};
///
/// let mut engine = UnificationEngine::new();
/// let task = RawRecord::new()
///     .with("gid", "task_1")
///     .with("name", "Complete Q3 Report")
///     .with("due_date", "2024-12-31");
///
/// let entities = engine.ingest_platform_data("asana", &[task.clone()]);
/// assert_eq!(entities[0].canonical_name, "Complete Q3 Report");
///
/// engine.ingest_platform_data("asana", &[task]);
/// assert_eq!(engine.entity_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct UnificationEngine {
    config: EngineConfig,
    registry: Registry,
}

impl UnificationEngine {
    /// Creates an engine with default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with a validated configuration.
    ///
    /// # Errors
    /// Returns a validation error if `config` is out of range.
    pub fn with_config(config: EngineConfig) -> UnifyResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry: Registry::new(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Ingests a batch of records from one platform.
    ///
    /// Failed and unclassifiable records are logged and skipped; see
    /// [`Self::ingest_platform_data_with_report`] for the details.
    pub fn ingest_platform_data(&mut self, platform: &str, records: &[RawRecord]) -> Vec<UnifiedEntity> {
        self.ingest_platform_data_with_report(platform, records).entities
    }

    /// Ingests a batch and reports per-record outcomes.
    ///
    /// Relationship inference runs once, after every record of the batch
    /// has been resolved, so the returned entities include new edges.
    pub fn ingest_platform_data_with_report(
        &mut self,
        platform: &str,
        records: &[RawRecord],
    ) -> IngestReport {
        let platform = normalize_platform(platform);
        let mut report = IngestReport::default();
        let mut ingested: Vec<EntityId> = Vec::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            match self.ingest_record(&platform, record) {
                Ok(Some(resolution)) => ingested.push(resolution.entity_id()),
                Ok(None) => {
                    debug!(platform = %platform, index, "dropping record of unknown type");
                    report.unknown_records += 1;
                }
                Err(err) => {
                    warn!(platform = %platform, index, error = %err, "failed to ingest record, skipping");
                    report.failures.push(RecordFailure {
                        index,
                        reason: err.to_string(),
                    });
                }
            }
        }

        let created = resolve_relationships(
            &mut self.registry,
            &ingested,
            self.config.relationship_threshold,
        );
        report.relationships_created = created.len();
        report.entities = ingested
            .iter()
            .filter_map(|id| self.registry.entities.get(*id).cloned())
            .collect();

        info!(
            platform = %platform,
            records = records.len(),
            ingested = report.entities.len(),
            unknown = report.unknown_records,
            failed = report.failures.len(),
            relationships = report.relationships_created,
            "ingestion batch complete"
        );
        report
    }

    fn ingest_record(&mut self, platform: &str, record: &RawRecord) -> UnifyResult<Option<Resolution>> {
        if platform.is_empty() {
            return Err(ValidationError::EmptyPlatform.into());
        }
        record.validate()?;

        let Some(entity_type) = classify(platform, record) else {
            return Ok(None);
        };
        let candidate = canonicalize(entity_type, platform, record);
        resolve(
            &mut self.registry.entities,
            platform,
            candidate,
            self.config.match_threshold,
        )
        .map(Some)
    }

    /// Re-evaluates every anomaly rule over the current registries.
    #[must_use]
    pub fn detect_anomalies(&self) -> Vec<DataAnomaly> {
        let found = anomaly::detect_anomalies(&self.registry, &self.config);
        info!(count = found.len(), "anomaly detection complete");
        found
    }

    /// Substring search over names and string attributes.
    #[must_use]
    pub fn search_unified_entities(&self, query: &str, types: Option<&[EntityType]>) -> Vec<&UnifiedEntity> {
        query::search(&self.registry, query, types)
    }

    /// Relationships where the entity is source or target.
    #[must_use]
    pub fn get_entity_relationships(
        &self,
        entity_id: EntityId,
        relationship_type: Option<&str>,
    ) -> Vec<&DataRelationship> {
        query::relationships_for(&self.registry, entity_id, relationship_type)
    }

    /// Entities that carry a mapping for `platform`.
    #[must_use]
    pub fn get_platform_entities(&self, platform: &str, entity_type: Option<EntityType>) -> Vec<&UnifiedEntity> {
        query::platform_entities(&self.registry, &normalize_platform(platform), entity_type)
    }

    /// Synthesized, chronological history of an entity.
    #[must_use]
    pub fn get_entity_timeline(&self, entity_id: EntityId) -> Vec<TimelineEvent> {
        query::timeline(&self.registry, entity_id)
    }

    #[must_use]
    pub fn get_entity(&self, entity_id: EntityId) -> Option<&UnifiedEntity> {
        self.registry.entities.get(entity_id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &UnifiedEntity> {
        self.registry.entities.iter()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &DataRelationship> {
        self.registry.relationships.iter()
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.registry.entities.len()
    }

    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.registry.relationships.len()
    }

    #[must_use]
    pub fn stats(&self) -> UnificationStats {
        let mut stats = UnificationStats {
            entity_count: self.entity_count(),
            relationship_count: self.relationship_count(),
            ..UnificationStats::default()
        };
        for entity in self.registry.entities.iter() {
            *stats.entities_by_type.entry(entity.entity_type).or_default() += 1;
            if entity.source_platforms.len() > 1 {
                stats.multi_platform_entities += 1;
            }
        }
        for rel in self.registry.relationships.iter() {
            *stats
                .relationships_by_type
                .entry(rel.relationship_type.clone())
                .or_default() += 1;
        }
        stats
    }
}
