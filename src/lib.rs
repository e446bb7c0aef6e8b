//! # entity-unify - Cross-platform entity unification
//!
//! Records pulled from SaaS platforms (CRMs, task trackers, chat, file
//! storage) describe the same real-world things under different shapes and
//! identifiers. This crate folds them into one graph of unified entities,
//! infers relationships between them, and runs anomaly rules over the result.
//!
//! ## Pipeline
//!
//! - **Classify**: decide the [`EntityType`] of a raw record from its fields
//! - **Canonicalize**: extract name, platform ID and normalized attributes
//! - **Resolve**: merge into an existing entity or register a new one
//! - **Relate**: link entities whose attributes reference each other by name
//! - **Detect**: evaluate the anomaly rules over the registries
//!
//! ## Usage
//!
//! ```rust
//! use entity_unify::{EntityType, RawRecord, UnificationEngine};
//!
//! let mut engine = UnificationEngine::new();
//! engine.ingest_platform_data(
//!     "hubspot",
//!     &[RawRecord::new().with("id", "co1").with("name", "Acme Inc").with("domain", "acme.com")],
//! );
//! let contacts = engine.ingest_platform_data(
//!     "salesforce",
//!     &[RawRecord::new()
//!         .with("Id", "003A")
//!         .with("Name", "John Doe")
//!         .with("Email", "john@example.com")
//!         .with("Company", "Acme Inc")],
//! );
//!
//! assert_eq!(contacts[0].entity_type, EntityType::Contact);
//! let edges = engine.get_entity_relationships(contacts[0].entity_id, Some("works_at"));
//! assert_eq!(edges.len(), 1);
//! assert!(entity_unify::similarity::name_similarity("Acme", "Acme Inc") >= 0.8);
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

// Core types
pub mod config;
pub mod entity;
pub mod error;
pub mod record;
pub mod value;

// Pipeline stages
pub mod canonical;
pub mod classify;
pub mod relationship;
pub mod resolver;
pub mod similarity;

// Storage, rules and queries
pub mod anomaly;
pub mod query;
pub mod registry;

pub mod engine;

// Re-export primary types at crate root for convenience
pub use anomaly::{AnomalyRule, DataAnomaly, Severity};
pub use config::{EngineConfig, RuntimeConfig};
pub use engine::{
    EngineRequest, EngineResponse, EngineRuntime, IngestReport, RecordFailure, RequestHandle,
    UnificationEngine, UnificationStats,
};
pub use entity::{EntityId, EntityType, UnifiedEntity};
pub use error::{ExecutionError, UnifyError, UnifyResult, ValidationError};
pub use query::{TimelineEvent, TimelineEventKind};
pub use record::RawRecord;
pub use registry::Registry;
pub use relationship::{DataRelationship, RelationshipId};
pub use resolver::Resolution;
pub use value::Value;
