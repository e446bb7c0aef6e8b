//! Rule-based anomaly detection over the unified graph.
//!
//! Rules are stateless and re-evaluate the full registries on every call.
//! Their findings are concatenated without cross-rule deduplication.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::EngineConfig;
use crate::entity::{EntityId, EntityType, UnifiedEntity};
use crate::registry::Registry;
use crate::value::Value;

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// The built-in anomaly rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyRule {
    /// A large deal depends on a blocked or high-priority task.
    DealRisk,
    /// An urgent task or message is still active.
    ///
    /// Only priority and status are checked; no elapsed-time threshold is
    /// applied even though the finding is worded as a 24h breach.
    SlaBreach,
    /// A project has no relationships at all.
    ProjectInertia,
}

impl AnomalyRule {
    pub const ALL: [Self; 3] = [Self::DealRisk, Self::SlaBreach, Self::ProjectInertia];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DealRisk => "deal_risk",
            Self::SlaBreach => "sla_breach",
            Self::ProjectInertia => "project_inertia",
        }
    }

    /// Runs this rule against the registries.
    #[must_use]
    pub fn evaluate(self, registry: &Registry, config: &EngineConfig) -> Vec<DataAnomaly> {
        match self {
            Self::DealRisk => deal_risk(registry, config),
            Self::SlaBreach => sla_breach(registry),
            Self::ProjectInertia => project_inertia(registry),
        }
    }
}

impl fmt::Display for AnomalyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule-derived finding about the unified graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataAnomaly {
    pub anomaly_id: String,
    pub rule: AnomalyRule,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub recommendation: String,
    pub affected_entities: Vec<EntityId>,
    pub platforms: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl DataAnomaly {
    fn new(
        rule: AnomalyRule,
        severity: Severity,
        affected: &[&UnifiedEntity],
        title: String,
        description: String,
        recommendation: &str,
    ) -> Self {
        let affected_entities: Vec<EntityId> = affected.iter().map(|e| e.entity_id).collect();
        let platforms: BTreeSet<&String> = affected
            .iter()
            .flat_map(|e| e.source_platforms.iter())
            .collect();
        Self {
            anomaly_id: anomaly_id(rule, &affected_entities),
            rule,
            severity,
            title,
            description,
            recommendation: recommendation.to_string(),
            affected_entities,
            platforms: platforms.into_iter().cloned().collect(),
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// `<rule>_<16 hex chars of blake3(rule, entity ids)>`.
#[must_use]
pub fn anomaly_id(rule: AnomalyRule, entities: &[EntityId]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(rule.as_str().as_bytes());
    for id in entities {
        hasher.update(b":");
        hasher.update(id.as_uuid().as_bytes());
    }
    let hex = hasher.finalize().to_hex();
    format!("{}_{}", rule.as_str(), &hex.as_str()[..16])
}

/// Runs every rule and concatenates their findings.
#[must_use]
pub fn detect_anomalies(registry: &Registry, config: &EngineConfig) -> Vec<DataAnomaly> {
    AnomalyRule::ALL
        .into_iter()
        .flat_map(|rule| rule.evaluate(registry, config))
        .collect()
}

fn value_json(value: Option<&Value>) -> serde_json::Value {
    value
        .and_then(|v| serde_json::to_value(v).ok())
        .unwrap_or(serde_json::Value::Null)
}

fn deal_risk(registry: &Registry, config: &EngineConfig) -> Vec<DataAnomaly> {
    let mut found = Vec::new();
    for deal in registry.entities.of_type(EntityType::Deal) {
        let Some(amount) = deal.attributes.get("amount").and_then(Value::as_float) else {
            continue;
        };
        if amount < config.deal_risk_amount {
            continue;
        }

        for edge in registry.relationships.outgoing(deal.entity_id) {
            let Some(task) = registry.entities.get(edge.target_entity_id) else {
                continue;
            };
            if task.entity_type != EntityType::Task {
                continue;
            }
            let status = task.attribute_str("status");
            let priority = task.attribute_str("priority");
            let blocked = matches!(status, Some("blocked" | "stuck"));
            if !blocked && priority != Some("high") {
                continue;
            }

            let reason = if blocked { "is blocked" } else { "is high priority" };
            found.push(
                DataAnomaly::new(
                    AnomalyRule::DealRisk,
                    Severity::Critical,
                    &[deal, task],
                    format!("Deal at risk: {}", deal.canonical_name),
                    format!(
                        "Deal '{}' worth {amount} depends on task '{}' which {reason}",
                        deal.canonical_name, task.canonical_name
                    ),
                    "Escalate the blocking task or reassign it before the deal stalls",
                )
                .with_meta("amount", amount)
                .with_meta("task_status", value_json(task.attributes.get("status")))
                .with_meta("task_priority", value_json(task.attributes.get("priority")))
                .with_meta("relationship_type", edge.relationship_type.clone()),
            );
        }
    }
    found
}

fn sla_breach(registry: &Registry) -> Vec<DataAnomaly> {
    let now = Utc::now();
    let mut found = Vec::new();
    for entity in registry
        .entities
        .iter()
        .filter(|e| matches!(e.entity_type, EntityType::Task | EntityType::Message))
    {
        let priority = entity.attribute_str("priority");
        if !matches!(priority, Some("high" | "critical")) || entity.attribute_str("status") != Some("active") {
            continue;
        }

        let updated = match entity.attributes.get("updated_at") {
            None | Some(Value::Null) => None,
            Some(raw) => match parse_timestamp(raw) {
                Some(ts) => Some(ts),
                None => {
                    warn!(entity_id = %entity.entity_id, value = %raw, "unparsable updated_at, skipping sla check");
                    continue;
                }
            },
        };

        let mut anomaly = DataAnomaly::new(
            AnomalyRule::SlaBreach,
            Severity::Warning,
            &[entity],
            format!("SLA breach risk: {}", entity.canonical_name),
            format!(
                "{} '{}' is {} priority and has been active for over 24 hours",
                entity.entity_type.label(),
                entity.canonical_name,
                priority.unwrap_or_default()
            ),
            "Follow up with the assignee and update the status",
        )
        .with_meta("priority", priority.unwrap_or_default())
        .with_meta("status", "active");
        if let Some(ts) = updated {
            anomaly = anomaly.with_meta("hours_since_update", (now - ts).num_hours());
        }
        found.push(anomaly);
    }
    found
}

fn project_inertia(registry: &Registry) -> Vec<DataAnomaly> {
    registry
        .entities
        .of_type(EntityType::Project)
        .filter(|p| registry.relationships.touching(p.entity_id).next().is_none())
        .map(|project| {
            DataAnomaly::new(
                AnomalyRule::ProjectInertia,
                Severity::Info,
                &[project],
                format!("Inactive project: {}", project.canonical_name),
                format!(
                    "Project '{}' has no related tasks, files or other entities",
                    project.canonical_name
                ),
                "Consider archiving the project or linking its work items",
            )
            .with_meta("project_name", project.canonical_name.clone())
        })
        .collect()
}

/// Parses RFC 3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS`,
/// `YYYY-MM-DD`, or unix seconds/milliseconds.
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Int(n) if *n > 1_000_000_000_000 => Utc.timestamp_millis_opt(*n).single(),
        Value::Int(n) => Utc.timestamp_opt(*n, 0).single(),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Some(ts.with_timezone(&Utc));
            }
            for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(naive.and_utc());
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::DataRelationship;

    fn add(registry: &mut Registry, entity_type: EntityType, name: &str, attrs: &[(&str, Value)]) -> EntityId {
        let attributes = attrs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        registry
            .entities
            .insert(UnifiedEntity::new(entity_type, name, "test", name, attributes))
            .unwrap()
    }

    fn link(registry: &mut Registry, source: EntityId, target: EntityId, kind: &str) {
        registry
            .relationships
            .insert(DataRelationship::new(source, target, kind, 0.7, vec![]));
    }

    #[test]
    fn test_deal_risk_fires_for_high_priority_task() {
        let mut registry = Registry::new();
        let deal = add(&mut registry, EntityType::Deal, "Enterprise", &[("amount", Value::Int(50_000))]);
        let task = add(
            &mut registry,
            EntityType::Task,
            "Security review",
            &[("priority", Value::from("high")), ("status", Value::from("active"))],
        );
        link(&mut registry, deal, task, "has_task");

        let found = deal_risk(&registry, &EngineConfig::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::Critical);
        assert_eq!(found[0].affected_entities, vec![deal, task]);
        assert_eq!(found[0].platforms, vec!["test".to_string()]);
    }

    #[test]
    fn test_deal_risk_ignores_small_deals_and_healthy_tasks() {
        let mut registry = Registry::new();
        let small = add(&mut registry, EntityType::Deal, "Small", &[("amount", Value::from("9999"))]);
        let big = add(&mut registry, EntityType::Deal, "Big", &[("amount", Value::Float(10_000.0))]);
        let blocked = add(&mut registry, EntityType::Task, "Blocked", &[("status", Value::from("blocked"))]);
        let fine = add(&mut registry, EntityType::Task, "Fine", &[("priority", Value::from("low"))]);
        link(&mut registry, small, blocked, "has_task");
        link(&mut registry, big, fine, "has_task");
        // Incoming edges are not inspected.
        link(&mut registry, blocked, big, "supports");
        assert!(deal_risk(&registry, &EngineConfig::default()).is_empty());

        link(&mut registry, big, blocked, "has_task");
        assert_eq!(deal_risk(&registry, &EngineConfig::default()).len(), 1);
    }

    #[test]
    fn test_deal_risk_ignores_non_finite_amounts() {
        let mut registry = Registry::new();
        let blocked = add(&mut registry, EntityType::Task, "Security review", &[("status", Value::from("blocked"))]);
        for raw in ["NaN", "inf", "-infinity"] {
            let deal = add(&mut registry, EntityType::Deal, raw, &[("amount", Value::from(raw))]);
            link(&mut registry, deal, blocked, "has_task");
        }
        let nan = add(&mut registry, EntityType::Deal, "Float NaN", &[("amount", Value::Float(f64::NAN))]);
        link(&mut registry, nan, blocked, "has_task");

        assert!(deal_risk(&registry, &EngineConfig::default()).is_empty());
    }

    #[test]
    fn test_sla_breach() {
        let mut registry = Registry::new();
        add(
            &mut registry,
            EntityType::Task,
            "Urgent",
            &[("priority", Value::from("high")), ("status", Value::from("active"))],
        );
        add(
            &mut registry,
            EntityType::Message,
            "Outage",
            &[
                ("priority", Value::from("critical")),
                ("status", Value::from("active")),
                ("updated_at", Value::from("2024-01-01")),
            ],
        );
        add(
            &mut registry,
            EntityType::Task,
            "Done",
            &[("priority", Value::from("high")), ("status", Value::from("completed"))],
        );
        add(
            &mut registry,
            EntityType::Deal,
            "Not a task",
            &[("priority", Value::from("high")), ("status", Value::from("active"))],
        );

        let found = sla_breach(&registry);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|a| a.severity == Severity::Warning));
        assert!(found[1].metadata.contains_key("hours_since_update"));
        assert!(!found[0].metadata.contains_key("hours_since_update"));
    }

    #[test]
    fn test_sla_breach_skips_unparsable_timestamp() {
        let mut registry = Registry::new();
        add(
            &mut registry,
            EntityType::Task,
            "Weird",
            &[
                ("priority", Value::from("high")),
                ("status", Value::from("active")),
                ("updated_at", Value::from("yesterday-ish")),
            ],
        );
        assert!(sla_breach(&registry).is_empty());
    }

    #[test]
    fn test_project_inertia() {
        let mut registry = Registry::new();
        let idle = add(&mut registry, EntityType::Project, "Idle", &[]);
        let busy = add(&mut registry, EntityType::Project, "Busy", &[]);
        let task = add(&mut registry, EntityType::Task, "Work", &[]);
        link(&mut registry, task, busy, "belongs_to");

        let found = project_inertia(&registry);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].affected_entities, vec![idle]);
        assert_eq!(found[0].severity, Severity::Info);
    }

    #[test]
    fn test_anomaly_id_is_deterministic() {
        let ids = [EntityId::new(), EntityId::new()];
        let a = anomaly_id(AnomalyRule::DealRisk, &ids);
        assert_eq!(a, anomaly_id(AnomalyRule::DealRisk, &ids));
        assert!(a.starts_with("deal_risk_"));
        assert_eq!(a.len(), "deal_risk_".len() + 16);
        assert_ne!(a, anomaly_id(AnomalyRule::SlaBreach, &ids));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp(&Value::from("2024-05-01T10:00:00Z")).is_some());
        assert!(parse_timestamp(&Value::from("2024-05-01T10:00:00")).is_some());
        assert!(parse_timestamp(&Value::from("2024-05-01 10:00:00")).is_some());
        assert!(parse_timestamp(&Value::from("2024-05-01")).is_some());
        assert!(parse_timestamp(&Value::Int(1_700_000_000)).is_some());
        assert!(parse_timestamp(&Value::Int(1_700_000_000_000)).is_some());
        assert!(parse_timestamp(&Value::from("soon")).is_none());
        assert!(parse_timestamp(&Value::Bool(true)).is_none());
    }
}
