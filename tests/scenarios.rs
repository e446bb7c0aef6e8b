use std::collections::BTreeMap;

use entity_unify::{
    AnomalyRule, EntityType, RawRecord, Severity, TimelineEventKind, UnificationEngine, Value,
};

fn record(json: serde_json::Value) -> RawRecord {
    RawRecord::from_json(&json).unwrap()
}

fn merged_contact_engine() -> UnificationEngine {
    let mut engine = UnificationEngine::new();
    engine.ingest_platform_data(
        "salesforce",
        &[record(serde_json::json!({
            "Id": "contact_1",
            "Name": "John Doe",
            "Email": "john@example.com",
            "Company": "Acme Inc"
        }))],
    );
    engine.ingest_platform_data(
        "hubspot",
        &[record(serde_json::json!({
            "id": "contact_1b",
            "email": "john@example.com",
            "firstname": "John",
            "lastname": "Doe"
        }))],
    );
    engine
}

#[test]
fn asana_task_is_classified_and_mapped() {
    let mut engine = UnificationEngine::new();
    let entities = engine.ingest_platform_data(
        "asana",
        &[record(serde_json::json!({
            "gid": "task_1",
            "name": "Complete Q3 Report",
            "due_date": "2024-12-31"
        }))],
    );

    assert_eq!(entities.len(), 1);
    let task = &entities[0];
    assert_eq!(task.entity_type, EntityType::Task);
    assert_eq!(task.canonical_name, "Complete Q3 Report");
    assert_eq!(
        task.platform_mappings,
        BTreeMap::from([("asana".to_string(), "task_1".to_string())])
    );
    assert_eq!(task.attributes.get("due_date"), Some(&Value::from("2024-12-31")));
    assert_eq!(task.confidence_score, 1.0);
}

#[test]
fn contact_seen_on_two_platforms_is_merged() {
    let engine = merged_contact_engine();

    assert_eq!(engine.entity_count(), 1);
    let contact = engine.entities().next().unwrap();
    assert_eq!(contact.entity_type, EntityType::Contact);
    assert_eq!(contact.canonical_name, "John Doe");
    assert!(contact.source_platforms.contains("salesforce"));
    assert!(contact.source_platforms.contains("hubspot"));
    assert_eq!(contact.platform_mappings.get("salesforce").map(String::as_str), Some("contact_1"));
    assert_eq!(contact.platform_mappings.get("hubspot").map(String::as_str), Some("contact_1b"));
    assert!(contact.updated_at >= contact.created_at);
}

#[test]
fn large_deal_with_high_priority_task_is_critical() {
    let mut engine = UnificationEngine::new();
    let tasks = engine.ingest_platform_data(
        "asana",
        &[record(serde_json::json!({
            "gid": "t1",
            "name": "Security review",
            "priority": "High",
            "status": "In Progress",
            "due_on": "2024-11-30"
        }))],
    );
    let deals = engine.ingest_platform_data(
        "hubspot",
        &[record(serde_json::json!({
            "id": "d1",
            "dealname": "Enterprise Renewal",
            "amount": 50000,
            "dealstage": "negotiation",
            "task": "Security review"
        }))],
    );
    let task_id = tasks[0].entity_id;
    let deal_id = deals[0].entity_id;
    assert_eq!(deals[0].entity_type, EntityType::Deal);
    assert_eq!(engine.get_entity_relationships(deal_id, Some("has_task")).len(), 1);

    let anomalies = engine.detect_anomalies();
    let critical: Vec<_> = anomalies
        .iter()
        .filter(|a| a.severity == Severity::Critical)
        .collect();
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].rule, AnomalyRule::DealRisk);
    assert!(critical[0].affected_entities.contains(&deal_id));
    assert!(critical[0].affected_entities.contains(&task_id));
    assert_eq!(critical[0].platforms, vec!["asana".to_string(), "hubspot".to_string()]);
    assert!(critical[0].anomaly_id.starts_with("deal_risk_"));

    // The task itself is also urgent and still open.
    assert!(anomalies
        .iter()
        .any(|a| a.rule == AnomalyRule::SlaBreach && a.affected_entities == vec![task_id]));
}

#[test]
fn small_deal_is_not_at_risk() {
    let mut engine = UnificationEngine::new();
    engine.ingest_platform_data(
        "asana",
        &[record(serde_json::json!({"gid": "t1", "name": "Blocked work", "status": "blocked", "due_on": "2024-11-30"}))],
    );
    engine.ingest_platform_data(
        "hubspot",
        &[record(serde_json::json!({"id": "d1", "dealname": "Tiny", "amount": "9,999", "dealstage": "open", "task": "Blocked work"}))],
    );
    assert!(engine
        .detect_anomalies()
        .iter()
        .all(|a| a.rule != AnomalyRule::DealRisk));
}

#[test]
fn unreferenced_project_is_inert() {
    let mut engine = UnificationEngine::new();
    let projects = engine.ingest_platform_data(
        "asana",
        &[record(serde_json::json!({
            "gid": "p1",
            "name": "Website Redesign",
            "current_status": "on track"
        }))],
    );
    assert_eq!(projects[0].entity_type, EntityType::Project);

    let anomalies = engine.detect_anomalies();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].rule, AnomalyRule::ProjectInertia);
    assert_eq!(anomalies[0].severity, Severity::Info);
    assert_eq!(anomalies[0].affected_entities, vec![projects[0].entity_id]);

    // Linking a task to the project clears the finding.
    engine.ingest_platform_data(
        "asana",
        &[record(serde_json::json!({
            "gid": "t9",
            "name": "Draft wireframes",
            "project": "Website Redesign",
            "due_on": "2024-10-01"
        }))],
    );
    assert!(engine
        .detect_anomalies()
        .iter()
        .all(|a| a.rule != AnomalyRule::ProjectInertia));
}

#[test]
fn search_returns_merged_entity_once() {
    let engine = merged_contact_engine();
    let found = engine.search_unified_entities("john", None);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].canonical_name, "John Doe");

    assert!(engine
        .search_unified_entities("john", Some(&[EntityType::Company]))
        .is_empty());
}

#[test]
fn reingesting_same_batch_is_idempotent() {
    let mut engine = UnificationEngine::new();
    let batch = [
        record(serde_json::json!({"id": "co1", "name": "Acme Inc", "domain": "acme.com"})),
        record(serde_json::json!({"id": "c1", "firstname": "Jane", "lastname": "Roe", "email": "jane@acme.com", "company": "Acme Inc"})),
    ];

    let first = engine.ingest_platform_data("hubspot", &batch);
    let (entities, relationships) = (engine.entity_count(), engine.relationship_count());
    assert_eq!(entities, 2);
    assert_eq!(relationships, 1);

    let second = engine.ingest_platform_data("hubspot", &batch);
    assert_eq!(engine.entity_count(), entities);
    assert_eq!(engine.relationship_count(), relationships);
    let ids = |v: &[entity_unify::UnifiedEntity]| v.iter().map(|e| e.entity_id).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(
        second[1].relationships.get("works_at").map(Vec::len),
        Some(1)
    );
}

#[test]
fn unclassifiable_records_are_dropped() {
    let mut engine = UnificationEngine::new();
    let report = engine.ingest_platform_data_with_report(
        "custom",
        &[record(serde_json::json!({"foo": 1, "bar": true}))],
    );
    assert!(report.entities.is_empty());
    assert_eq!(report.unknown_records, 1);
    assert_eq!(engine.entity_count(), 0);
}

#[test]
fn platform_query_and_timeline_after_merge() {
    let engine = merged_contact_engine();
    let contact = engine.entities().next().unwrap();

    assert_eq!(engine.get_platform_entities("hubspot", None).len(), 1);
    assert_eq!(engine.get_platform_entities("salesforce", Some(EntityType::Contact)).len(), 1);
    assert!(engine.get_platform_entities("slack", None).is_empty());

    let timeline = engine.get_entity_timeline(contact.entity_id);
    assert_eq!(timeline.len(), 3);
    assert_eq!(timeline[0].kind, TimelineEventKind::Created);
    assert!(timeline.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn anomaly_ids_are_stable_across_runs() {
    let mut engine = UnificationEngine::new();
    engine.ingest_platform_data(
        "asana",
        &[record(serde_json::json!({"gid": "p1", "name": "Orphan", "team": "core"}))],
    );
    let a = engine.detect_anomalies();
    let b = engine.detect_anomalies();
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].anomaly_id, b[0].anomaly_id);
}

#[test]
fn anomaly_detection_is_repeatable_across_all_rules() {
    let mut engine = UnificationEngine::new();
    engine.ingest_platform_data(
        "asana",
        &[
            record(serde_json::json!({
                "gid": "t1",
                "name": "Security review",
                "priority": "high",
                "status": "active",
                "due_on": "2024-11-30"
            })),
            record(serde_json::json!({"gid": "p1", "name": "Orphan", "team": "core"})),
        ],
    );
    engine.ingest_platform_data(
        "hubspot",
        &[record(serde_json::json!({
            "id": "d1",
            "dealname": "Enterprise Renewal",
            "amount": 50000,
            "dealstage": "negotiation",
            "task": "Security review"
        }))],
    );

    let first = engine.detect_anomalies();
    let second = engine.detect_anomalies();

    let rules: Vec<_> = first.iter().map(|a| a.rule).collect();
    assert_eq!(
        rules,
        vec![AnomalyRule::DealRisk, AnomalyRule::SlaBreach, AnomalyRule::ProjectInertia]
    );
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.anomaly_id, b.anomaly_id);
        assert_eq!(a.rule, b.rule);
        assert_eq!(a.severity, b.severity);
        assert_eq!(a.title, b.title);
        assert_eq!(a.description, b.description);
        assert_eq!(a.recommendation, b.recommendation);
        assert_eq!(a.affected_entities, b.affected_entities);
        assert_eq!(a.platforms, b.platforms);
        assert_eq!(a.metadata, b.metadata);
    }
}

#[test]
fn records_of_different_types_sharing_an_id_stay_separate() {
    let mut engine = UnificationEngine::new();
    let contacts = engine.ingest_platform_data(
        "hubspot",
        &[record(serde_json::json!({
            "id": "101",
            "firstname": "Jane",
            "lastname": "Roe",
            "email": "jane@globex.com"
        }))],
    );
    let companies = engine.ingest_platform_data(
        "hubspot",
        &[record(serde_json::json!({"id": "101", "name": "Globex", "domain": "globex.com"}))],
    );

    assert_eq!(engine.entity_count(), 2);
    assert_eq!(companies[0].entity_type, EntityType::Company);
    assert_eq!(companies[0].canonical_name, "Globex");
    assert_ne!(companies[0].entity_id, contacts[0].entity_id);

    let jane = engine.get_entity(contacts[0].entity_id).unwrap();
    assert_eq!(jane.canonical_name, "Jane Roe");
    assert!(!jane.attributes.contains_key("domain"));
    assert_eq!(engine.get_platform_entities("hubspot", Some(EntityType::Contact)).len(), 1);
    assert_eq!(engine.get_platform_entities("hubspot", Some(EntityType::Company)).len(), 1);
}
