//! Canonicalization of raw records.
//!
//! Extracts a display name, the platform-native identifier and a normalized
//! attribute set from a classified record. Field lookups go through ordered
//! synonym lists; the first present field wins.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use crate::entity::{placeholder_name, EntityType};
use crate::record::RawRecord;
use crate::value::Value;

/// Output of canonicalizing one record.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub entity_type: EntityType,
    pub canonical_name: String,
    pub platform_id: String,
    /// True when the record carried no identifier and one was synthesized.
    pub platform_id_generated: bool,
    pub attributes: BTreeMap<String, Value>,
}

/// Normalized attribute key and the record fields it may be read from.
type AttrSpec = (&'static str, &'static [&'static str]);

const COMMON_ATTRS: &[AttrSpec] = &[
    ("created_at", &["created_at", "createdAt", "CreatedDate", "created_time", "createdTime"]),
    ("updated_at", &["updated_at", "updatedAt", "LastModifiedDate", "modified_at", "modifiedTime"]),
    ("status", &["status", "Status", "state"]),
    ("description", &["description", "Description", "notes"]),
];

const CONTACT_ATTRS: &[AttrSpec] = &[
    ("email", &["email", "Email", "email_address", "emailAddress"]),
    ("phone", &["phone", "Phone", "phone_number", "mobile"]),
    ("company", &["company", "Company", "company_name", "Account"]),
    ("title", &["title", "Title", "job_title", "jobtitle"]),
    ("department", &["department", "Department"]),
];

const COMPANY_ATTRS: &[AttrSpec] = &[
    ("industry", &["industry", "Industry", "sector"]),
    ("domain", &["domain", "website", "Website"]),
    ("size", &["size", "employees", "NumberOfEmployees"]),
    ("location", &["location", "city", "BillingCity"]),
];

const TASK_ATTRS: &[AttrSpec] = &[
    ("due_date", &["due_date", "due_on", "dueDate", "deadline"]),
    ("priority", &["priority", "Priority"]),
    ("assignee", &["assignee", "assigned_to", "owner"]),
    ("project", &["project", "project_name", "projects"]),
    ("completed", &["completed"]),
];

const PROJECT_ATTRS: &[AttrSpec] = &[
    ("owner", &["owner", "Owner"]),
    ("team", &["team"]),
    ("start_date", &["start_date", "start_on"]),
    ("due_date", &["due_date", "due_on"]),
    ("priority", &["priority", "Priority"]),
];

const FILE_ATTRS: &[AttrSpec] = &[
    ("mime_type", &["mime_type", "mimeType"]),
    ("size", &["size", "file_size"]),
    ("url", &["url", "webViewLink", "permalink_url"]),
    ("project", &["project", "project_name", "folder"]),
    ("owner", &["owner", "owners"]),
];

const MESSAGE_ATTRS: &[AttrSpec] = &[
    ("channel", &["channel", "channel_name"]),
    ("sender", &["user", "sender", "from"]),
    ("content", &["text", "message", "content"]),
    ("timestamp", &["ts", "timestamp", "sent_at"]),
    ("priority", &["priority"]),
];

const DEAL_ATTRS: &[AttrSpec] = &[
    ("amount", &["amount", "Amount", "deal_value"]),
    ("stage", &["dealstage", "stage", "StageName", "deal_stage"]),
    ("contact", &["contact", "contact_name", "Contact"]),
    ("company", &["company", "Company", "account"]),
    ("close_date", &["closedate", "close_date", "CloseDate"]),
    ("task", &["task", "associated_task", "next_task"]),
    ("priority", &["priority", "Priority"]),
];

const CAMPAIGN_ATTRS: &[AttrSpec] = &[
    ("campaign_type", &["campaign_type", "type"]),
    ("send_time", &["send_time", "sent_at"]),
    ("audience", &["audience", "list_name"]),
];

const EVENT_ATTRS: &[AttrSpec] = &[
    ("start", &["start", "start_time"]),
    ("end", &["end", "end_time"]),
    ("location", &["location"]),
    ("attendees", &["attendees"]),
];

const USER_ATTRS: &[AttrSpec] = &[
    ("email", &["email", "Email"]),
    ("title", &["title"]),
    ("team", &["team", "team_id"]),
    ("timezone", &["tz", "timezone"]),
];

const fn type_attrs(entity_type: EntityType) -> &'static [AttrSpec] {
    match entity_type {
        EntityType::Contact => CONTACT_ATTRS,
        EntityType::Company => COMPANY_ATTRS,
        EntityType::Task => TASK_ATTRS,
        EntityType::Project => PROJECT_ATTRS,
        EntityType::File => FILE_ATTRS,
        EntityType::Message => MESSAGE_ATTRS,
        EntityType::Deal => DEAL_ATTRS,
        EntityType::Campaign => CAMPAIGN_ATTRS,
        EntityType::Event => EVENT_ATTRS,
        EntityType::User => USER_ATTRS,
    }
}

const fn name_fields(entity_type: EntityType) -> &'static [&'static str] {
    match entity_type {
        EntityType::Contact => &["name", "Name", "full_name", "display_name"],
        EntityType::Company => &["name", "Name", "company_name", "companyName"],
        EntityType::Task => &["name", "title", "Title", "summary", "subject"],
        EntityType::Project => &["name", "Name", "title", "project_name"],
        EntityType::File => &["name", "title", "file_name", "filename"],
        EntityType::Message => &["subject", "title", "text", "message", "content"],
        EntityType::Deal => &["dealname", "name", "Name", "title"],
        EntityType::Campaign => &["campaign_name", "name", "title"],
        EntityType::Event => &["summary", "title", "name"],
        EntityType::User => &["real_name", "display_name", "name", "username"],
    }
}

fn id_fields(platform: &str) -> &'static [&'static str] {
    match platform {
        "asana" => &["gid"],
        "hubspot" => &["id", "hs_object_id", "vid"],
        "salesforce" => &["Id", "id"],
        "slack" => &["id", "ts"],
        "google_drive" => &["id", "fileId"],
        "jira" => &["key", "id"],
        _ => &["id", "Id", "ID", "uuid", "_id"],
    }
}

/// Picks the display name for a record.
#[must_use]
pub fn extract_name(entity_type: EntityType, record: &RawRecord) -> String {
    if let Some(name) = name_fields(entity_type)
        .iter()
        .find_map(|f| record.get(f).and_then(Value::as_non_empty_str))
    {
        return name.to_string();
    }

    if entity_type == EntityType::Contact {
        let first = record
            .first_of(&["firstname", "first_name", "FirstName"])
            .and_then(Value::as_non_empty_str);
        let last = record
            .first_of(&["lastname", "last_name", "LastName"])
            .and_then(Value::as_non_empty_str);
        match (first, last) {
            (Some(f), Some(l)) => return format!("{f} {l}"),
            (Some(n), None) | (None, Some(n)) => return n.to_string(),
            (None, None) => {}
        }
    }

    record
        .iter()
        .find_map(|(_, v)| v.as_non_empty_str())
        .map_or_else(|| placeholder_name(entity_type), str::to_string)
}

/// Reads the platform-native identifier, if the record carries one.
#[must_use]
pub fn extract_platform_id(platform: &str, record: &RawRecord) -> Option<String> {
    id_fields(platform).iter().find_map(|f| match record.get(f)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Int(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Copies the common and type-specific attributes and normalizes them.
#[must_use]
pub fn extract_attributes(entity_type: EntityType, record: &RawRecord) -> BTreeMap<String, Value> {
    let mut attributes = BTreeMap::new();
    for (key, synonyms) in COMMON_ATTRS.iter().chain(type_attrs(entity_type)) {
        if let Some(value) = record.first_of(synonyms) {
            attributes.entry((*key).to_string()).or_insert_with(|| value.clone());
        }
    }

    if let Some(status) = attributes.get_mut("status") {
        *status = normalize_status(status);
    }
    if let Some(priority) = attributes.get_mut("priority") {
        *priority = normalize_priority(priority);
    }
    attributes
}

/// Canonicalizes a classified record.
#[must_use]
pub fn canonicalize(entity_type: EntityType, platform: &str, record: &RawRecord) -> CanonicalRecord {
    let (platform_id, platform_id_generated) = match extract_platform_id(platform, record) {
        Some(id) => (id, false),
        None => (format!("generated_{}", Uuid::new_v4().simple()), true),
    };

    CanonicalRecord {
        entity_type,
        canonical_name: extract_name(entity_type, record),
        platform_id,
        platform_id_generated,
        attributes: extract_attributes(entity_type, record),
    }
}

fn separators() -> Option<&'static Regex> {
    static SEPARATORS: OnceLock<Option<Regex>> = OnceLock::new();
    SEPARATORS
        .get_or_init(|| Regex::new(r"[\s_\-]+").ok())
        .as_ref()
}

/// Lowercases and collapses runs of spaces, underscores and dashes.
fn vocabulary_key(raw: &str) -> String {
    match separators() {
        Some(re) => re.replace_all(raw.trim(), " ").to_lowercase(),
        None => raw.trim().to_lowercase(),
    }
}

/// Maps a status value onto `active|completed|inactive|archived`.
///
/// Unrecognized strings are lowercased; non-string values pass through.
#[must_use]
pub fn normalize_status(value: &Value) -> Value {
    let Some(raw) = value.as_str() else {
        return value.clone();
    };
    let canonical = match vocabulary_key(raw).as_str() {
        "active" | "open" | "in progress" | "ongoing" | "started" | "doing" | "todo" | "to do" => {
            "active"
        }
        "completed" | "complete" | "done" | "closed" | "finished" | "resolved" | "closed won" => {
            "completed"
        }
        "inactive" | "paused" | "on hold" | "disabled" | "suspended" => "inactive",
        "archived" | "archive" | "cancelled" | "canceled" | "deleted" => "archived",
        _ => return Value::String(raw.trim().to_lowercase()),
    };
    Value::from(canonical)
}

/// Maps a priority value onto `high|medium|low`.
///
/// Unrecognized strings (including `critical`) are lowercased.
#[must_use]
pub fn normalize_priority(value: &Value) -> Value {
    let Some(raw) = value.as_str() else {
        return value.clone();
    };
    let canonical = match vocabulary_key(raw).as_str() {
        "high" | "urgent" | "highest" | "important" | "p1" => "high",
        "medium" | "normal" | "moderate" | "med" | "p2" => "medium",
        "low" | "lowest" | "minor" | "p3" | "p4" => "low",
        _ => return Value::String(raw.trim().to_lowercase()),
    };
    Value::from(canonical)
}
