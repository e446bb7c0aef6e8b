//! Entity type detection from record field names.
//!
//! Known platforms are classified through a per-platform table of native
//! field names. Anything the table does not decide falls through to generic
//! heuristics evaluated in a fixed priority order; the first rule that
//! matches wins, so a contact carrying an `industry` field is still a
//! contact.

use tracing::debug;

use crate::entity::EntityType;
use crate::record::RawRecord;

/// A platform-native field set that identifies an entity type.
///
/// The rule matches when any of `fields` is present in the record.
#[derive(Debug, Clone, Copy)]
struct FieldRule {
    fields: &'static [&'static str],
    entity_type: EntityType,
}

const fn rule(fields: &'static [&'static str], entity_type: EntityType) -> FieldRule {
    FieldRule {
        fields,
        entity_type,
    }
}

const ASANA: &[FieldRule] = &[
    rule(&["due_on", "due_date", "completed", "assignee"], EntityType::Task),
    rule(&["team", "members", "current_status"], EntityType::Project),
];

const HUBSPOT: &[FieldRule] = &[
    rule(&["dealstage", "dealname"], EntityType::Deal),
    rule(&["firstname", "lastname", "email"], EntityType::Contact),
    rule(&["domain", "industry"], EntityType::Company),
];

const SALESFORCE: &[FieldRule] = &[
    rule(&["StageName", "Amount"], EntityType::Deal),
    rule(&["Email", "FirstName", "LastName"], EntityType::Contact),
    rule(&["Industry", "Website"], EntityType::Company),
];

const SLACK: &[FieldRule] = &[
    rule(&["real_name", "is_bot"], EntityType::User),
    rule(&["text", "ts"], EntityType::Message),
];

const GOOGLE_DRIVE: &[FieldRule] = &[rule(&["mimeType", "mime_type"], EntityType::File)];

const JIRA: &[FieldRule] = &[rule(&["issuetype", "issue_type"], EntityType::Task)];

const TRELLO: &[FieldRule] = &[rule(&["idList", "idBoard"], EntityType::Task)];

const MAILCHIMP: &[FieldRule] = &[rule(&["campaign_name", "send_time"], EntityType::Campaign)];

const GOOGLE_CALENDAR: &[FieldRule] = &[rule(&["start", "end", "attendees"], EntityType::Event)];

fn platform_rules(platform: &str) -> Option<&'static [FieldRule]> {
    match platform {
        "asana" => Some(ASANA),
        "hubspot" => Some(HUBSPOT),
        "salesforce" => Some(SALESFORCE),
        "slack" => Some(SLACK),
        "google_drive" => Some(GOOGLE_DRIVE),
        "jira" => Some(JIRA),
        "trello" => Some(TRELLO),
        "mailchimp" => Some(MAILCHIMP),
        "google_calendar" => Some(GOOGLE_CALENDAR),
        _ => None,
    }
}

const EMAIL_FIELDS: &[&str] = &["email", "Email", "email_address", "emailAddress"];
const NAME_FIELDS: &[&str] = &["name", "Name", "firstname", "first_name", "FirstName", "full_name"];
const TITLE_FIELDS: &[&str] = &["title", "Title", "subject", "summary"];
const DUE_FIELDS: &[&str] = &["due_date", "due_on", "dueDate", "DueDate", "deadline"];
const INDUSTRY_FIELDS: &[&str] = &["industry", "Industry", "sector"];
const FILE_FIELDS: &[&str] = &["file_name", "filename", "mime_type", "mimeType"];
const MESSAGE_FIELDS: &[&str] = &["message", "content"];
const AMOUNT_FIELDS: &[&str] = &["amount", "Amount", "deal_value"];
const STAGE_FIELDS: &[&str] = &["stage", "Stage", "dealstage", "deal_stage", "StageName"];

/// Generic heuristics, in priority order.
fn classify_generic(record: &RawRecord) -> Option<EntityType> {
    let has = |fields: &[&str]| record.contains_any(fields);

    if has(EMAIL_FIELDS) && has(NAME_FIELDS) {
        Some(EntityType::Contact)
    } else if has(TITLE_FIELDS) && has(DUE_FIELDS) {
        Some(EntityType::Task)
    } else if has(NAME_FIELDS) && has(INDUSTRY_FIELDS) {
        Some(EntityType::Company)
    } else if has(FILE_FIELDS) || (record.contains("gid") && record.contains("name")) {
        Some(EntityType::File)
    } else if has(MESSAGE_FIELDS) {
        Some(EntityType::Message)
    } else if has(AMOUNT_FIELDS) && has(STAGE_FIELDS) {
        Some(EntityType::Deal)
    } else if record.contains("campaign_name") && record.contains("status") {
        Some(EntityType::Campaign)
    } else {
        None
    }
}

/// Infers the entity type of `record` produced by `platform`.
///
/// `platform` is expected in normalized (lowercase) form. Returns `None`
/// when the record cannot be classified.
#[must_use]
pub fn classify(platform: &str, record: &RawRecord) -> Option<EntityType> {
    let from_table = platform_rules(platform).and_then(|rules| {
        rules
            .iter()
            .find(|r| record.contains_any(r.fields))
            .map(|r| r.entity_type)
    });

    let detected = from_table.or_else(|| classify_generic(record));
    debug!(
        platform,
        entity_type = detected.map_or("unknown", EntityType::as_str),
        via_table = from_table.is_some(),
        "classified record"
    );
    detected
}
