use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const USER_PREFIX: &str = "user::";
pub const SCRIPT_PREFIX: &str = "script::";
pub const LINE_PREFIX: &str = "line::";
pub const ROOM_PREFIX: &str = "room::";
pub const MEMBERSHIP_PREFIX: &str = "membership::";
pub const PROGRESS_PREFIX: &str = "progress::";
pub const ISSUE_PREFIX: &str = "issue::";

pub const KIND_USER: &str = "user";
pub const KIND_SCRIPT: &str = "script";
pub const KIND_LINE: &str = "line";
pub const KIND_ROOM: &str = "room";
pub const KIND_MEMBERSHIP: &str = "membership";
pub const KIND_PROGRESS: &str = "progress";
pub const KIND_ISSUE: &str = "issue";

/// Envelope shared by every document: CouchDB identity plus a `kind` discriminator
/// used by Mango selectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub kind: String,
    #[serde(flatten)]
    pub body: T,
}

impl<T> CouchDocument<T> {
    pub fn new(id: String, kind: &str, body: T, rev: Option<String>) -> Self {
        Self {
            id,
            rev,
            kind: kind.to_string(),
            body,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct FindResponse {
    pub docs: Vec<Value>,
}

pub fn user_doc_id(id: Uuid) -> String {
    format!("{USER_PREFIX}{id}")
}

pub fn script_doc_id(id: Uuid) -> String {
    format!("{SCRIPT_PREFIX}{id}")
}

pub fn line_doc_id(id: Uuid) -> String {
    format!("{LINE_PREFIX}{id}")
}

pub fn room_doc_id(id: Uuid) -> String {
    format!("{ROOM_PREFIX}{id}")
}

pub fn membership_doc_id(room_id: Uuid, user_id: Uuid) -> String {
    format!("{MEMBERSHIP_PREFIX}{room_id}:{user_id}")
}

pub fn progress_doc_id(user_id: Uuid, line_id: Uuid) -> String {
    format!("{PROGRESS_PREFIX}{user_id}:{line_id}")
}

pub fn issue_doc_id(id: Uuid) -> String {
    format!("{ISSUE_PREFIX}{id}")
}
