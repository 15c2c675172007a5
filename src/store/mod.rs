//! Event store boundary.
//!
//! The matrix engine is a client of a generic event-resource API. Two
//! backends implement it: a SQLite workspace store (which also owns the
//! server side of the bulk-sync diff) and a blocking HTTP client.

pub mod http;
pub mod sqlite;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpEventStore;
pub use sqlite::SqliteEventStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid payload: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTypeCatalogEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub default_points: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classroom {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub classroom_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    pub classroom: Classroom,
    pub students: Vec<Student>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Approved,
    Rejected,
}

impl EventStatus {
    pub fn parse(raw: &str) -> Option<EventStatus> {
        match raw {
            "pending" => Some(EventStatus::Pending),
            "approved" => Some(EventStatus::Approved),
            "rejected" => Some(EventStatus::Rejected),
            _ => None,
        }
    }
}

/// The store's authoritative record of one occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEvent {
    pub id: String,
    pub event_type_id: String,
    pub event_type_name: String,
    pub classroom_id: String,
    #[serde(default)]
    pub student_id: Option<String>,
    pub date: String,
    #[serde(default)]
    pub period: Option<u8>,
    pub points: i32,
    #[serde(default)]
    pub description: Option<String>,
    pub status: EventStatus,
    #[serde(default)]
    pub recorded_by: String,
}

/// A locally computed event that a commit asks the store to hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredEvent {
    pub event_type_id: String,
    pub classroom_id: String,
    #[serde(default)]
    pub student_id: Option<String>,
    pub date: String,
    pub period: u8,
    pub points: i32,
    #[serde(default)]
    pub description: Option<String>,
}

impl PersistedEvent {
    /// Projection used for the consistency contract: a persisted event minus
    /// id, status and recorder. Events without a period have no projection.
    #[cfg(test)]
    pub fn as_desired(&self) -> Option<DesiredEvent> {
        Some(DesiredEvent {
            event_type_id: self.event_type_id.clone(),
            classroom_id: self.classroom_id.clone(),
            student_id: self.student_id.clone(),
            date: self.date.clone(),
            period: self.period?,
            points: self.points,
            description: self.description.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventQuery {
    pub classroom_id: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub classroom_id: String,
    pub date: String,
    pub period: u8,
    pub desired_events: Vec<DesiredEvent>,
}

/// Counts reported by the store after a bulk sync. Remote stores that answer
/// with an empty body produce all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncOutcome {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

pub trait EventStore {
    fn backend_name(&self) -> &'static str;

    fn list_event_types(&self) -> Result<Vec<EventTypeCatalogEntry>, StoreError>;

    fn list_classrooms(&self) -> Result<Vec<Classroom>, StoreError>;

    fn list_students(&self, classroom_id: &str) -> Result<Vec<Student>, StoreError>;

    fn my_classroom_roster(&self) -> Result<Roster, StoreError>;

    fn list_events(&self, query: &EventQuery) -> Result<Vec<PersistedEvent>, StoreError>;

    /// Non-diffing write path; returns the number of created events.
    fn bulk_create_events(&self, events: &[DesiredEvent]) -> Result<usize, StoreError>;

    /// Diffing write path; the store owns the create/update/delete decision.
    fn bulk_sync_events(&self, request: &SyncRequest) -> Result<SyncOutcome, StoreError>;

    fn delete_event(&self, id: &str) -> Result<(), StoreError>;

    fn bulk_approve_events(&self, query: &EventQuery) -> Result<usize, StoreError>;
}
