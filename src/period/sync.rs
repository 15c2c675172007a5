//! Commits one period's complete desired event set to the store.
//!
//! Two strategies implement the same capability: `BulkCreate` for first-time
//! entry (nothing to reconcile) and `DiffSync`, which hands the whole set to
//! the store and lets it decide what to create, update or delete.

use crate::period::{Period, PeriodError};
use crate::store::{DesiredEvent, EventStore, SyncRequest};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CommitStrategy {
    BulkCreate,
    DiffSync,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub period: u8,
    pub strategy: CommitStrategy,
    pub desired_count: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub fingerprint: String,
}

/// Order-independent SHA-256 over a desired set.
pub fn fingerprint(events: &[DesiredEvent]) -> String {
    let mut sorted: Vec<&DesiredEvent> = events.iter().collect();
    sorted.sort();
    let mut hasher = Sha256::new();
    for e in sorted {
        hasher.update(e.event_type_id.as_bytes());
        hasher.update([0x1f]);
        hasher.update(e.classroom_id.as_bytes());
        hasher.update([0x1f]);
        hasher.update(e.student_id.as_deref().unwrap_or("").as_bytes());
        hasher.update([0x1f]);
        hasher.update(e.date.as_bytes());
        hasher.update([0x1f, e.period, 0x1f]);
        hasher.update(e.points.to_le_bytes());
        hasher.update([0x1f]);
        match &e.description {
            Some(d) => {
                hasher.update([1]);
                hasher.update(d.as_bytes());
            }
            None => hasher.update([0]),
        }
        hasher.update([0x1e]);
    }
    format!("{:x}", hasher.finalize())
}

pub fn commit(
    store: &dyn EventStore,
    strategy: CommitStrategy,
    classroom_id: &str,
    date: &str,
    period: Period,
    desired: Vec<DesiredEvent>,
) -> Result<SyncResult, PeriodError> {
    let fp = fingerprint(&desired);
    let desired_count = desired.len();
    let mut result = SyncResult {
        period: period.get(),
        strategy,
        desired_count,
        created: 0,
        updated: 0,
        deleted: 0,
        unchanged: 0,
        fingerprint: fp,
    };

    match strategy {
        CommitStrategy::BulkCreate => {
            if desired.is_empty() {
                debug!(period = period.get(), "bulk create skipped, nothing to write");
                return Ok(result);
            }
            let created = store.bulk_create_events(&desired).map_err(|e| {
                warn!(period = period.get(), error = %e, "bulk create failed");
                PeriodError::remote("bulkCreateEvents", Some(period.get()), e)
            })?;
            result.created = created;
        }
        CommitStrategy::DiffSync => {
            let request = SyncRequest {
                classroom_id: classroom_id.to_string(),
                date: date.to_string(),
                period: period.get(),
                desired_events: desired,
            };
            let outcome = store.bulk_sync_events(&request).map_err(|e| {
                warn!(period = period.get(), error = %e, "bulk sync failed");
                PeriodError::remote("bulkSyncEvents", Some(period.get()), e)
            })?;
            result.created = outcome.created;
            result.updated = outcome.updated;
            result.deleted = outcome.deleted;
            result.unchanged = outcome.unchanged;
        }
    }

    info!(
        classroom_id,
        date,
        period = period.get(),
        strategy = ?strategy,
        desired = desired_count,
        created = result.created,
        updated = result.updated,
        deleted = result.deleted,
        "period committed"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EventQuery, SqliteEventStore};

    fn desired(student: &str, points: i32) -> DesiredEvent {
        DesiredEvent {
            event_type_id: "t1".to_string(),
            classroom_id: "C".to_string(),
            student_id: Some(student.to_string()),
            date: "2024-11-04".to_string(),
            period: 2,
            points,
            description: None,
        }
    }

    fn store() -> SqliteEventStore {
        let s = SqliteEventStore::open_in_memory().expect("store");
        s.upsert_classroom("C", "7A").expect("classroom");
        s.upsert_event_type("t1", "Score 9", "study", 8)
            .expect("event type");
        s
    }

    fn count(s: &SqliteEventStore) -> usize {
        s.list_events(&EventQuery {
            classroom_id: "C".to_string(),
            date: "2024-11-04".to_string(),
            period: Some(2),
        })
        .expect("list")
        .len()
    }

    #[test]
    fn fingerprint_ignores_order() {
        let a = vec![desired("s1", 1), desired("s2", 2)];
        let b = vec![desired("s2", 2), desired("s1", 1)];
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&[desired("s1", 1)]));
        assert_eq!(fingerprint(&[]).len(), 64);
    }

    #[test]
    fn repeated_sync_keeps_count() {
        let s = store();
        let p = Period::new(2).expect("period");
        let set = vec![desired("s1", 8), desired("s2", 8)];
        let first = commit(&s, CommitStrategy::DiffSync, "C", "2024-11-04", p, set.clone()).expect("sync 1");
        assert_eq!(first.created, 2);
        let second = commit(&s, CommitStrategy::DiffSync, "C", "2024-11-04", p, set).expect("sync 2");
        assert_eq!(second.created, 0);
        assert_eq!(second.unchanged, 2);
        assert_eq!(count(&s), 2);
    }

    #[test]
    fn empty_bulk_create_makes_no_call() {
        let s = store();
        let p = Period::new(2).expect("period");
        let r = commit(&s, CommitStrategy::BulkCreate, "C", "2024-11-04", p, vec![])
            .expect("commit");
        assert_eq!(r.created, 0);
        assert_eq!(count(&s), 0);
    }
}
