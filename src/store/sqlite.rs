//! Workspace-backed event store.
//!
//! Implements the full event-resource contract on a local SQLite file,
//! including the server side of `bulk_sync_events`: the complete desired set
//! for a (classroom, date, period) is reconciled against what is stored in a
//! single transaction.

use crate::db;
use crate::store::{
    Classroom, DesiredEvent, EventQuery, EventStatus, EventStore, EventTypeCatalogEntry,
    PersistedEvent, Roster, Student, StoreError, SyncOutcome, SyncRequest,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

pub const OPERATOR_CLASSROOM_KEY: &str = "operator.classroomId";

pub struct SqliteEventStore {
    conn: Connection,
    recorded_by: String,
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn insert_event(
    conn: &Connection,
    event: &DesiredEvent,
    recorded_by: &str,
    at: &str,
) -> Result<String, StoreError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO events(id, event_type_id, classroom_id, student_id, date, period,
                            points, description, status, recorded_by, recorded_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)",
        params![
            id,
            event.event_type_id,
            event.classroom_id,
            event.student_id,
            event.date,
            event.period as i64,
            event.points,
            event.description,
            recorded_by,
            at,
        ],
    )?;
    Ok(id)
}

fn query_events(conn: &Connection, query: &EventQuery) -> Result<Vec<PersistedEvent>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.event_type_id, COALESCE(t.name, ''), e.classroom_id, e.student_id,
                e.date, e.period, e.points, e.description, e.status, e.recorded_by
         FROM events e
         LEFT JOIN event_types t ON t.id = e.event_type_id
         WHERE e.classroom_id = ?1 AND e.date = ?2 AND (?3 IS NULL OR e.period = ?3)
         ORDER BY COALESCE(e.period, 0), e.rowid",
    )?;
    let rows = stmt
        .query_map(
            params![query.classroom_id, query.date, query.period.map(|p| p as i64)],
            |r| {
                let period: Option<i64> = r.get(6)?;
                let status: String = r.get(9)?;
                Ok(PersistedEvent {
                    id: r.get(0)?,
                    event_type_id: r.get(1)?,
                    event_type_name: r.get(2)?,
                    classroom_id: r.get(3)?,
                    student_id: r.get(4)?,
                    date: r.get(5)?,
                    period: period.and_then(|p| u8::try_from(p).ok()),
                    points: r.get(7)?,
                    description: r.get(8)?,
                    status: EventStatus::parse(&status).unwrap_or(EventStatus::Pending),
                    recorded_by: r.get(10)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl SqliteEventStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(SqliteEventStore {
            conn: db::open_db(workspace)?,
            recorded_by: "local".to_string(),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(SqliteEventStore {
            conn: db::open_in_memory()?,
            recorded_by: "local".to_string(),
        })
    }

    pub fn upsert_classroom(&self, id: &str, name: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO classrooms(id, name) VALUES(?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            (id, name),
        )?;
        Ok(())
    }

    pub fn upsert_student(
        &self,
        id: &str,
        classroom_id: &str,
        display_name: &str,
    ) -> Result<(), StoreError> {
        let next_sort: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM students WHERE classroom_id = ?",
            [classroom_id],
            |r| r.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO students(id, classroom_id, display_name, sort_order) VALUES(?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               classroom_id = excluded.classroom_id,
               display_name = excluded.display_name",
            (id, classroom_id, display_name, next_sort),
        )?;
        Ok(())
    }

    pub fn upsert_event_type(
        &self,
        id: &str,
        name: &str,
        category: &str,
        default_points: i32,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO event_types(id, name, category, default_points) VALUES(?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               name = excluded.name,
               category = excluded.category,
               default_points = excluded.default_points",
            (id, name, category, default_points),
        )?;
        Ok(())
    }

    pub fn set_operator_classroom(&self, classroom_id: &str) -> Result<(), StoreError> {
        db::settings_set_json(
            &self.conn,
            OPERATOR_CLASSROOM_KEY,
            &serde_json::Value::String(classroom_id.to_string()),
        )
        .map_err(|e| StoreError::Invalid(e.to_string()))
    }

    fn classroom(&self, id: &str) -> Result<Option<Classroom>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name FROM classrooms WHERE id = ?",
                [id],
                |r| {
                    Ok(Classroom {
                        id: r.get(0)?,
                        name: r.get(1)?,
                    })
                },
            )
            .optional()?)
    }
}

fn same_content(e: &PersistedEvent, d: &DesiredEvent) -> bool {
    e.event_type_id == d.event_type_id
        && e.student_id == d.student_id
        && e.points == d.points
        && e.description == d.description
}

impl EventStore for SqliteEventStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    fn list_event_types(&self) -> Result<Vec<EventTypeCatalogEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, category, default_points FROM event_types ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok(EventTypeCatalogEntry {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    category: r.get(2)?,
                    default_points: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn list_classrooms(&self) -> Result<Vec<Classroom>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM classrooms ORDER BY name")?;
        let rows = stmt
            .query_map([], |r| {
                Ok(Classroom {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn list_students(&self, classroom_id: &str) -> Result<Vec<Student>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, classroom_id, display_name
             FROM students
             WHERE classroom_id = ?
             ORDER BY sort_order",
        )?;
        let rows = stmt
            .query_map([classroom_id], |r| {
                Ok(Student {
                    id: r.get(0)?,
                    classroom_id: r.get(1)?,
                    display_name: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn my_classroom_roster(&self) -> Result<Roster, StoreError> {
        let configured = db::settings_get_json(&self.conn, OPERATOR_CLASSROOM_KEY)
            .map_err(|e| StoreError::Invalid(e.to_string()))?;
        let Some(classroom_id) = configured.as_ref().and_then(|v| v.as_str()) else {
            return Err(StoreError::NotFound(
                "operator classroom not configured".to_string(),
            ));
        };
        let classroom = self
            .classroom(classroom_id)?
            .ok_or_else(|| StoreError::NotFound(format!("classroom {}", classroom_id)))?;
        let students = self.list_students(classroom_id)?;
        Ok(Roster {
            classroom,
            students,
        })
    }

    fn list_events(&self, query: &EventQuery) -> Result<Vec<PersistedEvent>, StoreError> {
        query_events(&self.conn, query)
    }

    fn bulk_create_events(&self, events: &[DesiredEvent]) -> Result<usize, StoreError> {
        let at = now();
        let tx = self.conn.unchecked_transaction()?;
        for event in events {
            insert_event(&tx, event, &self.recorded_by, &at)?;
        }
        tx.commit()?;
        Ok(events.len())
    }

    fn bulk_sync_events(&self, request: &SyncRequest) -> Result<SyncOutcome, StoreError> {
        if let Some(stray) = request.desired_events.iter().find(|d| {
            d.classroom_id != request.classroom_id
                || d.date != request.date
                || d.period != request.period
        }) {
            return Err(StoreError::Invalid(format!(
                "desired event for {}/{}/{} does not belong to {}/{}/{}",
                stray.classroom_id,
                stray.date,
                stray.period,
                request.classroom_id,
                request.date,
                request.period
            )));
        }

        let at = now();
        let tx = self.conn.unchecked_transaction()?;
        let mut existing = query_events(
            &tx,
            &EventQuery {
                classroom_id: request.classroom_id.clone(),
                date: request.date.clone(),
                period: Some(request.period),
            },
        )?;
        let mut outcome = SyncOutcome::default();

        let mut unmatched: Vec<&DesiredEvent> = Vec::new();
        for d in &request.desired_events {
            match existing.iter().position(|e| same_content(e, d)) {
                Some(pos) => {
                    existing.swap_remove(pos);
                    outcome.unchanged += 1;
                }
                None => unmatched.push(d),
            }
        }

        for d in unmatched {
            let slot = existing
                .iter()
                .position(|e| e.event_type_id == d.event_type_id && e.student_id == d.student_id);
            match slot {
                Some(pos) => {
                    let e = existing.swap_remove(pos);
                    tx.execute(
                        "UPDATE events
                         SET points = ?, description = ?, status = 'pending',
                             recorded_by = ?, updated_at = ?
                         WHERE id = ?",
                        params![d.points, d.description, self.recorded_by, at, e.id],
                    )?;
                    outcome.updated += 1;
                }
                None => {
                    insert_event(&tx, d, &self.recorded_by, &at)?;
                    outcome.created += 1;
                }
            }
        }

        for e in existing {
            tx.execute("DELETE FROM events WHERE id = ?", [&e.id])?;
            outcome.deleted += 1;
        }

        tx.commit()?;
        Ok(outcome)
    }

    fn delete_event(&self, id: &str) -> Result<(), StoreError> {
        let n = self.conn.execute("DELETE FROM events WHERE id = ?", [id])?;
        if n == 0 {
            return Err(StoreError::NotFound(format!("event {}", id)));
        }
        Ok(())
    }

    fn bulk_approve_events(&self, query: &EventQuery) -> Result<usize, StoreError> {
        let n = self.conn.execute(
            "UPDATE events SET status = 'approved', updated_at = ?4
             WHERE classroom_id = ?1 AND date = ?2 AND (?3 IS NULL OR period = ?3)
               AND status = 'pending'",
            params![
                query.classroom_id,
                query.date,
                query.period.map(|p| p as i64),
                now()
            ],
        )?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SqliteEventStore {
        let s = SqliteEventStore::open_in_memory().expect("store");
        s.upsert_classroom("C", "7A").expect("classroom");
        s.upsert_event_type("t10", "Score 10", "study", 10).expect("t10");
        s.upsert_event_type("noisy", "Noisy class", "class_rules", -3)
            .expect("noisy");
        s
    }

    fn ev(type_id: &str, student: Option<&str>, period: u8, points: i32) -> DesiredEvent {
        DesiredEvent {
            event_type_id: type_id.to_string(),
            classroom_id: "C".to_string(),
            student_id: student.map(str::to_string),
            date: "2024-11-04".to_string(),
            period,
            points,
            description: None,
        }
    }

    fn query(period: Option<u8>) -> EventQuery {
        EventQuery {
            classroom_id: "C".to_string(),
            date: "2024-11-04".to_string(),
            period,
        }
    }

    #[test]
    fn sync_creates_updates_and_deletes() {
        let s = seeded();
        s.bulk_create_events(&[
            ev("t10", Some("s1"), 4, 10),
            ev("t10", Some("s2"), 4, 10),
            ev("noisy", None, 4, -3),
        ])
        .expect("create");

        let outcome = s
            .bulk_sync_events(&SyncRequest {
                classroom_id: "C".to_string(),
                date: "2024-11-04".to_string(),
                period: 4,
                desired_events: vec![
                    ev("t10", Some("s1"), 4, 10),
                    ev("t10", Some("s2"), 4, 12),
                    ev("t10", Some("s3"), 4, 10),
                ],
            })
            .expect("sync");
        assert_eq!(
            outcome,
            SyncOutcome {
                created: 1,
                updated: 1,
                deleted: 1,
                unchanged: 1
            }
        );

        let mut got: Vec<DesiredEvent> = s
            .list_events(&query(Some(4)))
            .expect("list")
            .iter()
            .filter_map(PersistedEvent::as_desired)
            .collect();
        got.sort();
        let mut want = vec![
            ev("t10", Some("s1"), 4, 10),
            ev("t10", Some("s2"), 4, 12),
            ev("t10", Some("s3"), 4, 10),
        ];
        want.sort();
        assert_eq!(got, want);
    }

    #[test]
    fn empty_sync_clears_only_that_period() {
        let s = seeded();
        s.bulk_create_events(&[ev("noisy", None, 4, -3), ev("noisy", None, 4, -3), ev("noisy", None, 5, -3)])
            .expect("create");
        let outcome = s
            .bulk_sync_events(&SyncRequest {
                classroom_id: "C".to_string(),
                date: "2024-11-04".to_string(),
                period: 4,
                desired_events: vec![],
            })
            .expect("sync");
        assert_eq!(outcome.deleted, 2);
        assert_eq!(s.list_events(&query(None)).expect("list").len(), 1);
    }

    #[test]
    fn sync_rejects_events_for_another_period() {
        let s = seeded();
        let err = s
            .bulk_sync_events(&SyncRequest {
                classroom_id: "C".to_string(),
                date: "2024-11-04".to_string(),
                period: 4,
                desired_events: vec![ev("noisy", None, 5, -3)],
            })
            .expect_err("stray period");
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[test]
    fn failed_bulk_create_writes_nothing() {
        let s = seeded();
        let err = s.bulk_create_events(&[ev("t10", Some("s1"), 1, 10), ev("missing-type", None, 1, 0)]);
        assert!(err.is_err());
        assert!(s.list_events(&query(None)).expect("list").is_empty());
    }

    #[test]
    fn approve_and_delete() {
        let s = seeded();
        s.bulk_create_events(&[ev("t10", Some("s1"), 1, 10), ev("t10", Some("s1"), 2, 10)])
            .expect("create");
        assert_eq!(s.bulk_approve_events(&query(Some(1))).expect("approve"), 1);
        let events = s.list_events(&query(None)).expect("list");
        assert_eq!(events[0].status, EventStatus::Approved);
        assert_eq!(events[1].status, EventStatus::Pending);
        assert_eq!(events[0].event_type_name, "Score 10");
        s.delete_event(&events[1].id).expect("delete");
        assert!(matches!(
            s.delete_event(&events[1].id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn roster_needs_operator_classroom() {
        let s = seeded();
        assert!(matches!(s.my_classroom_roster(), Err(StoreError::NotFound(_))));
        s.upsert_student("s2", "C", "Bao").expect("student");
        s.upsert_student("s1", "C", "An").expect("student");
        s.set_operator_classroom("C").expect("operator");
        let roster = s.my_classroom_roster().expect("roster");
        assert_eq!(roster.classroom.name, "7A");
        let ids: Vec<&str> = roster.students.iter().map(|st| st.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s1"]);
    }
}
