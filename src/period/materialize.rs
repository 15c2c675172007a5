//! Persisted events -> period matrix, for edit and view sessions.
//!
//! Lossy by design of the store: events whose type name matches no category
//! are dropped and only counted.

use crate::period::catalog::CategoryKey;
use crate::period::matrix::{PeriodMatrixStore, PointRow, StudentViolationRow};
use crate::period::resolver::EventTypeResolver;
use crate::period::Period;
use crate::store::{PersistedEvent, Student};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

pub const DEFAULT_CLASS_RULES_CATEGORY: &str = "class_rules";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub matrix: PeriodMatrixStore,
    pub dropped: usize,
}

pub fn materialize(
    events: &[PersistedEvent],
    resolver: &EventTypeResolver,
    roster: &[Student],
    classroom_id: &str,
    date: &str,
    class_rules_category: &str,
) -> Materialized {
    let mut matrix = PeriodMatrixStore::new(classroom_id, date);
    let mut dropped = 0usize;

    for event in events {
        if event.classroom_id != classroom_id || event.date != date {
            dropped += 1;
            continue;
        }
        let Some(period) = event
            .period
            .and_then(|p| Period::new(p as i64).ok())
        else {
            dropped += 1;
            continue;
        };
        let Some(key) = resolver.resolve_event(&event.event_type_id, &event.event_type_name) else {
            debug!(name = %event.event_type_name, "event type matches no category");
            dropped += 1;
            continue;
        };
        let student = event
            .student_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let routed = match key {
            CategoryKey::Lesson(rating) => {
                let entry = matrix.entry_mut(period);
                if entry.lesson_rating.is_none() {
                    entry.lesson_rating = Some(rating);
                    true
                } else {
                    false
                }
            }
            CategoryKey::Point(column) => match student {
                Some(s) => {
                    let note = if column.keeps_note() {
                        event
                            .description
                            .as_deref()
                            .map(str::trim)
                            .filter(|d| !d.is_empty())
                            .map(str::to_string)
                    } else {
                        None
                    };
                    matrix.add_point_row(period, column, PointRow::new(Some(s.to_string()), note));
                    true
                }
                None => false,
            },
            CategoryKey::ClassViolation(kind) => {
                let class_rules = resolver
                    .entry_by_id(&event.event_type_id)
                    .map(|e| e.category == class_rules_category)
                    .unwrap_or(false);
                if student.is_none() && class_rules {
                    matrix.adjust_class_violation(period, kind, 1);
                    true
                } else {
                    false
                }
            }
            CategoryKey::StudentViolation(kind) => match student {
                Some(s) => {
                    matrix.add_student_violation_row(
                        period,
                        StudentViolationRow {
                            student_id: Some(s.to_string()),
                            kind,
                        },
                    );
                    true
                }
                None => false,
            },
        };
        if !routed {
            dropped += 1;
        }
    }

    sort_rows_by_name(&mut matrix, roster);
    Materialized { matrix, dropped }
}

fn compare_students(a: Option<&str>, b: Option<&str>, names: &HashMap<&str, &str>) -> Ordering {
    let na = a.and_then(|id| names.get(id).copied());
    let nb = b.and_then(|id| names.get(id).copied());
    match (na, nb) {
        (Some(x), Some(y)) => x.to_lowercase().cmp(&y.to_lowercase()).then_with(|| x.cmp(y)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(&b),
    }
}

/// Stable sort of every row list by student display name; students missing
/// from the roster go last, ordered by id.
pub fn sort_rows_by_name(matrix: &mut PeriodMatrixStore, roster: &[Student]) {
    let names: HashMap<&str, &str> = roster
        .iter()
        .map(|s| (s.id.as_str(), s.display_name.as_str()))
        .collect();
    for period in Period::all() {
        let entry = matrix.entry_mut(period);
        for rows in entry.point_selections.values_mut() {
            rows.sort_by(|a, b| compare_students(a.student(), b.student(), &names));
        }
        entry
            .student_violation_rows
            .sort_by(|a, b| compare_students(a.student(), b.student(), &names));
    }
}
