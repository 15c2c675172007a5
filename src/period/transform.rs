//! Matrix -> flat list of event-creation payloads.

use crate::period::catalog::{CategoryKey, PointColumn};
use crate::period::matrix::{PeriodEntry, PeriodMatrixStore};
use crate::period::resolver::EventTypeResolver;
use crate::period::{Period, ResolutionMiss};
use crate::store::{DesiredEvent, EventTypeCatalogEntry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Points per point column. A zero or missing value means the catalog
/// default of the resolved event type applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoringTable(BTreeMap<PointColumn, i32>);

impl Default for ScoringTable {
    fn default() -> Self {
        ScoringTable(
            PointColumn::ALL
                .into_iter()
                .map(|c| (c, c.default_table_points()))
                .collect(),
        )
    }
}

impl ScoringTable {
    pub fn with_overrides(overrides: &BTreeMap<PointColumn, i32>) -> Self {
        let mut table = ScoringTable::default();
        for (column, points) in overrides {
            table.0.insert(*column, *points);
        }
        table
    }

    pub fn get(&self, column: PointColumn) -> Option<i32> {
        self.0.get(&column).copied()
    }

    pub fn points_for(&self, column: PointColumn, entry: &EventTypeCatalogEntry) -> i32 {
        match self.get(column) {
            Some(points) if points != 0 => points,
            _ => entry.default_points,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOutput {
    pub events: Vec<DesiredEvent>,
    pub misses: Vec<ResolutionMiss>,
}

struct Emitter<'a> {
    resolver: &'a EventTypeResolver,
    classroom_id: &'a str,
    date: &'a str,
    period: Period,
    events: Vec<DesiredEvent>,
    misses: BTreeSet<ResolutionMiss>,
}

impl<'a> Emitter<'a> {
    fn resolve(&mut self, key: CategoryKey) -> Option<&'a EventTypeCatalogEntry> {
        let resolver: &'a EventTypeResolver = self.resolver;
        let found = resolver.resolve_forward(key);
        if found.is_none() {
            self.misses.insert(ResolutionMiss { key });
        }
        found
    }

    fn push(
        &mut self,
        entry: &EventTypeCatalogEntry,
        student_id: Option<&str>,
        points: i32,
        description: Option<&str>,
    ) {
        self.events.push(DesiredEvent {
            event_type_id: entry.id.clone(),
            classroom_id: self.classroom_id.to_string(),
            student_id: student_id.map(str::to_string),
            date: self.date.to_string(),
            period: self.period.get(),
            points,
            description: description.map(str::to_string),
        });
    }
}

pub fn transform_period(
    entry: &PeriodEntry,
    period: Period,
    classroom_id: &str,
    date: &str,
    resolver: &EventTypeResolver,
    scoring: &ScoringTable,
) -> TransformOutput {
    let mut out = Emitter {
        resolver,
        classroom_id,
        date,
        period,
        events: Vec::new(),
        misses: BTreeSet::new(),
    };

    for (column, rows) in &entry.point_selections {
        let chosen: Vec<_> = rows.iter().filter(|r| r.student().is_some()).collect();
        if chosen.is_empty() {
            continue;
        }
        let Some(event_type) = out.resolve(CategoryKey::Point(*column)) else {
            continue;
        };
        let points = scoring.points_for(*column, event_type);
        for row in chosen {
            let description = if column.keeps_note() {
                row.note_text()
            } else {
                None
            };
            out.push(event_type, row.student(), points, description);
        }
    }

    if let Some(rating) = entry.lesson_rating {
        if let Some(event_type) = out.resolve(CategoryKey::Lesson(rating)) {
            out.push(event_type, None, event_type.default_points, None);
        }
    }

    for (kind, count) in &entry.class_violation_counts {
        if *count == 0 {
            continue;
        }
        let Some(event_type) = out.resolve(CategoryKey::ClassViolation(*kind)) else {
            continue;
        };
        // one event per occurrence, never a single multiplied event
        for _ in 0..*count {
            out.push(event_type, None, event_type.default_points, None);
        }
    }

    for row in &entry.student_violation_rows {
        let Some(student) = row.student() else {
            continue;
        };
        let Some(event_type) = out.resolve(CategoryKey::StudentViolation(row.kind)) else {
            continue;
        };
        out.push(event_type, Some(student), event_type.default_points, None);
    }

    TransformOutput {
        events: out.events,
        misses: out.misses.into_iter().collect(),
    }
}

pub fn transform_all_periods(
    matrix: &PeriodMatrixStore,
    resolver: &EventTypeResolver,
    scoring: &ScoringTable,
) -> Vec<(Period, TransformOutput)> {
    matrix
        .entries()
        .map(|(period, entry)| {
            (
                period,
                transform_period(
                    entry,
                    period,
                    matrix.classroom_id(),
                    matrix.date(),
                    resolver,
                    scoring,
                ),
            )
        })
        .collect()
}
