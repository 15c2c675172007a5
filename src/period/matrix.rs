use crate::period::catalog::{ClassViolation, LessonRating, PointColumn, StudentViolation};
use crate::period::{Period, PeriodError, PERIOD_COUNT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// A row in a point column. A row without a student is a placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointRow {
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl PointRow {
    pub fn new(student_id: Option<String>, note: Option<String>) -> Self {
        PointRow { student_id, note }
    }

    pub fn student(&self) -> Option<&str> {
        non_blank(&self.student_id)
    }

    pub fn note_text(&self) -> Option<&str> {
        non_blank(&self.note)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentViolationRow {
    #[serde(default)]
    pub student_id: Option<String>,
    pub kind: StudentViolation,
}

impl StudentViolationRow {
    pub fn student(&self) -> Option<&str> {
        non_blank(&self.student_id)
    }
}

/// Everything selected for one period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodEntry {
    #[serde(default)]
    pub point_selections: BTreeMap<PointColumn, Vec<PointRow>>,
    #[serde(default)]
    pub lesson_rating: Option<LessonRating>,
    #[serde(default)]
    pub class_violation_counts: BTreeMap<ClassViolation, u32>,
    #[serde(default)]
    pub student_violation_rows: Vec<StudentViolationRow>,
}

impl PeriodEntry {
    /// True when the period would produce at least one event.
    pub fn has_data(&self) -> bool {
        self.lesson_rating.is_some()
            || self
                .point_selections
                .values()
                .flatten()
                .any(|r| r.student().is_some())
            || self.class_violation_counts.values().any(|c| *c > 0)
            || self
                .student_violation_rows
                .iter()
                .any(|r| r.student().is_some())
    }

    pub fn class_violation_count(&self, kind: ClassViolation) -> u32 {
        self.class_violation_counts.get(&kind).copied().unwrap_or(0)
    }

    /// Same entry with placeholder rows, zero counters and empty columns
    /// removed, and surviving ids and notes trimmed.
    #[cfg(test)]
    pub fn normalized(&self) -> PeriodEntry {
        let mut point_selections = BTreeMap::new();
        for (column, rows) in &self.point_selections {
            let kept: Vec<PointRow> = rows
                .iter()
                .filter_map(|r| {
                    r.student().map(|s| PointRow {
                        student_id: Some(s.to_string()),
                        note: r.note_text().map(str::to_string),
                    })
                })
                .collect();
            if !kept.is_empty() {
                point_selections.insert(*column, kept);
            }
        }
        PeriodEntry {
            point_selections,
            lesson_rating: self.lesson_rating,
            class_violation_counts: self
                .class_violation_counts
                .iter()
                .filter(|(_, c)| **c > 0)
                .map(|(k, c)| (*k, *c))
                .collect(),
            student_violation_rows: self
                .student_violation_rows
                .iter()
                .filter_map(|r| {
                    r.student().map(|s| StudentViolationRow {
                        student_id: Some(s.to_string()),
                        kind: r.kind,
                    })
                })
                .collect(),
        }
    }
}

/// Session-owned matrix for one (classroom, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodMatrixStore {
    classroom_id: String,
    date: String,
    periods: [PeriodEntry; PERIOD_COUNT],
}

impl PeriodMatrixStore {
    pub fn new(classroom_id: impl Into<String>, date: impl Into<String>) -> Self {
        PeriodMatrixStore {
            classroom_id: classroom_id.into(),
            date: date.into(),
            periods: std::array::from_fn(|_| PeriodEntry::default()),
        }
    }

    pub fn classroom_id(&self) -> &str {
        &self.classroom_id
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn entry(&self, period: Period) -> &PeriodEntry {
        &self.periods[period.index()]
    }

    pub fn entry_mut(&mut self, period: Period) -> &mut PeriodEntry {
        &mut self.periods[period.index()]
    }

    pub fn entries(&self) -> impl Iterator<Item = (Period, &PeriodEntry)> {
        Period::all().zip(self.periods.iter())
    }

    pub fn any_lesson_rating(&self) -> bool {
        self.periods.iter().any(|p| p.lesson_rating.is_some())
    }

    pub fn reset(&mut self) {
        for p in self.periods.iter_mut() {
            *p = PeriodEntry::default();
        }
    }

    pub fn clear_period(&mut self, period: Period) {
        *self.entry_mut(period) = PeriodEntry::default();
    }

    pub fn add_point_row(&mut self, period: Period, column: PointColumn, row: PointRow) -> usize {
        let rows = self
            .entry_mut(period)
            .point_selections
            .entry(column)
            .or_default();
        rows.push(row);
        rows.len() - 1
    }

    pub fn update_point_row(
        &mut self,
        period: Period,
        column: PointColumn,
        index: usize,
        row: PointRow,
    ) -> Result<(), PeriodError> {
        let slot = self
            .entry_mut(period)
            .point_selections
            .get_mut(&column)
            .and_then(|rows| rows.get_mut(index))
            .ok_or(PeriodError::RowOutOfRange {
                period: period.get(),
                index,
            })?;
        *slot = row;
        Ok(())
    }

    pub fn remove_point_row(
        &mut self,
        period: Period,
        column: PointColumn,
        index: usize,
    ) -> Result<PointRow, PeriodError> {
        let entry = self.entry_mut(period);
        let Some(rows) = entry.point_selections.get_mut(&column) else {
            return Err(PeriodError::RowOutOfRange {
                period: period.get(),
                index,
            });
        };
        if index >= rows.len() {
            return Err(PeriodError::RowOutOfRange {
                period: period.get(),
                index,
            });
        }
        let removed = rows.remove(index);
        if rows.is_empty() {
            entry.point_selections.remove(&column);
        }
        Ok(removed)
    }

    /// Selecting a rating replaces any previous one; `None` clears it.
    pub fn select_lesson_rating(&mut self, period: Period, rating: Option<LessonRating>) {
        self.entry_mut(period).lesson_rating = rating;
    }

    /// Applies `delta` to a counter, saturating at zero. Returns the new count.
    pub fn adjust_class_violation(
        &mut self,
        period: Period,
        kind: ClassViolation,
        delta: i64,
    ) -> u32 {
        let current = self.entry(period).class_violation_count(kind) as i64;
        let next = (current + delta).clamp(0, u32::MAX as i64) as u32;
        self.set_class_violation(period, kind, next);
        next
    }

    pub fn set_class_violation(&mut self, period: Period, kind: ClassViolation, count: u32) {
        let counts = &mut self.entry_mut(period).class_violation_counts;
        if count == 0 {
            counts.remove(&kind);
        } else {
            counts.insert(kind, count);
        }
    }

    pub fn add_student_violation_row(&mut self, period: Period, row: StudentViolationRow) -> usize {
        let rows = &mut self.entry_mut(period).student_violation_rows;
        rows.push(row);
        rows.len() - 1
    }

    pub fn update_student_violation_row(
        &mut self,
        period: Period,
        index: usize,
        row: StudentViolationRow,
    ) -> Result<(), PeriodError> {
        let slot = self
            .entry_mut(period)
            .student_violation_rows
            .get_mut(index)
            .ok_or(PeriodError::RowOutOfRange {
                period: period.get(),
                index,
            })?;
        *slot = row;
        Ok(())
    }

    pub fn remove_student_violation_row(
        &mut self,
        period: Period,
        index: usize,
    ) -> Result<StudentViolationRow, PeriodError> {
        let rows = &mut self.entry_mut(period).student_violation_rows;
        if index >= rows.len() {
            return Err(PeriodError::RowOutOfRange {
                period: period.get(),
                index,
            });
        }
        Ok(rows.remove(index))
    }
}
