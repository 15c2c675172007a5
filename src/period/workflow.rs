//! Step-wise entry across the seven periods of one (classroom, date).
//!
//! A `Session` owns the matrix and everything needed to commit it: the
//! resolver built from the event-type catalog, the scoring table, the roster
//! used to order rows, and the last events loaded from the store. Every
//! operation that talks to the store takes it explicitly.

use crate::period::materialize::{materialize, DEFAULT_CLASS_RULES_CATEGORY};
use crate::period::matrix::PeriodMatrixStore;
use crate::period::resolver::{CategoryMapping, EventTypeResolver};
use crate::period::sync::{self, fingerprint, CommitStrategy, SyncResult};
use crate::period::transform::{transform_all_periods, transform_period, ScoringTable, TransformOutput};
use crate::period::{parse_date, Period, PeriodError, ResolutionMiss, PERIOD_COUNT};
use crate::store::{EventQuery, EventStore, PersistedEvent, Student};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionMode {
    Create,
    Edit,
    View,
}

impl SessionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Create => "create",
            SessionMode::Edit => "edit",
            SessionMode::View => "view",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub mapping: CategoryMapping,
    pub scoring: ScoringTable,
    pub class_rules_category: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            mapping: CategoryMapping::new(),
            scoring: ScoringTable::default(),
            class_rules_category: DEFAULT_CLASS_RULES_CATEGORY.to_string(),
        }
    }
}

/// Outcome of committing one period. `skipped` means the desired set was
/// identical to the last successful commit, so nothing was written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodCommit {
    pub period: u8,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SyncResult>,
    pub misses: Vec<ResolutionMiss>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodFailure {
    pub period: u8,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSummary {
    pub saved: Vec<SyncResult>,
    pub unchanged: Vec<u8>,
    pub skipped: Vec<u8>,
    pub failed: Vec<PeriodFailure>,
    pub misses: Vec<ResolutionMiss>,
}

/// Structured notification returned by every workflow transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionReport {
    pub action: &'static str,
    pub ok: bool,
    pub period: u8,
    pub mode: SessionMode,
    pub current_period: u8,
    pub completed: [bool; PERIOD_COUNT],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<PeriodCommit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropped: Option<usize>,
    pub message: String,
}

pub struct Session {
    matrix: PeriodMatrixStore,
    resolver: EventTypeResolver,
    scoring: ScoringTable,
    class_rules_category: String,
    roster: Vec<Student>,
    events: Vec<PersistedEvent>,
    mode: SessionMode,
    current: Period,
    editing: Option<Period>,
    completed: [bool; PERIOD_COUNT],
    persisted: [usize; PERIOD_COUNT],
    committed: [Option<String>; PERIOD_COUNT],
}

fn load_events(
    store: &dyn EventStore,
    classroom_id: &str,
    date: &str,
) -> Result<Vec<PersistedEvent>, PeriodError> {
    store
        .list_events(&EventQuery {
            classroom_id: classroom_id.to_string(),
            date: date.to_string(),
            period: None,
        })
        .map_err(|e| PeriodError::remote("listEvents", None, e))
}

impl Session {
    /// Opens a Create-mode session. A date that already has persisted events
    /// resumes from them: the matrix is materialized and every period's
    /// current content counts as already committed.
    pub fn open(
        store: &dyn EventStore,
        classroom_id: &str,
        date: &str,
        settings: SessionSettings,
    ) -> Result<Session, PeriodError> {
        let date = parse_date(date)?;
        let catalog = store
            .list_event_types()
            .map_err(|e| PeriodError::remote("listEventTypes", None, e))?;
        let roster = store
            .list_students(classroom_id)
            .map_err(|e| PeriodError::remote("listStudents", None, e))?;
        let events = load_events(store, classroom_id, &date)?;

        let mut session = Session {
            matrix: PeriodMatrixStore::new(classroom_id, date.clone()),
            resolver: EventTypeResolver::new(catalog, settings.mapping),
            scoring: settings.scoring,
            class_rules_category: settings.class_rules_category,
            roster,
            events,
            mode: SessionMode::Create,
            current: Period::FIRST,
            editing: None,
            completed: [false; PERIOD_COUNT],
            persisted: [0; PERIOD_COUNT],
            committed: Default::default(),
        };
        session.rematerialize();
        for period in Period::all() {
            session.completed[period.index()] = session.persisted[period.index()] > 0;
        }
        info!(
            classroom_id,
            date = %date,
            events = session.events.len(),
            catalog = session.resolver.catalog().len(),
            "session opened"
        );
        Ok(session)
    }

    pub fn matrix(&self) -> &PeriodMatrixStore {
        &self.matrix
    }

    pub fn classroom_id(&self) -> &str {
        self.matrix.classroom_id()
    }

    pub fn date(&self) -> &str {
        self.matrix.date()
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn current(&self) -> Period {
        self.current
    }

    pub fn editing(&self) -> Option<Period> {
        self.editing
    }

    pub fn completed(&self) -> [bool; PERIOD_COUNT] {
        self.completed
    }

    pub fn persisted_counts(&self) -> [usize; PERIOD_COUNT] {
        self.persisted
    }

    pub fn resolver(&self) -> &EventTypeResolver {
        &self.resolver
    }

    pub fn roster(&self) -> &[Student] {
        &self.roster
    }

    pub fn events(&self) -> &[PersistedEvent] {
        &self.events
    }

    /// Rebuilds the resolver and scoring from new settings. The catalog is
    /// kept; matrix content is unaffected.
    pub fn reconfigure(&mut self, settings: SessionSettings) {
        self.resolver = EventTypeResolver::new(self.resolver.catalog().to_vec(), settings.mapping);
        self.scoring = settings.scoring;
        self.class_rules_category = settings.class_rules_category;
    }

    pub fn scoring(&self) -> &ScoringTable {
        &self.scoring
    }

    /// Mutable access to the matrix for edits to `period`.
    pub fn matrix_mut(&mut self, period: Period) -> Result<&mut PeriodMatrixStore, PeriodError> {
        match (self.mode, self.editing) {
            (SessionMode::View, _) => Err(PeriodError::ReadOnly),
            (SessionMode::Edit, Some(editing)) if editing != period => Err(PeriodError::PeriodLocked {
                period: period.get(),
                editing: editing.get(),
            }),
            _ => Ok(&mut self.matrix),
        }
    }

    pub fn preview(&self, period: Period) -> TransformOutput {
        transform_period(
            self.matrix.entry(period),
            period,
            self.matrix.classroom_id(),
            self.matrix.date(),
            &self.resolver,
            &self.scoring,
        )
    }

    pub fn preview_all(&self) -> Vec<(Period, TransformOutput)> {
        transform_all_periods(&self.matrix, &self.resolver, &self.scoring)
    }

    /// Rebuilds the matrix from `self.events` and takes its content as the
    /// committed baseline of every period.
    fn rematerialize(&mut self) -> usize {
        let m = materialize(
            &self.events,
            &self.resolver,
            &self.roster,
            self.matrix.classroom_id(),
            self.matrix.date(),
            &self.class_rules_category,
        );
        self.matrix = m.matrix;
        self.refresh_persisted_counts();
        for period in Period::all() {
            self.committed[period.index()] = if self.persisted[period.index()] > 0 {
                Some(fingerprint(&self.preview(period).events))
            } else {
                None
            };
        }
        if m.dropped > 0 {
            warn!(dropped = m.dropped, "persisted events not representable in the matrix");
        }
        m.dropped
    }

    fn refresh_persisted_counts(&mut self) {
        let mut counts = [0usize; PERIOD_COUNT];
        for e in &self.events {
            if let Some(p) = e.period.and_then(|p| Period::new(p as i64).ok()) {
                counts[p.index()] += 1;
            }
        }
        self.persisted = counts;
    }

    fn reload(&mut self, store: &dyn EventStore) -> Result<(), PeriodError> {
        self.events = load_events(store, self.matrix.classroom_id(), self.matrix.date())?;
        self.refresh_persisted_counts();
        Ok(())
    }

    fn strategy_for(&self, period: Period) -> CommitStrategy {
        let i = period.index();
        if self.mode == SessionMode::Create && self.persisted[i] == 0 && self.committed[i].is_none() {
            CommitStrategy::BulkCreate
        } else {
            CommitStrategy::DiffSync
        }
    }

    /// Commits one period. Create mode skips a period whose desired set is
    /// unchanged since its last commit; Edit mode always syncs.
    fn commit_period(&mut self, store: &dyn EventStore, period: Period) -> Result<PeriodCommit, PeriodError> {
        let out = self.preview(period);
        let fp = fingerprint(&out.events);
        let i = period.index();
        if self.mode == SessionMode::Create && self.committed[i].as_deref() == Some(fp.as_str()) {
            return Ok(PeriodCommit {
                period: period.get(),
                skipped: true,
                result: None,
                misses: out.misses,
            });
        }
        let strategy = self.strategy_for(period);
        let desired_count = out.events.len();
        let result = sync::commit(
            store,
            strategy,
            self.matrix.classroom_id(),
            self.matrix.date(),
            period,
            out.events,
        )?;
        self.committed[i] = Some(fp);
        self.persisted[i] = desired_count;
        self.completed[i] = true;
        Ok(PeriodCommit {
            period: period.get(),
            skipped: false,
            result: Some(result),
            misses: out.misses,
        })
    }

    fn report(
        &self,
        action: &'static str,
        period: Period,
        commit: Option<PeriodCommit>,
        dropped: Option<usize>,
        message: impl Into<String>,
    ) -> TransitionReport {
        TransitionReport {
            action,
            ok: true,
            period: period.get(),
            mode: self.mode,
            current_period: self.current.get(),
            completed: self.completed,
            commit,
            dropped,
            message: message.into(),
        }
    }

    pub fn advance(&mut self, store: &dyn EventStore) -> Result<TransitionReport, PeriodError> {
        let period = self.current;
        let mut commit = None;
        match self.mode {
            SessionMode::Edit => {
                return Err(PeriodError::EditInProgress(
                    self.editing.unwrap_or(period).get(),
                ))
            }
            SessionMode::View => {}
            SessionMode::Create => {
                if self.matrix.entry(period).lesson_rating.is_some() {
                    let c = self.commit_period(store, period)?;
                    self.completed[period.index()] = true;
                    commit = Some(c);
                }
            }
        }
        if let Some(next) = period.next() {
            self.current = next;
        }
        let message = match &commit {
            Some(c) if c.skipped => format!("period {} unchanged", period),
            Some(_) => format!("period {} saved", period),
            None => format!("period {} passed without saving", period),
        };
        info!(period = period.get(), mode = self.mode.as_str(), "advance");
        Ok(self.report("advance", period, commit, None, message))
    }

    pub fn retreat(&mut self) -> Result<TransitionReport, PeriodError> {
        if let (SessionMode::Edit, Some(editing)) = (self.mode, self.editing) {
            return Err(PeriodError::EditInProgress(editing.get()));
        }
        let period = self.current;
        if let Some(prev) = period.prev() {
            self.current = prev;
        }
        Ok(self.report("retreat", period, None, None, format!("back to period {}", self.current)))
    }

    /// Loads every event of the date and materializes all periods, so a later
    /// save does not lose other periods' data.
    pub fn enter_edit(&mut self, store: &dyn EventStore, period: Period) -> Result<TransitionReport, PeriodError> {
        if let Some(editing) = self.editing {
            return Err(PeriodError::EditInProgress(editing.get()));
        }
        self.reload(store)?;
        let previous_mode = self.mode;
        self.mode = SessionMode::Edit;
        let dropped = self.rematerialize();
        self.editing = Some(period);
        self.current = period;
        info!(period = period.get(), from = previous_mode.as_str(), "edit started");
        Ok(self.report(
            "enterEdit",
            period,
            None,
            Some(dropped),
            format!("editing period {}", period),
        ))
    }

    pub fn save_edit(&mut self, store: &dyn EventStore) -> Result<TransitionReport, PeriodError> {
        let Some(period) = self.editing else {
            return Err(PeriodError::NotEditing);
        };
        let commit = self.commit_period(store, period)?;
        self.mode = SessionMode::Create;
        self.editing = None;
        self.current = period;
        let dropped = match self.reload(store) {
            Ok(()) => Some(self.rematerialize()),
            Err(e) => {
                warn!(period = period.get(), error = %e, "reload after edit failed");
                None
            }
        };
        self.completed[period.index()] = true;
        info!(period = period.get(), "edit saved");
        Ok(self.report(
            "saveEdit",
            period,
            Some(commit),
            dropped,
            format!("period {} saved", period),
        ))
    }

    /// Abandons an edit without writing and restores the last loaded state.
    pub fn cancel_edit(&mut self) -> Result<TransitionReport, PeriodError> {
        let Some(period) = self.editing else {
            return Err(PeriodError::NotEditing);
        };
        self.mode = SessionMode::Create;
        self.editing = None;
        let dropped = self.rematerialize();
        Ok(self.report(
            "cancelEdit",
            period,
            None,
            Some(dropped),
            format!("edit of period {} discarded", period),
        ))
    }

    pub fn enter_view(&mut self, store: &dyn EventStore) -> Result<TransitionReport, PeriodError> {
        if let Some(editing) = self.editing {
            return Err(PeriodError::EditInProgress(editing.get()));
        }
        self.reload(store)?;
        self.mode = SessionMode::View;
        let dropped = self.rematerialize();
        Ok(self.report("enterView", self.current, None, Some(dropped), "read-only view"))
    }

    /// Leaves view mode; the materialized matrix becomes the resume point.
    pub fn enter_create(&mut self) -> Result<TransitionReport, PeriodError> {
        if let Some(editing) = self.editing {
            return Err(PeriodError::EditInProgress(editing.get()));
        }
        self.mode = SessionMode::Create;
        Ok(self.report("enterCreate", self.current, None, None, "entry mode"))
    }

    /// Commits every period with data, in period order. Periods already
    /// saved in this call stay saved when a later one fails. On full success
    /// the matrix is rebuilt from the store and navigation returns to period 1.
    pub fn submit_all(&mut self, store: &dyn EventStore) -> Result<SubmitSummary, PeriodError> {
        if self.mode != SessionMode::Create {
            return Err(PeriodError::WrongMode {
                action: "submitAll",
                expected: "create",
            });
        }
        if !self.matrix.any_lesson_rating() {
            return Err(PeriodError::IncompleteSubmission);
        }

        let mut summary = SubmitSummary::default();
        for period in Period::all() {
            if !self.matrix.entry(period).has_data() {
                summary.skipped.push(period.get());
                continue;
            }
            match self.commit_period(store, period) {
                Ok(c) => {
                    summary.misses.extend(c.misses.iter().copied());
                    match c.result {
                        Some(r) => summary.saved.push(r),
                        None => summary.unchanged.push(c.period),
                    }
                }
                Err(e) => {
                    warn!(period = period.get(), error = %e, "period failed during submit");
                    summary.failed.push(PeriodFailure {
                        period: period.get(),
                        message: e.to_string(),
                    });
                }
            }
        }
        summary.misses.sort();
        summary.misses.dedup();

        if !summary.failed.is_empty() {
            return Err(PeriodError::PartialBatchFailure(summary));
        }

        // The matrix is reset to what the store now holds, so a later Create
        // save of a submitted period diffs against exactly those events.
        self.current = Period::FIRST;
        match self.reload(store) {
            Ok(()) => {
                self.rematerialize();
            }
            Err(e) => warn!(error = %e, "reload after submit failed; keeping submitted matrix"),
        }
        info!(
            saved = summary.saved.len(),
            unchanged = summary.unchanged.len(),
            "submission complete"
        );
        Ok(summary)
    }
}
