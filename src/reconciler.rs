use crate::ids::{IdSet, StudentId};
use crate::picker::{Committed, PickerItem, PickerSession, PickerTarget};
use crate::reconcile::{ClassAttendanceState, PerReason, PersistedRow, ReasonKind, UnionOutcome};
use crate::roster::{InMemoryDirectory, NameCache, StudentDirectory};
use crate::validate::{validate, ValidationResult, SUBMISSION_BLOCKED_MESSAGE};
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct RowSession {
    date: NaiveDate,
    state: ClassAttendanceState,
}

/// Comma-joined fields handed to the form-submission side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFields {
    pub reason_ids: PerReason<String>,
    pub all_absent_ids: String,
    pub counts: PerReason<i64>,
    pub present_count: i64,
}

impl FormFields {
    fn from_state(state: &ClassAttendanceState) -> Self {
        Self {
            reason_ids: PerReason::from_fn(|k| state.reason_sets.get(k).join()),
            all_absent_ids: state.all_absent.join(),
            counts: state.reason_counts.clone(),
            present_count: state.present_count(),
        }
    }
}

/// Everything the renderer needs after a committed change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowView {
    pub class_id: String,
    pub date: String,
    pub state: ClassAttendanceState,
    pub present_count: i64,
    pub validation: ValidationResult,
    pub form: FormFields,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickerOpened {
    pub picker_id: String,
    pub class_id: String,
    pub target: &'static str,
    pub selected_ids: IdSet,
    pub items: Vec<PickerItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionCheck {
    pub blocked: bool,
    pub invalid_class_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerError {
    UnknownSession,
    RowClosed,
}

/// Owns every open class row plus the picker sessions staged against them.
/// Rows never interact with each other.
pub struct Reconciler<D: StudentDirectory> {
    directory: D,
    names: NameCache,
    rows: HashMap<String, RowSession>,
    pickers: HashMap<Uuid, PickerSession>,
}

impl Reconciler<InMemoryDirectory> {
    /// Installs a roster and drops the cached names for that class.
    pub fn load_roster(
        &mut self,
        class_id: &str,
        entries: impl IntoIterator<Item = (StudentId, String)>,
        total_students: Option<i64>,
    ) -> usize {
        let kept = self.directory.load_class(class_id, entries, total_students);
        self.names.invalidate(class_id);
        info!(
            "event=roster_load class_id={} students={} status=ok",
            class_id, kept
        );
        kept
    }

    pub fn has_roster(&self, class_id: &str) -> bool {
        self.directory.has_class(class_id)
    }
}

impl<D: StudentDirectory> Reconciler<D> {
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            names: NameCache::new(),
            rows: HashMap::new(),
            pickers: HashMap::new(),
        }
    }

    pub fn open_row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn open_picker_count(&self) -> usize {
        self.pickers.len()
    }

    fn build_view(&mut self, class_id: &str) -> Option<RowView> {
        let row = self.rows.get(class_id)?;
        Some(render(&mut self.names, &self.directory, class_id, row))
    }

    /// Materializes a row for editing. Reopening replaces the previous
    /// session and abandons its pickers.
    pub fn open_row(
        &mut self,
        class_id: &str,
        date: NaiveDate,
        total_students: Option<i64>,
        persisted: PersistedRow,
    ) -> RowView {
        self.drop_pickers_for(class_id);
        let total = total_students
            .or_else(|| self.directory.roster_size(class_id))
            .unwrap_or(0);
        let row = RowSession {
            date,
            state: ClassAttendanceState::materialize(persisted, total),
        };
        let view = render(&mut self.names, &self.directory, class_id, &row);
        self.rows.insert(class_id.to_string(), row);
        info!(
            "event=row_open class_id={} date={} total_students={} status=ok",
            class_id, date, total
        );
        view
    }

    pub fn view(&mut self, class_id: &str) -> Option<RowView> {
        self.build_view(class_id)
    }

    /// Ends editing; the row is discarded and its final form returned.
    pub fn close_row(&mut self, class_id: &str) -> Option<FormFields> {
        let row = self.rows.remove(class_id)?;
        self.drop_pickers_for(class_id);
        info!("event=row_close class_id={} status=ok", class_id);
        Some(FormFields::from_state(&row.state))
    }

    fn drop_pickers_for(&mut self, class_id: &str) {
        let before = self.pickers.len();
        self.pickers.retain(|_, p| p.class_id != class_id);
        let dropped = before - self.pickers.len();
        if dropped > 0 {
            debug!(
                "event=picker_drop class_id={} sessions={}",
                class_id, dropped
            );
        }
    }

    pub fn replace_reason(
        &mut self,
        class_id: &str,
        kind: ReasonKind,
        candidate: IdSet,
    ) -> Option<RowView> {
        let row = self.rows.get_mut(class_id)?;
        let out = row.state.replace_reason(kind, candidate);
        debug!(
            "event=reason_replace class_id={} reason={} size={} moved={}",
            class_id,
            kind.key(),
            row.state.reason_sets.get(kind).len(),
            out.moved.len()
        );
        self.build_view(class_id)
    }

    /// Removal-only union edit. Without a snapshot the current union is
    /// used; a supplied snapshot can only narrow it.
    pub fn apply_union(
        &mut self,
        class_id: &str,
        candidate: &IdSet,
        before_open: Option<&IdSet>,
    ) -> Option<(RowView, UnionOutcome)> {
        let row = self.rows.get_mut(class_id)?;
        let before = match before_open {
            Some(b) => b.intersect(&row.state.all_absent),
            None => row.state.all_absent.clone(),
        };
        let out = row.state.apply_union(candidate, &before);
        log_union(class_id, &out.removed, &out.rejected);
        let view = self.build_view(class_id)?;
        Some((view, out))
    }

    /// Typed count edit; only re-validates.
    pub fn set_count(&mut self, class_id: &str, kind: ReasonKind, value: i64) -> Option<RowView> {
        let row = self.rows.get_mut(class_id)?;
        row.state.set_typed_count(kind, value);
        debug!(
            "event=count_set class_id={} reason={} value={}",
            class_id,
            kind.key(),
            value
        );
        self.build_view(class_id)
    }

    pub fn validate_row(&mut self, class_id: &str) -> Option<ValidationResult> {
        self.build_view(class_id).map(|v| v.validation)
    }

    /// Submission gate for one row. A row that is not open has nothing to
    /// block.
    pub fn is_row_valid(&mut self, class_id: &str) -> bool {
        self.validate_row(class_id).map(|v| v.valid).unwrap_or(true)
    }

    pub fn is_any_row_invalid(&mut self, class_ids: &[String]) -> bool {
        class_ids.iter().any(|id| !self.is_row_valid(id))
    }

    pub fn open_class_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.rows.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn submission_check(&mut self, class_ids: &[String]) -> SubmissionCheck {
        let invalid_class_ids: Vec<String> = class_ids
            .iter()
            .filter(|id| !self.is_row_valid(id))
            .cloned()
            .collect();
        let blocked = !invalid_class_ids.is_empty();
        if blocked {
            info!(
                "event=submit_check status=blocked invalid_rows={}",
                invalid_class_ids.len()
            );
        }
        SubmissionCheck {
            blocked,
            invalid_class_ids,
            message: blocked.then_some(SUBMISSION_BLOCKED_MESSAGE),
        }
    }

    pub fn open_picker(&mut self, class_id: &str, target: PickerTarget) -> Option<PickerOpened> {
        let row = self.rows.get(class_id)?;
        let session = PickerSession::open(class_id, target, &row.state);
        let id = Uuid::new_v4();
        let opened = PickerOpened {
            picker_id: id.to_string(),
            class_id: class_id.to_string(),
            target: target.key(),
            selected_ids: session.staged().clone(),
            items: session.items(&self.directory.students(class_id)),
            hint: session.hint(),
        };
        self.pickers.insert(id, session);
        debug!(
            "event=picker_open class_id={} target={} picker_id={}",
            class_id,
            target.key(),
            id
        );
        Some(opened)
    }

    /// Returns whether the toggle was applied, plus the staged selection.
    pub fn toggle_picker(
        &mut self,
        picker_id: &Uuid,
        student: StudentId,
        checked: bool,
    ) -> Option<(bool, IdSet)> {
        let session = self.pickers.get_mut(picker_id)?;
        let applied = session.toggle(student, checked);
        Some((applied, session.staged().clone()))
    }

    pub fn cancel_picker(&mut self, picker_id: &Uuid) -> bool {
        let cancelled = self.pickers.remove(picker_id).is_some();
        if cancelled {
            debug!("event=picker_cancel picker_id={}", picker_id);
        }
        cancelled
    }

    /// Commits a staged selection atomically and closes the session.
    pub fn confirm_picker(
        &mut self,
        picker_id: &Uuid,
        selected: Option<IdSet>,
    ) -> Result<(RowView, Committed), PickerError> {
        let mut session = self
            .pickers
            .remove(picker_id)
            .ok_or(PickerError::UnknownSession)?;
        let class_id = session.class_id.clone();
        let row = self
            .rows
            .get_mut(&class_id)
            .ok_or(PickerError::RowClosed)?;
        if let Some(selected) = selected {
            session.replace_staged(selected);
        }
        let committed = session.commit(&mut row.state);
        match &committed {
            Committed::Reason { kind, moved } => debug!(
                "event=picker_confirm class_id={} target={} moved={}",
                class_id,
                kind.key(),
                moved.len()
            ),
            Committed::Union { removed, rejected } => log_union(&class_id, removed, rejected),
        }
        let view = self
            .build_view(&class_id)
            .ok_or(PickerError::RowClosed)?;
        Ok((view, committed))
    }
}

fn render<D: StudentDirectory>(
    names: &mut NameCache,
    directory: &D,
    class_id: &str,
    row: &RowSession,
) -> RowView {
    RowView {
        class_id: class_id.to_string(),
        date: row.date.format("%Y-%m-%d").to_string(),
        state: row.state.clone(),
        present_count: row.state.present_count(),
        validation: validate(&row.state, |id| names.label(directory, class_id, id)),
        form: FormFields::from_state(&row.state),
    }
}

fn log_union(class_id: &str, removed: &IdSet, rejected: &IdSet) {
    debug!(
        "event=union_apply class_id={} removed={}",
        class_id,
        removed.len()
    );
    if !rejected.is_empty() {
        warn!(
            "event=union_add_rejected class_id={} count={}",
            class_id,
            rejected.len()
        );
    }
}
