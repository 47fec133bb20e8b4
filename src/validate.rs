use crate::ids::StudentId;
use crate::reconcile::{ClassAttendanceState, PerReason, ReasonKind};
use serde::Serialize;
use std::collections::HashMap;

const DUPLICATE_PREVIEW: usize = 3;

pub const UNION_INCOMPLETE_MESSAGE: &str = "The all-absentees list must include every student \
from every reason list (unexcused, illness type A, other illness, family).";

pub const SUBMISSION_BLOCKED_MESSAGE: &str = "Fix the rows with errors: each absence count must \
match its student list, must not be negative and must not exceed the class roster. Every student \
in those lists must also be in the all-absentees list, and one student cannot be listed under \
more than one reason.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidFields {
    pub present: bool,
    pub reasons: PerReason<bool>,
}

impl InvalidFields {
    fn mark_all(&mut self) {
        self.present = true;
        for kind in ReasonKind::ALL {
            *self.reasons.get_mut(kind) = true;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Per-reason message lines; a field may carry several.
    pub reason_messages: PerReason<Vec<String>>,
    pub all_absent_messages: Vec<String>,
    pub invalid_fields: InvalidFields,
    pub duplicates: bool,
    /// A count or the derived present figure is outside `0..=totalStudents`.
    pub roster_violation: bool,
    /// `present + Σ counts > totalStudents`.
    pub overflow: bool,
    pub valid: bool,
}

impl ValidationResult {
    pub fn has_messages(&self) -> bool {
        !self.all_absent_messages.is_empty()
            || self.reason_messages.iter().any(|(_, m)| !m.is_empty())
    }
}

pub fn mismatch_message(kind: ReasonKind, count: i64, selected: usize) -> String {
    let label = kind.label();
    let mut chars = label.chars();
    let label = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    };
    format!(
        "{} count ({}) must match the number of selected students ({}).",
        label, count, selected
    )
}

pub fn duplicate_message(names: &[String], more: bool) -> String {
    format!(
        "A student cannot be listed under more than one reason. Duplicates: {}{}",
        names.join(", "),
        if more { "…" } else { "" }
    )
}

/// Validates one class row. Pure: the same state and names always give the
/// same result, and every violated rule is reported at once.
///
/// `label` renders a student for the duplicate preview.
pub fn validate(
    state: &ClassAttendanceState,
    mut label: impl FnMut(StudentId) -> String,
) -> ValidationResult {
    let mut result = ValidationResult::default();

    check_counts(state, &mut result);
    check_union(state, &mut result);
    check_duplicates(state, &mut label, &mut result);
    check_roster_bounds(state, &mut result);

    result.valid = !result.duplicates && !result.roster_violation && !result.has_messages();
    result
}

fn check_counts(state: &ClassAttendanceState, result: &mut ValidationResult) {
    for kind in ReasonKind::ALL {
        let count = *state.reason_counts.get(kind);
        let selected = state.reason_sets.get(kind).len();
        let bad = if count < 0 {
            true
        } else if count == 0 && selected == 0 {
            false
        } else {
            count != selected as i64
        };
        if bad {
            result
                .reason_messages
                .get_mut(kind)
                .push(mismatch_message(kind, count, selected));
            *result.invalid_fields.reasons.get_mut(kind) = true;
        }
    }
}

fn check_union(state: &ClassAttendanceState, result: &mut ValidationResult) {
    let union = state.union_of_reasons();
    if !union.is_empty() && !state.all_absent.is_superset(&union) {
        result
            .all_absent_messages
            .push(UNION_INCOMPLETE_MESSAGE.to_string());
    }
}

fn check_duplicates(
    state: &ClassAttendanceState,
    label: &mut impl FnMut(StudentId) -> String,
    result: &mut ValidationResult,
) {
    let mut seen: Vec<StudentId> = Vec::new();
    let mut hits: HashMap<StudentId, usize> = HashMap::new();
    for (_, set) in state.reason_sets.iter() {
        for id in set.iter() {
            let n = hits.entry(id).or_insert(0);
            if *n == 0 {
                seen.push(id);
            }
            *n += 1;
        }
    }
    let duplicated: Vec<StudentId> = seen
        .into_iter()
        .filter(|id| hits.get(id).copied().unwrap_or(0) > 1)
        .collect();
    if duplicated.is_empty() {
        return;
    }
    result.duplicates = true;

    for kind in ReasonKind::ALL {
        let set = state.reason_sets.get(kind);
        let ids: Vec<StudentId> = duplicated
            .iter()
            .copied()
            .filter(|id| set.contains(*id))
            .collect();
        if ids.is_empty() {
            continue;
        }
        let preview: Vec<String> = ids
            .iter()
            .take(DUPLICATE_PREVIEW)
            .map(|id| label(*id))
            .collect();
        result
            .reason_messages
            .get_mut(kind)
            .push(duplicate_message(&preview, ids.len() > DUPLICATE_PREVIEW));
        *result.invalid_fields.reasons.get_mut(kind) = true;
    }
}

fn check_roster_bounds(state: &ClassAttendanceState, result: &mut ValidationResult) {
    let total = state.total_students;
    if total == 0 {
        return;
    }
    let out_of_range = |v: i64| v < 0 || v > total;

    for kind in ReasonKind::ALL {
        if out_of_range(*state.reason_counts.get(kind)) {
            *result.invalid_fields.reasons.get_mut(kind) = true;
            result.roster_violation = true;
        }
    }
    let present = state.present_count();
    if out_of_range(present) {
        result.invalid_fields.present = true;
        result.roster_violation = true;
    }
    if present.saturating_add(state.absent_sum()) > total {
        result.invalid_fields.mark_all();
        result.overflow = true;
        result.roster_violation = true;
    }
}
