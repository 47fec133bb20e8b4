use crate::ids::{IdSet, StudentId};
use crate::reconcile::{ClassAttendanceState, ReasonKind};
use crate::roster::Student;
use serde::Serialize;

pub const UNION_HINT: &str = "This list only supports removing students (clearing checkboxes). \
To add an absentee, use the reason columns (unexcused, illness type A, other illness, family).";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerTarget {
    Reason(ReasonKind),
    AllAbsent,
}

impl PickerTarget {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "all" | "allAbsent" => Some(PickerTarget::AllAbsent),
            other => ReasonKind::parse(other).map(PickerTarget::Reason),
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            PickerTarget::Reason(kind) => kind.key(),
            PickerTarget::AllAbsent => "all",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickerItem {
    pub id: StudentId,
    pub label: String,
    pub disabled: bool,
}

/// Staged edit of one class row. Nothing reaches the row until `commit`.
#[derive(Debug, Clone)]
pub struct PickerSession {
    pub class_id: String,
    pub target: PickerTarget,
    staged: IdSet,
    /// Union snapshot taken at open; only set for `AllAbsent`.
    before_open: Option<IdSet>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Committed {
    Reason { kind: ReasonKind, moved: IdSet },
    Union { removed: IdSet, rejected: IdSet },
}

impl PickerSession {
    pub fn open(class_id: &str, target: PickerTarget, state: &ClassAttendanceState) -> Self {
        let (staged, before_open) = match target {
            PickerTarget::Reason(kind) => (state.reason_sets.get(kind).clone(), None),
            PickerTarget::AllAbsent => {
                let snapshot = state.all_absent.intersect(&state.union_of_reasons());
                (snapshot.clone(), Some(snapshot))
            }
        };
        Self {
            class_id: class_id.to_string(),
            target,
            staged,
            before_open,
        }
    }

    pub fn staged(&self) -> &IdSet {
        &self.staged
    }

    fn is_disabled(&self, id: StudentId) -> bool {
        self.before_open
            .as_ref()
            .map(|allowed| !allowed.contains(id))
            .unwrap_or(false)
    }

    /// Roster rows for the picker, sorted by name (case-insensitive).
    pub fn items(&self, roster: &[Student]) -> Vec<PickerItem> {
        let mut items: Vec<PickerItem> = roster
            .iter()
            .map(|s| PickerItem {
                id: s.id,
                label: s.display_name.clone(),
                disabled: self.is_disabled(s.id),
            })
            .collect();
        items.sort_by(|a, b| {
            a.label
                .to_lowercase()
                .cmp(&b.label.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        items
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self.target {
            PickerTarget::AllAbsent => Some(UNION_HINT),
            PickerTarget::Reason(_) => None,
        }
    }

    /// Changes the staged selection. Checking an id outside the union
    /// snapshot is refused.
    pub fn toggle(&mut self, id: StudentId, checked: bool) -> bool {
        if checked {
            if self.is_disabled(id) {
                return false;
            }
            self.staged.insert(id);
        } else {
            self.staged.remove(id);
        }
        true
    }

    pub fn replace_staged(&mut self, selected: IdSet) {
        self.staged = selected;
    }

    /// Applies the staged selection to the row in one step.
    pub fn commit(self, state: &mut ClassAttendanceState) -> Committed {
        match self.target {
            PickerTarget::Reason(kind) => {
                let out = state.replace_reason(kind, self.staged);
                Committed::Reason {
                    kind,
                    moved: out.moved,
                }
            }
            PickerTarget::AllAbsent => {
                let before = self.before_open.unwrap_or_default();
                let out = state.apply_union(&self.staged, &before);
                Committed::Union {
                    removed: out.removed,
                    rejected: out.rejected,
                }
            }
        }
    }
}
