use crate::ids::IdSet;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReasonKind {
    Unexcused,
    IllnessA,
    IllnessOther,
    Family,
}

impl ReasonKind {
    pub const ALL: [ReasonKind; 4] = [
        ReasonKind::Unexcused,
        ReasonKind::IllnessA,
        ReasonKind::IllnessOther,
        ReasonKind::Family,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ReasonKind::Unexcused => "unexcused",
            ReasonKind::IllnessA => "illnessA",
            ReasonKind::IllnessOther => "illnessOther",
            ReasonKind::Family => "family",
        }
    }

    /// Accepts the wire keys plus the legacy form-field names.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "unexcused" => Some(ReasonKind::Unexcused),
            "illnessA" | "orvi" => Some(ReasonKind::IllnessA),
            "illnessOther" | "other" | "otherDisease" => Some(ReasonKind::IllnessOther),
            "family" => Some(ReasonKind::Family),
            _ => None,
        }
    }

    /// Noun phrase used in count-mismatch messages.
    pub fn label(self) -> &'static str {
        match self {
            ReasonKind::Unexcused => "unexcused absences",
            ReasonKind::IllnessA => "illness (type A) cases",
            ReasonKind::IllnessOther => "other illness cases",
            ReasonKind::Family => "family-reason absences",
        }
    }
}

/// One value per reason, serialized as `{unexcused, illnessA, illnessOther, family}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerReason<T> {
    pub unexcused: T,
    pub illness_a: T,
    pub illness_other: T,
    pub family: T,
}

impl<T> PerReason<T> {
    pub fn from_fn(mut f: impl FnMut(ReasonKind) -> T) -> Self {
        Self {
            unexcused: f(ReasonKind::Unexcused),
            illness_a: f(ReasonKind::IllnessA),
            illness_other: f(ReasonKind::IllnessOther),
            family: f(ReasonKind::Family),
        }
    }

    pub fn get(&self, kind: ReasonKind) -> &T {
        match kind {
            ReasonKind::Unexcused => &self.unexcused,
            ReasonKind::IllnessA => &self.illness_a,
            ReasonKind::IllnessOther => &self.illness_other,
            ReasonKind::Family => &self.family,
        }
    }

    pub fn get_mut(&mut self, kind: ReasonKind) -> &mut T {
        match kind {
            ReasonKind::Unexcused => &mut self.unexcused,
            ReasonKind::IllnessA => &mut self.illness_a,
            ReasonKind::IllnessOther => &mut self.illness_other,
            ReasonKind::Family => &mut self.family,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReasonKind, &T)> + '_ {
        ReasonKind::ALL.into_iter().map(move |k| (k, self.get(k)))
    }
}

/// Values restored from storage when a row enters edit mode.
#[derive(Debug, Clone, Default)]
pub struct PersistedRow {
    pub reason_sets: PerReason<IdSet>,
    pub all_absent: IdSet,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAttendanceState {
    pub reason_sets: PerReason<IdSet>,
    pub all_absent: IdSet,
    pub reason_counts: PerReason<i64>,
    /// Set once a count has been synced from its student list.
    pub count_derived: PerReason<bool>,
    pub total_students: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// Ids taken away from other reasons (last writer wins).
    pub moved: IdSet,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnionOutcome {
    pub removed: IdSet,
    /// Ids the caller tried to add through the union view.
    pub rejected: IdSet,
}

impl ClassAttendanceState {
    pub fn new(total_students: i64) -> Self {
        Self {
            total_students,
            ..Self::default()
        }
    }

    /// Builds the editable state: persisted lists are already sanitized,
    /// counts are re-synced from list sizes and the union is re-derived.
    pub fn materialize(persisted: PersistedRow, total_students: i64) -> Self {
        let mut state = Self {
            reason_sets: persisted.reason_sets,
            all_absent: persisted.all_absent,
            ..Self::new(total_students)
        };
        for kind in ReasonKind::ALL {
            state.sync_count(kind);
        }
        state.rederive_union();
        state
    }

    pub fn union_of_reasons(&self) -> IdSet {
        self.reason_sets
            .iter()
            .flat_map(|(_, set)| set.iter())
            .collect()
    }

    pub fn rederive_union(&mut self) {
        self.all_absent = self.union_of_reasons();
    }

    fn sync_count(&mut self, kind: ReasonKind) {
        *self.reason_counts.get_mut(kind) = self.reason_sets.get(kind).len() as i64;
        *self.count_derived.get_mut(kind) = true;
    }

    pub fn absent_sum(&self) -> i64 {
        self.reason_counts
            .iter()
            .fold(0i64, |acc, (_, c)| acc.saturating_add(*c))
    }

    /// `totalStudents - Σ counts`, clamped at zero.
    pub fn present_count(&self) -> i64 {
        let sum = self.absent_sum();
        if sum <= self.total_students {
            self.total_students.saturating_sub(sum)
        } else {
            0
        }
    }

    /// Bulk replace of one reason's students.
    pub fn replace_reason(&mut self, kind: ReasonKind, candidate: IdSet) -> ReplaceOutcome {
        let mut moved = IdSet::new();
        for other in ReasonKind::ALL.into_iter().filter(|k| *k != kind) {
            let taken = self.reason_sets.get(other).intersect(&candidate);
            if taken.is_empty() {
                continue;
            }
            self.reason_sets.get_mut(other).remove_all(&taken);
            self.sync_count(other);
            for id in taken.iter() {
                moved.insert(id);
            }
        }

        *self.reason_sets.get_mut(kind) = candidate;
        self.sync_count(kind);
        self.rederive_union();
        ReplaceOutcome { moved }
    }

    /// Removal-only edit of the all-absentees view.
    ///
    /// `before` is the union as it was when the view opened. Anything in
    /// `candidate` outside of it is rejected; anything in it but missing
    /// from `candidate` leaves every reason list.
    pub fn apply_union(&mut self, candidate: &IdSet, before: &IdSet) -> UnionOutcome {
        let rejected = candidate.difference(before);
        let kept = candidate.intersect(before);
        let removed = before.difference(&kept);

        if !removed.is_empty() {
            for kind in ReasonKind::ALL {
                if self.reason_sets.get_mut(kind).remove_all(&removed) > 0 {
                    self.sync_count(kind);
                }
            }
        }
        self.rederive_union();
        UnionOutcome { removed, rejected }
    }

    /// Direct typed edit of a count. The list is left alone; a mismatch is
    /// for the validator to report.
    pub fn set_typed_count(&mut self, kind: ReasonKind, value: i64) {
        *self.reason_counts.get_mut(kind) = value;
    }
}
