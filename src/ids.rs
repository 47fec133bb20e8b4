use serde::{Deserialize, Serialize};
use std::fmt;

/// Positive student identifier, unique within a school.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(u64);

impl StudentId {
    pub fn new(raw: u64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Accepts digits only. Sentinel tokens ("None", "null", "undefined"),
    /// signs, blanks and zero are rejected.
    pub fn parse_token(token: &str) -> Option<Self> {
        let t = token.trim();
        if t.is_empty() || !t.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        t.parse::<u64>().ok().and_then(Self::new)
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Insertion-ordered set of student ids.
///
/// Order carries no meaning for reconciliation; it only keeps emitted
/// lists and joined strings deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IdSet {
    ids: Vec<StudentId>,
}

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: StudentId) -> bool {
        self.ids.contains(&id)
    }

    /// Returns false when the id was already present.
    pub fn insert(&mut self, id: StudentId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn remove(&mut self, id: StudentId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|x| *x != id);
        before != self.ids.len()
    }

    /// Removes every id in `other`; returns how many were dropped.
    pub fn remove_all(&mut self, other: &IdSet) -> usize {
        let before = self.ids.len();
        self.ids.retain(|id| !other.contains(*id));
        before - self.ids.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = StudentId> + '_ {
        self.ids.iter().copied()
    }

    pub fn is_superset(&self, other: &IdSet) -> bool {
        other.iter().all(|id| self.contains(id))
    }

    /// Keeps only ids also present in `allowed`, preserving this set's order.
    pub fn intersect(&self, allowed: &IdSet) -> IdSet {
        self.iter().filter(|id| allowed.contains(*id)).collect()
    }

    /// Ids of `self` missing from `other`, in `self`'s order.
    pub fn difference(&self, other: &IdSet) -> IdSet {
        self.iter().filter(|id| !other.contains(*id)).collect()
    }

    /// Comma-joined form used by the form-submission collaborator.
    pub fn join(&self) -> String {
        self.ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromIterator<StudentId> for IdSet {
    fn from_iter<T: IntoIterator<Item = StudentId>>(iter: T) -> Self {
        let mut out = IdSet::new();
        for id in iter {
            out.insert(id);
        }
        out
    }
}

/// Sanitizes raw tokens into an id set: garbage is dropped silently and
/// duplicates keep their first-seen position.
pub fn sanitize_tokens<'a, I>(tokens: I) -> IdSet
where
    I: IntoIterator<Item = &'a str>,
{
    tokens
        .into_iter()
        .flat_map(|t| t.split(','))
        .filter_map(StudentId::parse_token)
        .collect()
}

/// Parses a comma-joined id list ("3, 1,,None,3" -> [3, 1]).
pub fn parse_id_list(raw: &str) -> IdSet {
    sanitize_tokens([raw])
}

/// Reads an id list from a JSON parameter.
///
/// Accepts a comma-joined string, a single number, or an array mixing
/// numbers and strings. Anything else sanitizes to an empty set.
pub fn ids_from_json(v: Option<&serde_json::Value>) -> IdSet {
    let Some(v) = v else {
        return IdSet::new();
    };
    match v {
        serde_json::Value::String(s) => parse_id_list(s),
        serde_json::Value::Number(_) => json_scalar_id(v).into_iter().collect(),
        serde_json::Value::Array(items) => {
            let mut out = IdSet::new();
            for item in items {
                match item {
                    serde_json::Value::String(s) => {
                        for id in parse_id_list(s).iter() {
                            out.insert(id);
                        }
                    }
                    other => {
                        if let Some(id) = json_scalar_id(other) {
                            out.insert(id);
                        }
                    }
                }
            }
            out
        }
        _ => IdSet::new(),
    }
}

/// A single id from a JSON number or string.
pub fn json_scalar_id(v: &serde_json::Value) -> Option<StudentId> {
    match v {
        serde_json::Value::Number(n) => n.as_u64().and_then(StudentId::new),
        serde_json::Value::String(s) => StudentId::parse_token(s),
        _ => None,
    }
}

/// Lenient integer parse for typed count fields: blank or non-numeric
/// text reads as 0, a leading integer prefix is honoured ("12abc" -> 12).
pub fn parse_count_text(raw: &str) -> i64 {
    let t = raw.trim();
    let mut end = 0;
    for (i, ch) in t.char_indices() {
        let sign_ok = i == 0 && (ch == '-' || ch == '+');
        if ch.is_ascii_digit() || sign_ok {
            end = i + ch.len_utf8();
        } else {
            break;
        }
    }
    let digits = &t[..end];
    match digits.parse::<i64>() {
        Ok(v) => v,
        // Too many digits for i64: keep the sign and saturate.
        Err(_) if digits.bytes().any(|b| b.is_ascii_digit()) => {
            if digits.starts_with('-') {
                i64::MIN
            } else {
                i64::MAX
            }
        }
        Err(_) => 0,
    }
}
