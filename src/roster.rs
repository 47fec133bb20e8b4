use crate::ids::StudentId;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub display_name: String,
}

/// Read-only student reference data, looked up per class.
pub trait StudentDirectory {
    fn students(&self, class_id: &str) -> Vec<Student>;

    fn lookup_name(&self, class_id: &str, student_id: StudentId) -> Option<String> {
        self.students(class_id)
            .into_iter()
            .find(|s| s.id == student_id)
            .map(|s| s.display_name)
    }

    /// Roster size used when a row opens without an explicit total.
    fn roster_size(&self, class_id: &str) -> Option<i64>;
}

#[derive(Debug, Clone, Default)]
struct ClassRoster {
    students: Vec<Student>,
    total_students: i64,
}

/// Directory fed by `roster.load`.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    classes: HashMap<String, ClassRoster>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs (or replaces) a class roster and returns how many students
    /// were kept. Entries with a blank name are skipped, as are repeated ids.
    pub fn load_class(
        &mut self,
        class_id: &str,
        entries: impl IntoIterator<Item = (StudentId, String)>,
        total_students: Option<i64>,
    ) -> usize {
        let mut students: Vec<Student> = Vec::new();
        for (id, name) in entries {
            let name = name.trim();
            if name.is_empty() || students.iter().any(|s| s.id == id) {
                continue;
            }
            students.push(Student {
                id,
                display_name: name.to_string(),
            });
        }
        let kept = students.len();
        let total_students = total_students.unwrap_or(kept as i64);
        self.classes.insert(
            class_id.to_string(),
            ClassRoster {
                students,
                total_students,
            },
        );
        kept
    }

    pub fn has_class(&self, class_id: &str) -> bool {
        self.classes.contains_key(class_id)
    }
}

impl StudentDirectory for InMemoryDirectory {
    fn students(&self, class_id: &str) -> Vec<Student> {
        self.classes
            .get(class_id)
            .map(|c| c.students.clone())
            .unwrap_or_default()
    }

    fn lookup_name(&self, class_id: &str, student_id: StudentId) -> Option<String> {
        self.classes
            .get(class_id)?
            .students
            .iter()
            .find(|s| s.id == student_id)
            .map(|s| s.display_name.clone())
    }

    fn roster_size(&self, class_id: &str) -> Option<i64> {
        self.classes.get(class_id).map(|c| c.total_students)
    }
}

/// Read-through id -> name cache, one map per class. Misses are cached too,
/// so an unknown id costs one directory lookup until the class is invalidated.
#[derive(Debug, Default)]
pub struct NameCache {
    by_class: HashMap<String, HashMap<StudentId, Option<String>>>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name<D: StudentDirectory + ?Sized>(
        &mut self,
        directory: &D,
        class_id: &str,
        student_id: StudentId,
    ) -> Option<String> {
        self.by_class
            .entry(class_id.to_string())
            .or_default()
            .entry(student_id)
            .or_insert_with(|| directory.lookup_name(class_id, student_id))
            .clone()
    }

    /// Display label with the `ID <n>` fallback for unknown students.
    pub fn label<D: StudentDirectory + ?Sized>(
        &mut self,
        directory: &D,
        class_id: &str,
        student_id: StudentId,
    ) -> String {
        self.name(directory, class_id, student_id)
            .unwrap_or_else(|| format!("ID {}", student_id))
    }

    pub fn invalidate(&mut self, class_id: &str) {
        self.by_class.remove(class_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(n: u64) -> StudentId {
        StudentId::new(n).expect("positive id")
    }

    fn directory() -> InMemoryDirectory {
        let mut d = InMemoryDirectory::new();
        d.load_class(
            "7A",
            vec![
                (sid(1), "Ivanova Anna".to_string()),
                (sid(2), "  ".to_string()),
                (sid(3), " Petrov Oleg ".to_string()),
                (sid(1), "Duplicate".to_string()),
            ],
            Some(30),
        );
        d
    }

    #[test]
    fn load_class_skips_blank_names_and_repeated_ids() {
        let d = directory();
        let students = d.students("7A");
        assert_eq!(students.len(), 2);
        assert_eq!(d.lookup_name("7A", sid(3)).as_deref(), Some("Petrov Oleg"));
        assert_eq!(d.lookup_name("7A", sid(2)), None);
        assert_eq!(d.roster_size("7A"), Some(30));
        assert_eq!(d.roster_size("missing"), None);
    }

    #[test]
    fn total_defaults_to_kept_students() {
        let mut d = InMemoryDirectory::new();
        d.load_class("1B", vec![(sid(4), "Orlova Mila".to_string())], None);
        assert_eq!(d.roster_size("1B"), Some(1));
    }

    #[test]
    fn name_cache_reads_through_until_invalidated() {
        let mut d = directory();
        let mut cache = NameCache::new();
        assert_eq!(cache.label(&d, "7A", sid(1)), "Ivanova Anna");
        assert_eq!(cache.label(&d, "7A", sid(9)), "ID 9");

        d.load_class("7A", vec![(sid(1), "Smirnova Anna".to_string())], None);
        // Stale until the owner invalidates on roster change.
        assert_eq!(cache.label(&d, "7A", sid(1)), "Ivanova Anna");
        cache.invalidate("7A");
        assert_eq!(cache.label(&d, "7A", sid(1)), "Smirnova Anna");
    }
}
