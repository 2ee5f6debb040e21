use std::collections::BTreeMap;

use crate::model::{Subject, SubjectKey};

/// Map each subject to the length of its case list. Subjects without any case
/// list are left out.
pub fn project(subjects: &BTreeMap<SubjectKey, Subject>) -> BTreeMap<SubjectKey, usize> {
    subjects
        .iter()
        .filter_map(|(key, subject)| subject.case_count().map(|count| (*key, count)))
        .collect()
}

/// Published per-subject pending-case counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseCounts {
    published: BTreeMap<SubjectKey, usize>,
}

impl CaseCounts {
    /// Recompute from a freshly fetched batch.
    ///
    /// The projection replaces the published map only when some count differs
    /// from the published value or a key is new. Returns whether it did.
    pub fn refresh(&mut self, subjects: &BTreeMap<SubjectKey, Subject>) -> bool {
        let projected = project(subjects);
        let changed = projected
            .iter()
            .any(|(key, count)| self.published.get(key) != Some(count));
        if changed {
            self.published = projected;
        }
        changed
    }

    pub fn get(&self, key: SubjectKey) -> Option<usize> {
        self.published.get(&key).copied()
    }

    pub fn as_map(&self) -> &BTreeMap<SubjectKey, usize> {
        &self.published
    }
}
