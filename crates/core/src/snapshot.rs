use std::collections::BTreeMap;

use crate::model::{DomainBootstrap, Subject, SubjectBatch, SubjectKey};
use crate::validate::BootstrapError;

/// Last-known domain state: label, subject cache and the `seq` marker.
///
/// Before bootstrap the snapshot is empty and `label()` is `None`. After
/// bootstrap the subject cache only grows or is overwritten per key through
/// [`DomainSnapshot::upsert_many`]; a subject that leaves the open set keeps
/// its last detail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainSnapshot {
    label: Option<String>,
    seq: Option<u64>,
    subject_keys: Vec<SubjectKey>,
    subjects: BTreeMap<SubjectKey, Subject>,
}

impl DomainSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the whole-domain payload. Returns the re-indexed batch so the
    /// caller can project case counts from it.
    pub fn bootstrap(&mut self, domain: DomainBootstrap) -> Result<SubjectBatch, BootstrapError> {
        crate::validate::validate_bootstrap(&domain)?;

        let batch = SubjectBatch::index(domain.subjects);
        self.label = Some(domain.label);
        self.seq = Some(domain.seq);
        self.subject_keys = if domain.subjectkeys.is_empty() {
            batch.subjects.keys().copied().collect()
        } else {
            domain.subjectkeys
        };
        self.subjects = batch.subjects.clone();
        Ok(batch)
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.label.is_some()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn seq(&self) -> Option<u64> {
        self.seq
    }

    /// Advance `seq`. Lower values are ignored so the marker never regresses.
    pub fn advance_seq(&mut self, seq: u64) {
        if self.seq.is_none_or(|current| seq > current) {
            self.seq = Some(seq);
        }
    }

    pub fn get(&self, key: SubjectKey) -> Option<&Subject> {
        self.subjects.get(&key)
    }

    /// Replace each subject named in `entries`; every other key is untouched.
    pub fn upsert_many(&mut self, entries: BTreeMap<SubjectKey, Subject>) -> usize {
        let count = entries.len();
        for (key, subject) in entries {
            if !self.subject_keys.contains(&key) {
                self.subject_keys.push(key);
            }
            self.subjects.insert(key, subject);
        }
        count
    }

    /// Merge a detail batch fetched for `requested`.
    ///
    /// Requested keys are replaced outright. Other keys the server included
    /// replace the cached entry unless that would swap loaded detail for a
    /// bare summary.
    pub fn merge_details(&mut self, batch: SubjectBatch, requested: &[SubjectKey]) -> usize {
        let entries = batch
            .subjects
            .into_iter()
            .filter(|(key, incoming)| {
                requested.contains(key)
                    || incoming.is_loaded()
                    || !self.subjects.get(key).is_some_and(Subject::is_loaded)
            })
            .collect();
        self.upsert_many(entries)
    }

    /// Subject keys in the order the server announced them.
    pub fn subject_keys(&self) -> &[SubjectKey] {
        &self.subject_keys
    }

    pub fn subjects(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.values()
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// First subject whose display name matches `name` exactly.
    pub fn find_by_name(&self, name: &str) -> Option<&Subject> {
        self.subjects
            .values()
            .find(|subject| subject.name.as_deref() == Some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use serde_json::json;

    #[test]
    fn bootstrap_installs_label_seq_and_subjects() {
        let mut snapshot = DomainSnapshot::new();
        assert!(!snapshot.is_bootstrapped());

        snapshot
            .bootstrap(testing::domain("Line1", 5, vec![json!({"key": 2, "name": "S2"})]))
            .unwrap();

        assert_eq!(snapshot.label(), Some("Line1"));
        assert_eq!(snapshot.seq(), Some(5));
        assert_eq!(snapshot.get(2).and_then(|s| s.name.as_deref()), Some("S2"));
        assert_eq!(snapshot.subject_keys(), &[2]);
    }

    #[test]
    fn bootstrap_rejects_non_positive_apiver() {
        let mut snapshot = DomainSnapshot::new();
        let mut domain = testing::domain("Line1", 5, vec![]);
        domain.apiver = Some(0);

        assert!(snapshot.bootstrap(domain).is_err());
        assert!(!snapshot.is_bootstrapped());
        assert_eq!(snapshot.seq(), None);
    }

    #[test]
    fn upsert_many_leaves_other_keys_untouched() {
        let mut snapshot = DomainSnapshot::new();
        snapshot
            .bootstrap(testing::domain(
                "Line1",
                5,
                vec![
                    json!({"key": 2, "name": "S2"}),
                    json!({"key": 7, "name": "S7"}),
                    json!({"key": 9, "name": "S9", "cases": [], "features": [], "rulekits": []}),
                ],
            ))
            .unwrap();
        let cached_nine = snapshot.get(9).cloned();

        let mut batch = BTreeMap::new();
        batch.insert(2, testing::detailed_subject(2, "S2", 1));
        batch.insert(7, testing::detailed_subject(7, "S7", 0));
        assert_eq!(snapshot.upsert_many(batch), 2);

        assert!(snapshot.get(2).is_some_and(Subject::is_loaded));
        assert!(snapshot.get(7).is_some_and(Subject::is_loaded));
        assert_eq!(snapshot.get(9).cloned(), cached_nine);
    }

    #[test]
    fn merge_details_never_downgrades_unrequested_detail() {
        let mut snapshot = DomainSnapshot::new();
        snapshot.bootstrap(testing::domain("Line1", 5, vec![])).unwrap();
        let mut seeded = BTreeMap::new();
        seeded.insert(9, testing::detailed_subject(9, "S9", 2));
        snapshot.upsert_many(seeded);

        let batch = SubjectBatch::index(vec![
            json!({"key": 2, "name": "S2", "cases": [], "features": [], "rulekits": []}),
            json!({"key": 9, "name": "S9", "casekeys": [1]}),
            json!({"key": 11, "name": "S11", "casekeys": []}),
        ]);
        assert_eq!(snapshot.merge_details(batch, &[2]), 2);

        assert!(snapshot.get(2).is_some_and(Subject::is_loaded));
        assert!(snapshot.get(9).is_some_and(Subject::is_loaded));
        assert_eq!(snapshot.get(9).and_then(Subject::case_count), Some(2));
        assert_eq!(snapshot.get(11).and_then(|s| s.name.as_deref()), Some("S11"));
    }

    #[test]
    fn advance_seq_never_regresses() {
        let mut snapshot = DomainSnapshot::new();
        snapshot.advance_seq(6);
        snapshot.advance_seq(4);
        assert_eq!(snapshot.seq(), Some(6));
        snapshot.advance_seq(8);
        assert_eq!(snapshot.seq(), Some(8));
    }

    #[test]
    fn find_by_name_matches_exactly() {
        let mut snapshot = DomainSnapshot::new();
        snapshot
            .bootstrap(testing::domain(
                "Line1",
                1,
                vec![json!({"key": 3, "name": "VAV-3"}), json!({"key": 4, "name": "VAV-30"})],
            ))
            .unwrap();
        assert_eq!(snapshot.find_by_name("VAV-3").map(|s| s.key), Some(3));
        assert!(snapshot.find_by_name("vav-3").is_none());
    }
}
