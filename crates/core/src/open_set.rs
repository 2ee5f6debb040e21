use crate::model::SubjectKey;

/// Subjects the operator has open as tabs, in tab order, plus the active tab.
///
/// Every mutating method returns `true` when the caller must run a forced
/// refresh right away rather than wait for the next scheduled poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenSubjects {
    keys: Vec<SubjectKey>,
    active: Option<usize>,
}

impl OpenSubjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> &[SubjectKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: SubjectKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_key(&self) -> Option<SubjectKey> {
        self.active.and_then(|index| self.keys.get(index).copied())
    }

    /// Append `key` and make it active. Already-open keys are a no-op.
    #[must_use]
    pub fn add(&mut self, key: SubjectKey) -> bool {
        if self.contains(key) {
            return false;
        }
        self.keys.push(key);
        self.active = Some(self.keys.len() - 1);
        true
    }

    /// Remove `key` and repair the active index by position.
    ///
    /// With more than one tab open, the active index moves back by one when
    /// the removed tab sat at or before it (and it is not already the first).
    /// Closing the last tab leaves no active tab.
    #[must_use]
    pub fn close(&mut self, key: SubjectKey) -> bool {
        let Some(removed) = self.keys.iter().position(|k| *k == key) else {
            return false;
        };

        if self.keys.len() > 1 {
            if let Some(active) = self.active {
                if removed <= active && active > 0 {
                    self.active = Some(active - 1);
                }
            }
        } else {
            self.active = None;
        }

        self.keys.remove(removed);
        true
    }

    /// Make the tab at `index` active. Out-of-range indexes are ignored.
    #[must_use]
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.keys.len() {
            return false;
        }
        self.active = Some(index);
        true
    }

    /// Comma-joined key list in tab order, as sent in the `details` parameter.
    pub fn details_param(&self) -> String {
        join_keys(&self.keys)
    }
}

pub fn join_keys(keys: &[SubjectKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(keys: &[SubjectKey]) -> OpenSubjects {
        let mut set = OpenSubjects::new();
        for key in keys {
            assert!(set.add(*key));
        }
        set
    }

    #[test]
    fn add_appends_and_activates() {
        let mut set = OpenSubjects::new();
        assert_eq!(set.active_index(), None);
        assert!(set.add(4));
        assert!(set.add(1));
        assert_eq!(set.keys(), &[4, 1]);
        assert_eq!(set.active_index(), Some(1));
        assert_eq!(set.active_key(), Some(1));
    }

    #[test]
    fn add_existing_key_is_noop() {
        let mut set = open(&[4, 1]);
        assert!(set.select(0));
        assert!(!set.add(4));
        assert_eq!(set.keys(), &[4, 1]);
        assert_eq!(set.active_index(), Some(0));
    }

    #[test]
    fn closing_earlier_tab_keeps_same_subject_active() {
        // [A, B, C] with C active, close A -> [B, C] with C still active
        let mut set = open(&[10, 11, 12]);
        assert_eq!(set.active_index(), Some(2));
        assert!(set.close(10));
        assert_eq!(set.keys(), &[11, 12]);
        assert_eq!(set.active_index(), Some(1));
        assert_eq!(set.active_key(), Some(12));
    }

    #[test]
    fn closing_later_tab_leaves_active_index() {
        let mut set = open(&[10, 11, 12]);
        assert!(set.select(1));
        assert!(set.close(12));
        assert_eq!(set.keys(), &[10, 11]);
        assert_eq!(set.active_index(), Some(1));
    }

    #[test]
    fn closing_active_tab_moves_to_previous() {
        let mut set = open(&[10, 11, 12]);
        assert!(set.select(1));
        assert!(set.close(11));
        assert_eq!(set.active_key(), Some(10));
    }

    #[test]
    fn closing_first_active_tab_moves_to_next() {
        let mut set = open(&[10, 11]);
        assert!(set.select(0));
        assert!(set.close(10));
        assert_eq!(set.active_index(), Some(0));
        assert_eq!(set.active_key(), Some(11));
    }

    #[test]
    fn closing_last_tab_clears_active() {
        let mut set = open(&[10]);
        assert!(set.close(10));
        assert!(set.is_empty());
        assert_eq!(set.active_index(), None);
    }

    #[test]
    fn closing_unknown_key_is_noop() {
        let mut set = open(&[10, 11]);
        assert!(!set.close(99));
        assert_eq!(set.keys(), &[10, 11]);
        assert_eq!(set.active_index(), Some(1));
    }

    #[test]
    fn select_rejects_out_of_range() {
        let mut set = open(&[10, 11]);
        assert!(!set.select(2));
        assert_eq!(set.active_index(), Some(1));
        assert!(set.select(0));
        assert_eq!(set.active_index(), Some(0));
    }

    #[test]
    fn details_param_joins_in_tab_order() {
        let set = open(&[2, 7]);
        assert_eq!(set.details_param(), "2,7");
        assert_eq!(OpenSubjects::new().details_param(), "");
    }
}
