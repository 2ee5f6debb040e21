use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Server-assigned subject identifier.
pub type SubjectKey = u64;

/// Server-assigned alert identifier.
pub type AlertId = i64;

/// A monitored subject as returned by `/domain` or `/subjects`.
///
/// Summary entries carry only the identifying fields; detail entries also
/// carry `features`, `cases` and `rulekits`. Anything else the server sends
/// is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub key: SubjectKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idtext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub casekeys: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cases: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rulekits: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Subject {
    pub fn summary(key: SubjectKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: Some(name.into()),
            idtext: None,
            casekeys: None,
            cases: None,
            features: None,
            rulekits: None,
            extra: Map::new(),
        }
    }

    /// True once the detail payload (features, cases and rulekits) is present.
    pub fn is_loaded(&self) -> bool {
        self.features.is_some() && self.cases.is_some() && self.rulekits.is_some()
    }

    /// Length of the pending case list: `cases` when present, else `casekeys`.
    pub fn case_count(&self) -> Option<usize> {
        self.cases
            .as_ref()
            .or(self.casekeys.as_ref())
            .map(Vec::len)
    }

    /// Display name, falling back to `idtext` and then the numeric key.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.idtext.clone())
            .unwrap_or_else(|| format!("subject {}", self.key))
    }

    /// Find a case in the detail payload by its key.
    pub fn find_case(&self, case_key: u64) -> Option<&Value> {
        self.cases
            .as_ref()?
            .iter()
            .find(|case| case.get("key").and_then(Value::as_u64) == Some(case_key))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    #[serde(default)]
    pub message: String,
}

/// Response of the `/alerts` poll: the server's current freshness markers
/// together with the full alert list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPoll {
    pub seq: u64,
    pub alertseq: u64,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

/// Whole-domain payload returned by `/domain`, used to seed the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainBootstrap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apiver: Option<i64>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub subjectkeys: Vec<SubjectKey>,
    #[serde(default)]
    pub subjects: Vec<Value>,
    pub seq: u64,
}

/// Subjects re-indexed by key from a raw server array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectBatch {
    pub subjects: BTreeMap<SubjectKey, Subject>,
    /// Elements that were not objects or did not carry a usable key.
    pub skipped: usize,
}

impl SubjectBatch {
    /// Re-index a raw subject array by subject key.
    ///
    /// Array position carries no meaning. Non-object elements and objects
    /// that do not decode as a subject are counted in `skipped` and otherwise
    /// treated as absent. A later duplicate key replaces an earlier one.
    pub fn index(elements: Vec<Value>) -> Self {
        let mut batch = Self::default();
        for element in elements {
            if !element.is_object() {
                batch.skipped += 1;
                continue;
            }
            match serde_json::from_value::<Subject>(element) {
                Ok(subject) => {
                    batch.subjects.insert(subject.key, subject);
                }
                Err(_) => batch.skipped += 1,
            }
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

/// Whether the most recent exchange with the server succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Connected,
    #[default]
    Disconnected,
}

impl Connectivity {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl std::fmt::Display for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Disconnected => f.write_str("disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn index_keys_by_subject_key_not_position() {
        let batch = SubjectBatch::index(vec![
            json!({"key": 9, "name": "S9"}),
            json!({"key": 2, "name": "S2"}),
        ]);
        let keys: Vec<_> = batch.subjects.keys().copied().collect();
        assert_eq!(keys, vec![2, 9]);
        assert_eq!(batch.subjects[&9].name.as_deref(), Some("S9"));
        assert_eq!(batch.skipped, 0);
    }

    #[test]
    fn index_skips_non_objects_and_keyless_entries() {
        let batch = SubjectBatch::index(vec![
            Value::Null,
            json!(17),
            json!("S1"),
            json!({"name": "no key"}),
            json!({"key": 3, "name": "S3"}),
        ]);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.skipped, 4);
        assert!(batch.subjects.contains_key(&3));
    }

    #[test]
    fn subject_keeps_unknown_fields() {
        let batch = SubjectBatch::index(vec![json!({
            "key": 4,
            "name": "AHU-4",
            "casekeys": [1, 2],
            "krono": {"key": 77}
        })]);
        let subject = &batch.subjects[&4];
        assert_eq!(subject.extra.get("krono"), Some(&json!({"key": 77})));
        assert_eq!(subject.case_count(), Some(2));
        assert!(!subject.is_loaded());
    }

    #[test]
    fn case_count_prefers_case_list() {
        let mut subject = Subject::summary(1, "S1");
        assert_eq!(subject.case_count(), None);
        subject.casekeys = Some(vec![json!(1), json!(2), json!(3)]);
        assert_eq!(subject.case_count(), Some(3));
        subject.cases = Some(vec![json!({"key": 1})]);
        assert_eq!(subject.case_count(), Some(1));
    }

    #[test]
    fn loaded_requires_all_detail_fields() {
        let mut subject = Subject::summary(1, "S1");
        subject.features = Some(json!([]));
        subject.cases = Some(vec![]);
        assert!(!subject.is_loaded());
        subject.rulekits = Some(json!([]));
        assert!(subject.is_loaded());
    }

    #[test]
    fn alert_poll_defaults_missing_alert_list() {
        let poll: AlertPoll = serde_json::from_value(json!({"seq": 5, "alertseq": 3})).unwrap();
        assert!(poll.alerts.is_empty());
    }
}
