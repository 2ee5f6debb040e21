use serde_json::{Value, json};

use crate::{Alert, AlertId, DomainBootstrap, Subject, SubjectKey};

/// `/domain` payload with the given label, `seq` and raw subject array.
pub fn domain(label: &str, seq: u64, subjects: Vec<Value>) -> DomainBootstrap {
    DomainBootstrap {
        apiver: None,
        label: label.to_string(),
        subjectkeys: Vec::new(),
        subjects,
        seq,
    }
}

/// Fully loaded subject with `cases` placeholder cases keyed `0..cases`.
pub fn detailed_subject(key: SubjectKey, name: &str, cases: usize) -> Subject {
    let mut subject = Subject::summary(key, name);
    subject.cases = Some((0..cases).map(|i| json!({ "key": i })).collect());
    subject.features = Some(json!([]));
    subject.rulekits = Some(json!([]));
    subject
}

pub fn alert(id: AlertId, message: &str) -> Alert {
    Alert {
        id,
        message: message.to_string(),
    }
}
