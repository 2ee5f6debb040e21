//! Request and response types for the expert-system console REST API.
//!
//! The server speaks plain JSON over HTTP. Payload shapes that the sync
//! engine reasons about (`/alerts`, `/domain`) live in `eaconsole-core` and are
//! re-exported here so callers only need one import path.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use eaconsole_core::{AlertPoll, DomainBootstrap as DomainResponse, SubjectKey};

// ─── Paths ───────────────────────────────────────────────────────────────────

pub mod paths {
    pub const NOOP: &str = "/noop";
    pub const DOMAIN: &str = "/domain";
    pub const ALERTS: &str = "/alerts";
    pub const SUBJECTS: &str = "/subjects";
    pub const SET_KNOB: &str = "/set/knob";
    pub const SET_HISTOGRAM: &str = "/set/histogram";
    pub const ANSWER_CASE: &str = "/ctrl/answercase";
    pub const SET_TIME: &str = "/ctrl/time";
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// Response of `/subjects?details=...`.
///
/// A missing `subjects` array decodes as empty; individual elements stay raw
/// so malformed entries can be skipped one by one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubjectsResponse {
    #[serde(default)]
    pub subjects: Vec<Value>,
}

/// Every reply carries the API version; `/noop` carries nothing else.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NoopResponse {
    #[serde(default)]
    pub apiver: Option<i64>,
}

// ─── Mutations ───────────────────────────────────────────────────────────────

/// Body of `/set/knob` and `/set/histogram/{mode|span}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetValueRequest {
    pub key: u64,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerCaseRequest {
    pub subject: SubjectKey,
    pub case: u64,
    pub answer: u64,
}

/// Body of `PUT /ctrl/time`: seconds since the epoch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetTimeRequest {
    pub time: f64,
}

/// Reply to a mutating call.
///
/// Servers report the outcome through some mix of a numeric `status`, a
/// `returncode` and a `success` flag; `status` may also be a message string.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub returncode: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub apiver: Option<i64>,
}

impl StatusResponse {
    /// Whether the server accepted the mutation.
    ///
    /// `success` wins when present, then a numeric `status` (200 is success),
    /// then a numeric `returncode` (0 is success). A reply with none of these
    /// and no `error` counts as accepted.
    pub fn is_success(&self) -> bool {
        if let Some(success) = self.success {
            return success;
        }
        if let Some(status) = self.status.as_ref().and_then(Value::as_i64) {
            return status == 200;
        }
        if let Some(code) = self.returncode.as_ref().and_then(Value::as_i64) {
            return code == 0;
        }
        self.error.is_none()
    }

    /// Human-readable detail for logs and CLI output.
    pub fn message(&self) -> String {
        if let Some(error) = &self.error {
            return error.clone();
        }
        match (&self.status, &self.returncode) {
            (Some(Value::String(status)), _) => status.clone(),
            (Some(status), _) => format!("status {status}"),
            (None, Some(code)) => format!("returncode {code}"),
            (None, None) => "no status".to_string(),
        }
    }
}
