//! Operator controls: knob values, histogram parameters and case answers.
//!
//! Values are clamped locally before they are sent; nothing here rejects
//! input outright.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::Subject;

/// How a knob interprets its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KnobKind {
    Boolean,
    Integer,
    Float,
    Unsigned,
    SelectFromList,
    Other(String),
}

impl KnobKind {
    pub fn parse(type_name: &str) -> Self {
        match type_name {
            "Knob_takesGuiFpnAsBoolean" => Self::Boolean,
            "Knob_takesGuiFpnAsInteger" => Self::Integer,
            "Knob_takesGuiFpnAsFloat" => Self::Float,
            "Knob_takesGuiUin" => Self::Unsigned,
            "Knob_selectsGuiFpnFromList" => Self::SelectFromList,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A tunable parameter as carried in subject detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Knob {
    pub key: u64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub idtext: Option<String>,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub range_min: Option<f64>,
    #[serde(default)]
    pub range_max: Option<f64>,
    #[serde(default)]
    pub options: Vec<f64>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub units: Option<String>,
}

impl Knob {
    pub fn kind(&self) -> KnobKind {
        KnobKind::parse(&self.type_name)
    }

    /// Bring `requested` into the knob's domain.
    pub fn clamp(&self, requested: f64) -> f64 {
        match self.kind() {
            KnobKind::Boolean => {
                if requested != 0.0 && !requested.is_nan() {
                    1.0
                } else {
                    0.0
                }
            }
            KnobKind::Integer => self.clamp_to_range(requested.round()),
            KnobKind::Unsigned => self.clamp_to_range(requested.round()).max(0.0),
            KnobKind::SelectFromList => self.nearest_option(requested),
            KnobKind::Float | KnobKind::Other(_) => self.clamp_to_range(requested),
        }
    }

    fn clamp_to_range(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.range_min.unwrap_or(0.0);
        }
        let mut clamped = value;
        if let Some(max) = self.range_max {
            clamped = clamped.min(max);
        }
        if let Some(min) = self.range_min {
            clamped = clamped.max(min);
        }
        clamped
    }

    fn nearest_option(&self, requested: f64) -> f64 {
        self.options
            .iter()
            .copied()
            .min_by(|a, b| (a - requested).abs().total_cmp(&(b - requested).abs()))
            .unwrap_or(requested)
    }
}

/// Find a knob by key anywhere in a subject's detail payload.
pub fn find_knob<'a>(subjects: impl IntoIterator<Item = &'a Subject>, key: u64) -> Option<Knob> {
    subjects.into_iter().find_map(|subject| {
        [subject.rulekits.as_ref(), subject.features.as_ref()]
            .into_iter()
            .flatten()
            .chain(subject.cases.iter().flatten())
            .chain(subject.extra.values())
            .find_map(|value| find_knob_in(value, key))
    })
}

fn find_knob_in(value: &Value, key: u64) -> Option<Knob> {
    match value {
        Value::Object(map) => {
            if let Some(Value::Array(knobs)) = map.get("knobs") {
                let found = knobs
                    .iter()
                    .find(|knob| knob.get("key").and_then(Value::as_u64) == Some(key))
                    .and_then(|knob| serde_json::from_value(knob.clone()).ok());
                if found.is_some() {
                    return found;
                }
            }
            map.values().find_map(|child| find_knob_in(child, key))
        }
        Value::Array(items) => items.iter().find_map(|child| find_knob_in(child, key)),
        _ => None,
    }
}

/// Which histogram parameter a `/set/histogram/{param}` call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistogramParam {
    Mode,
    Span,
}

impl HistogramParam {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mode => "mode",
            Self::Span => "span",
        }
    }
}

impl std::fmt::Display for HistogramParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Histogram mode and span are zero-based option indexes.
pub fn clamp_option_index(requested: f64) -> u64 {
    if requested.is_nan() || requested <= 0.0 {
        0
    } else {
        requested.round() as u64
    }
}

/// Clamp a case answer to the options the cached case offers.
///
/// Without a cached case (or without options) the answer is sent as given.
pub fn clamp_answer(case: Option<&Value>, answer: u64) -> u64 {
    let option_count = case
        .and_then(|case| case.get("options"))
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    if option_count == 0 {
        answer
    } else {
        answer.min(option_count as u64 - 1)
    }
}
