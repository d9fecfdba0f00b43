//! Feature extraction and the structural check run before scoring.
//!
//! Every task is encoded as exactly [`FEATURE_COUNT`] values in the order of
//! [`FEATURE_NAMES`]. Scorers and persisted artifacts are written against this
//! order.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::error::TaskError;
use crate::task::Task;

pub const FEATURE_COUNT: usize = 5;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "days_left",
    "urgency_score",
    "dependency_count",
    "normalized_urgency",
    "status_overdue",
];

/// The single accepted deadline format.
pub const DEADLINE_FORMAT: &str = "%Y-%m-%d";

const SECONDS_PER_DAY: i64 = 86_400;

/// Validated feature vector, in [`FEATURE_NAMES`] order.
pub type Features = [f64; FEATURE_COUNT];

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Int(i64),
    Float(f64),
    /// A raw input that was not a JSON number. Fails validation.
    NonNumeric(Value),
}

impl FeatureValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Int(n) => Some(*n as f64),
            FeatureValue::Float(x) => Some(*x),
            FeatureValue::NonNumeric(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, FeatureValue::NonNumeric(_))
    }

    fn from_field(raw: Option<&Value>, default: FeatureValue) -> FeatureValue {
        match raw {
            None | Some(Value::Null) => default,
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => FeatureValue::Int(i),
                None => n
                    .as_f64()
                    .map(FeatureValue::Float)
                    .unwrap_or_else(|| FeatureValue::NonNumeric(Value::Number(n.clone()))),
            },
            Some(other) => FeatureValue::NonNumeric(other.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<FeatureValue>);

impl FeatureVector {
    pub fn new(values: Vec<FeatureValue>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Turn the vector into scorer input, or say why it cannot be one.
    ///
    /// This is the pre-condition the engine checks before every scorer call.
    pub fn to_features(&self) -> Result<Features, TaskError> {
        if self.0.len() != FEATURE_COUNT {
            return Err(TaskError::FeatureMismatch {
                expected: FEATURE_COUNT,
                got: self.0.len(),
            });
        }

        let mut out = [0.0; FEATURE_COUNT];
        for (index, value) in self.0.iter().enumerate() {
            out[index] = match value {
                FeatureValue::Int(n) => *n as f64,
                FeatureValue::Float(x) => *x,
                FeatureValue::NonNumeric(raw) => {
                    return Err(TaskError::NonNumericFeature {
                        index,
                        name: FEATURE_NAMES[index].to_string(),
                        value: raw.to_string(),
                    });
                }
            };
        }
        Ok(out)
    }
}

/// Encode one task against the reference time `now`.
///
/// Pure: the same task and `now` always give the same vector. Fields that
/// cannot be encoded (non-numeric urgency, a non-list `dependencies`, a
/// non-text `status`) come out as [`FeatureValue::NonNumeric`].
pub fn extract_features(task: &Task, now: NaiveDateTime) -> FeatureVector {
    let dependency_count = match task.dependency_ids() {
        Ok(ids) => FeatureValue::Int(ids.len() as i64),
        Err(_) => FeatureValue::NonNumeric(task.dependencies.clone().unwrap_or_default()),
    };
    let overdue = match &task.status {
        None | Some(Value::String(_)) => FeatureValue::Int(i64::from(task.is_overdue())),
        Some(other) => FeatureValue::NonNumeric(other.clone()),
    };

    FeatureVector(vec![
        FeatureValue::Int(days_left(task.deadline.as_ref(), now)),
        FeatureValue::from_field(task.urgency_score.as_ref(), FeatureValue::Int(0)),
        dependency_count,
        FeatureValue::from_field(task.normalized_urgency.as_ref(), FeatureValue::Float(0.0)),
        overdue,
    ])
}

/// Whole days from `now` until local midnight of the deadline date, floored.
///
/// A missing, non-string or unparsable deadline counts as 0 days left.
pub fn days_left(deadline: Option<&Value>, now: NaiveDateTime) -> i64 {
    let Some(raw) = deadline.and_then(Value::as_str) else {
        return 0;
    };
    let Ok(date) = NaiveDate::parse_from_str(raw, DEADLINE_FORMAT) else {
        return 0;
    };
    let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
        return 0;
    };
    (midnight - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Structural check: exactly [`FEATURE_COUNT`] values, all numeric.
///
/// Ranges are not checked: negative `days_left` or an out-of-range
/// `normalized_urgency` still pass.
pub fn validate_features(features: &FeatureVector) -> bool {
    features.len() == FEATURE_COUNT && features.values().iter().all(FeatureValue::is_numeric)
}
