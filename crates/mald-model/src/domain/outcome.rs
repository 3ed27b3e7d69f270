use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ModelError;

/// Classifier output: an opaque JSON object.
///
/// The subsystem never looks inside; it stores and returns the mapping as-is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outcome(Map<String, Value>);

impl Outcome {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    #[inline]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl TryFrom<Value> for Outcome {
    type Error = ModelError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            _ => Err(ModelError::OutcomeNotObject),
        }
    }
}

impl From<Outcome> for Value {
    fn from(outcome: Outcome) -> Self {
        outcome.into_value()
    }
}
