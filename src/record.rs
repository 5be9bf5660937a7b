use indexmap::IndexMap;
use serde::ser::SerializeMap as _;

use crate::value::Value;

/// Decoded reply of a chamber, keyed by parameter name in document order.
///
/// `env_var` and `env_val` describe the *last* element processed: the first `_`-separated
/// segment of its parameter name and its decoded value. For single-tag requests that is the tag
/// that was touched; for multi-tag requests it is simply whatever came last.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct StateRecord {
    #[serde(flatten)]
    pub values: IndexMap<String, Value>,
    pub chamber_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_val: Option<Value>,
}

impl StateRecord {
    pub fn new(chamber_id: u32) -> Self {
        Self { chamber_id, ..Default::default() }
    }

    pub fn get(&self, parameter: &str) -> Option<&Value> {
        self.values.get(parameter)
    }

    pub(crate) fn insert(&mut self, parameter: &str, value: Value) {
        let env_var = parameter.split('_').next().unwrap_or(parameter);
        self.env_var = Some(env_var.to_string());
        self.env_val = Some(value.clone());
        self.values.insert(parameter.to_string(), value);
    }

    /// Drop the `env_var`/`env_val` bookkeeping.
    pub fn strip_bookkeeping(&mut self) {
        self.env_var = None;
        self.env_val = None;
    }

    /// Rows of `(name, value)` for tabular output.
    pub fn rows(&self) -> Vec<Vec<String>> {
        let mut rows = self
            .values
            .iter()
            .map(|(k, v)| vec![k.clone(), v.to_string()])
            .collect::<Vec<_>>();
        rows.push(vec!["chamber_id".to_string(), self.chamber_id.to_string()]);
        rows
    }
}

/// Result of a request that the controller may not have answered in time.
///
/// Serializes as the reply itself, or as `{"type": "ConnectionError"}`.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<T = StateRecord> {
    Reply(T),
    ConnectionError,
}

impl<T> Outcome<T> {
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Outcome::ConnectionError)
    }

    pub fn reply(self) -> Option<T> {
        match self {
            Outcome::Reply(r) => Some(r),
            Outcome::ConnectionError => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Reply(r) => Outcome::Reply(f(r)),
            Outcome::ConnectionError => Outcome::ConnectionError,
        }
    }
}

impl<T: serde::Serialize> serde::Serialize for Outcome<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Outcome::Reply(r) => r.serialize(serializer),
            Outcome::ConnectionError => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("type", "ConnectionError")?;
                map.end()
            }
        }
    }
}
