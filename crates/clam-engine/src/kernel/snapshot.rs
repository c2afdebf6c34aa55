use std::fmt;

use serde_json::{Map, Value};

/// Persisted option values of a kernel: an ordered key → value record.
///
/// Stored as a JSON object with one string field per option, e.g.
/// `{"ITERS": "128", "SCALE": ""}`. Numbers and booleans are accepted when
/// loading and kept as their text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSnapshot {
    entries: Vec<(String, String)>,
}

impl OptionSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, replacing an earlier one with the same key.
    pub fn push(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }

    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(&self.to_json()).map_err(SnapshotError::Json)
    }

    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        let value: Value = serde_json::from_str(text).map_err(SnapshotError::Json)?;
        let Value::Object(map) = value else {
            return Err(SnapshotError::NotAnObject);
        };
        let mut snapshot = Self::new();
        for (key, value) in map {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => return Err(SnapshotError::InvalidValue(key)),
            };
            snapshot.push(&key, &text);
        }
        Ok(snapshot)
    }
}

/// Outcome of restoring a snapshot into a kernel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Entries written to the option map.
    pub applied: usize,
    /// Keys the kernel does not declare; likely a snapshot of another kernel.
    pub unknown: Vec<String>,
}

impl RestoreReport {
    pub fn had_warnings(&self) -> bool {
        !self.unknown.is_empty()
    }
}

/// Error reading a persisted snapshot.
#[derive(Debug)]
pub enum SnapshotError {
    Json(serde_json::Error),
    NotAnObject,
    /// Field holds an array or object.
    InvalidValue(String),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(e) => write!(f, "option snapshot is not valid JSON: {e}"),
            Self::NotAnObject => write!(f, "option snapshot must be a JSON object"),
            Self::InvalidValue(key) => {
                write!(f, "option snapshot field `{key}` must be a string, number or bool")
            }
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_keeps_declared_order() {
        let mut snapshot = OptionSnapshot::new();
        snapshot.push("ZOOM", "2");
        snapshot.push("ITERS", "");
        snapshot.push("AA", "4");
        let text = snapshot.to_json_pretty().unwrap();
        let back = OptionSnapshot::from_json(&text).unwrap();
        let keys: Vec<_> = back.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["ZOOM", "ITERS", "AA"]);
        assert_eq!(back, snapshot);
    }

    #[test]
    fn scalars_are_kept_as_text() {
        let snapshot = OptionSnapshot::from_json(r#"{"N": 64, "FAST": true, "X": null}"#).unwrap();
        assert_eq!(snapshot.get("N"), Some("64"));
        assert_eq!(snapshot.get("FAST"), Some("true"));
        assert_eq!(snapshot.get("X"), Some(""));
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(
            OptionSnapshot::from_json("[1, 2]"),
            Err(SnapshotError::NotAnObject)
        ));
        assert!(matches!(
            OptionSnapshot::from_json(r#"{"A": [1]}"#),
            Err(SnapshotError::InvalidValue(k)) if k == "A"
        ));
        assert!(matches!(
            OptionSnapshot::from_json("{"),
            Err(SnapshotError::Json(_))
        ));
    }
}
