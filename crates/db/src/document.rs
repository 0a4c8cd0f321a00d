//! Document values, snapshots and partial updates.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use wildwatch_common::{AppError, AppResult};

use crate::path::DocumentPath;

/// Field map stored in a document.
pub type DocumentData = Map<String, Value>;

/// Serialize a typed record into document fields.
///
/// The record must serialize to a JSON object.
pub fn to_data<T: Serialize>(record: &T) -> AppResult<DocumentData> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Serialization(format!(
            "document must be an object, got {other}"
        ))),
    }
}

/// Point-in-time view of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Path that was read.
    pub path: DocumentPath,
    /// Fields, or `None` if the document does not exist.
    pub data: Option<DocumentData>,
}

impl Snapshot {
    /// Snapshot of a document that does not exist.
    #[must_use]
    pub const fn missing(path: DocumentPath) -> Self {
        Self { path, data: None }
    }

    /// Snapshot of an existing document.
    #[must_use]
    pub const fn found(path: DocumentPath, data: DocumentData) -> Self {
        Self {
            path,
            data: Some(data),
        }
    }

    /// Whether the document exists.
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Decode the document into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> AppResult<Option<T>> {
        self.data
            .as_ref()
            .map(|data| serde_json::from_value(Value::Object(data.clone())))
            .transpose()
            .map_err(|e| AppError::Serialization(format!("{}: {e}", self.path)))
    }
}

/// Change applied to a single field by [`Update`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Replace the field value.
    Set(Value),
    /// Add to a numeric field. A missing field counts as zero.
    Increment(i64),
    /// Remove the field.
    Remove,
}

/// Partial update of a document's fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    fields: Vec<(String, FieldUpdate)>,
}

impl Update {
    /// Create an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a field.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((field.into(), FieldUpdate::Set(value.into())));
        self
    }

    /// Atomically add `by` to a numeric field.
    #[must_use]
    pub fn increment(mut self, field: impl Into<String>, by: i64) -> Self {
        self.fields.push((field.into(), FieldUpdate::Increment(by)));
        self
    }

    /// Remove a field.
    #[must_use]
    pub fn remove(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), FieldUpdate::Remove));
        self
    }

    /// Whether the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Apply the update in order to `data`.
    pub fn apply(&self, data: &mut DocumentData) -> AppResult<()> {
        for (field, change) in &self.fields {
            match change {
                FieldUpdate::Set(value) => {
                    data.insert(field.clone(), value.clone());
                }
                FieldUpdate::Remove => {
                    data.remove(field);
                }
                FieldUpdate::Increment(by) => {
                    let current = match data.get(field) {
                        None | Some(Value::Null) => 0,
                        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
                            AppError::Validation(format!("field {field} is not an integer"))
                        })?,
                        Some(_) => {
                            return Err(AppError::Validation(format!(
                                "cannot increment non-numeric field {field}"
                            )));
                        }
                    };
                    let next = current.checked_add(*by).ok_or_else(|| {
                        AppError::Validation(format!("increment overflows field {field}"))
                    })?;
                    data.insert(field.clone(), Value::from(next));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn data(value: Value) -> DocumentData {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_increment_missing_field_starts_at_zero() {
        let mut doc = data(json!({ "name": "heron" }));
        Update::new()
            .increment("followerCount", 1)
            .apply(&mut doc)
            .unwrap();
        assert_eq!(doc["followerCount"], json!(1));
    }

    #[test]
    fn test_decrement_is_not_floored() {
        let mut doc = data(json!({ "followerCount": 0 }));
        Update::new()
            .increment("followerCount", -1)
            .apply(&mut doc)
            .unwrap();
        assert_eq!(doc["followerCount"], json!(-1));
    }

    #[test]
    fn test_increment_rejects_strings() {
        let mut doc = data(json!({ "followerCount": "many" }));
        let result = Update::new().increment("followerCount", 1).apply(&mut doc);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_set_and_remove() {
        let mut doc = data(json!({ "bio": "birder", "read": false }));
        Update::new()
            .set("read", true)
            .remove("bio")
            .apply(&mut doc)
            .unwrap();
        assert_eq!(doc, data(json!({ "read": true })));
    }

    #[test]
    fn test_decode_snapshot() {
        #[derive(Deserialize)]
        struct Counter {
            count: u32,
        }

        let path = DocumentPath::parse("counters/a").unwrap();
        let snapshot = Snapshot::found(path.clone(), data(json!({ "count": 3 })));
        assert_eq!(snapshot.decode::<Counter>().unwrap().unwrap().count, 3);
        assert!(Snapshot::missing(path).decode::<Counter>().unwrap().is_none());
    }

    #[test]
    fn test_to_data_rejects_non_objects() {
        assert!(to_data(&42).is_err());
        assert_eq!(to_data(&json!({ "a": 1 })).unwrap()["a"], json!(1));
    }
}
