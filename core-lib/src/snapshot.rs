//! Snapshot plumbing shared by the cores.
//!
//! Every core serializes its complete execution state to a JSON object
//! tagged with a `"cpu"` field naming the architecture. Restore refuses a
//! snapshot whose tag does not match the target core.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot was taken on a '{found}' core, this core is '{expected}'")]
    ArchitectureMismatch { expected: String, found: String },

    #[error("malformed snapshot: {0}")]
    Invalid(String),
}

/// Serialize a core's state record, stamping the architecture tag.
pub fn save<S: Serialize>(id: &str, state: &S) -> Result<Value, SnapshotError> {
    let mut v = serde_json::to_value(state)
        .map_err(|e| SnapshotError::Invalid(e.to_string()))?;
    match v.as_object_mut() {
        Some(obj) => {
            obj.insert("cpu".into(), Value::String(id.into()));
            Ok(v)
        }
        None => Err(SnapshotError::Invalid(
            "state record is not a JSON object".into(),
        )),
    }
}

/// Check the `"cpu"` tag and decode the state record.
pub fn restore<S: DeserializeOwned>(id: &str, from: &Value) -> Result<S, SnapshotError> {
    let found = from
        .get("cpu")
        .and_then(Value::as_str)
        .ok_or_else(|| SnapshotError::Invalid("missing 'cpu' tag".into()))?;
    if found != id {
        return Err(SnapshotError::ArchitectureMismatch {
            expected: id.into(),
            found: found.into(),
        });
    }
    serde_json::from_value(from.clone()).map_err(|e| SnapshotError::Invalid(e.to_string()))
}
