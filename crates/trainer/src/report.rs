//! Training report written by the CLI
//!
//! Serialized with sorted object keys and stable indentation so two runs with
//! the same inputs produce byte-identical files.

use serde::{ser::Error as SerdeSerError, Serialize};
use serde_json::{map::Map, ser::PrettyFormatter, Serializer, Value};
use std::io::Write;
use std::path::Path;

use crate::config::TrainerConfig;
use crate::learner::TrainingHistory;
use crate::model::ModelTerm;

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub version: String,
    pub config: TrainerConfig,
    pub history: TrainingHistory,
    pub terms: Vec<ModelTerm>,
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sorted = Map::with_capacity(entries.len());
            for (key, val) in entries {
                sorted.insert(key, canonicalize(val));
            }
            Value::Object(sorted)
        }
        Value::Array(elements) => Value::Array(elements.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serialize `value` as canonical JSON into `writer`.
pub fn write_canonical_json<T: Serialize, W: Write>(
    mut writer: W,
    value: &T,
) -> serde_json::Result<()> {
    let canonical = canonicalize(serde_json::to_value(value)?);
    let formatter = PrettyFormatter::with_indent(b"  ");
    let mut serializer = Serializer::with_formatter(&mut writer, formatter);
    canonical.serialize(&mut serializer)?;
    writer.write_all(b"\n").map_err(serde_json::Error::io)
}

pub fn canonical_json_string<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let mut buffer = Vec::new();
    write_canonical_json(&mut buffer, value)?;
    String::from_utf8(buffer).map_err(|err| SerdeSerError::custom(err.to_string()))
}

impl TrainingReport {
    pub fn write_to(&self, path: &Path) -> crate::Result<()> {
        let json = canonical_json_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
