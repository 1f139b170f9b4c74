//! Untyped field mappings and the coercion boundary into typed models.
//!
//! Parsers produce a [`FieldMap`] whose leaves are text. [`FromFields`]
//! implementations turn that mapping into a typed model through the
//! accessors on [`Fields`], which report failures as [`ValidationError`]s
//! naming the offending field.

use crate::error::{ModelError, ValidationError};
use crate::file_model::{self, FileModel};
use chrono::{NaiveDateTime, TimeDelta};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Untyped key -> value representation of a model.
pub type FieldMap = Map<String, Value>;

/// Reserved mapping key holding a model's bound location.
pub const LOCATION_KEY: &str = "filepath";

/// Text form of timestamps inside a [`FieldMap`].
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Merge the inputs of a construction into one mapping.
///
/// Later sources win: `parsed` is overlaid by the `location` (under
/// [`LOCATION_KEY`]), which is overlaid by `explicit`.
///
/// ```
/// use hydrofile::{FieldMap, LOCATION_KEY, merge};
/// use serde_json::json;
/// use std::path::Path;
///
/// let mut parsed = FieldMap::new();
/// parsed.insert("station_count".into(), json!("1"));
/// parsed.insert("event_count".into(), json!("1"));
///
/// let mut explicit = FieldMap::new();
/// explicit.insert("event_count".into(), json!(3));
///
/// let merged = merge(parsed, Some(Path::new("rain.bui")), explicit);
/// assert_eq!(merged["station_count"], json!("1"));
/// assert_eq!(merged["event_count"], json!(3));
/// assert_eq!(merged[LOCATION_KEY], json!("rain.bui"));
/// ```
pub fn merge(parsed: FieldMap, location: Option<&Path>, explicit: FieldMap) -> FieldMap {
    let mut merged = parsed;
    if let Some(path) = location {
        merged.insert(LOCATION_KEY.to_string(), Value::String(path_text(path)));
    }
    merged.extend(explicit);
    merged
}

pub(crate) fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Coercion of a field mapping into a typed value.
///
/// Implementations pull every field they need out of `fields` and build
/// `Self`. Keys left behind are ignored.
pub trait FromFields: Sized {
    /// Build `Self` from the fields of one mapping.
    fn from_fields(fields: &mut Fields) -> Result<Self, ModelError>;
}

/// A field mapping being consumed by a [`FromFields`] implementation.
#[derive(Debug)]
pub struct Fields {
    map: FieldMap,
    prefix: String,
    chain: Vec<PathBuf>,
}

impl Fields {
    /// Wrap a mapping for coercion.
    pub fn new(map: FieldMap) -> Self {
        Fields {
            map,
            prefix: String::new(),
            chain: Vec::new(),
        }
    }

    pub(crate) fn with_chain(map: FieldMap, chain: Vec<PathBuf>) -> Self {
        Fields {
            map,
            prefix: String::new(),
            chain,
        }
    }

    fn child(&self, map: FieldMap, prefix: String) -> Self {
        Fields {
            map,
            prefix,
            chain: self.chain.clone(),
        }
    }

    /// Full path of `name` for error reporting, e.g. `events[0].duration`.
    pub fn field_path(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.prefix)
        }
    }

    /// Remove a field. Explicit nulls count as absent.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.map.remove(name).filter(|value| !value.is_null())
    }

    /// Remove a field that must be present.
    pub fn require(&mut self, name: &str) -> Result<Value, ValidationError> {
        self.take(name)
            .ok_or_else(|| ValidationError::missing(self.field_path(name)))
    }

    /// Integer field, given as a number or as integer text.
    pub fn integer<T: FromStr>(&mut self, name: &str) -> Result<T, ValidationError> {
        let value = self.require(name)?;
        integer_value(&self.field_path(name), &value)
    }

    /// Integer field falling back to `default` when absent.
    pub fn integer_or<T: FromStr>(&mut self, name: &str, default: T) -> Result<T, ValidationError> {
        match self.take(name) {
            Some(value) => integer_value(&self.field_path(name), &value),
            None => Ok(default),
        }
    }

    /// List of text values.
    pub fn text_list(&mut self, name: &str) -> Result<Vec<String>, ValidationError> {
        let path = self.field_path(name);
        let Value::Array(items) = self.require(name)? else {
            return Err(ValidationError::mismatch(path, "list of text"));
        };
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::String(text) => Ok(text),
                _ => Err(ValidationError::mismatch(format!("{path}[{i}]"), "text")),
            })
            .collect()
    }

    /// Rows of scalar values, each kept as its literal text.
    pub fn text_rows(&mut self, name: &str) -> Result<Vec<Vec<String>>, ValidationError> {
        let path = self.field_path(name);
        let Value::Array(rows) = self.require(name)? else {
            return Err(ValidationError::mismatch(path, "list of rows"));
        };
        rows.into_iter()
            .enumerate()
            .map(|(r, row)| {
                let Value::Array(cells) = row else {
                    return Err(ValidationError::mismatch(format!("{path}[{r}]"), "row"));
                };
                cells
                    .into_iter()
                    .enumerate()
                    .map(|(c, cell)| match cell {
                        Value::String(text) => Ok(text),
                        Value::Number(n) => Ok(n.to_string()),
                        _ => Err(ValidationError::mismatch(
                            format!("{path}[{r}][{c}]"),
                            "number",
                        )),
                    })
                    .collect()
            })
            .collect()
    }

    /// Optional location field.
    pub fn path(&mut self, name: &str) -> Result<Option<PathBuf>, ValidationError> {
        match self.take(name) {
            Some(Value::String(text)) => Ok(Some(PathBuf::from(text))),
            Some(_) => Err(ValidationError::mismatch(self.field_path(name), "path")),
            None => Ok(None),
        }
    }

    /// Timestamp field in [`TIMESTAMP_FORMAT`].
    pub fn timestamp(&mut self, name: &str) -> Result<NaiveDateTime, ValidationError> {
        let path = self.field_path(name);
        let Value::String(text) = self.require(name)? else {
            return Err(ValidationError::mismatch(path, "timestamp"));
        };
        NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT)
            .map_err(|e| ValidationError::constraint(path, format!("invalid timestamp '{text}': {e}")))
    }

    /// Non-negative duration field given in whole seconds.
    pub fn seconds(&mut self, name: &str) -> Result<TimeDelta, ValidationError> {
        let path = self.field_path(name);
        let value = self.require(name)?;
        let seconds: i64 = integer_value(&path, &value)?;
        if seconds < 0 {
            return Err(ValidationError::constraint(path, "duration must not be negative"));
        }
        TimeDelta::try_seconds(seconds)
            .ok_or_else(|| ValidationError::constraint(path, "duration out of range"))
    }

    /// Nested record coerced in place.
    pub fn record<T: FromFields>(&mut self, name: &str) -> Result<T, ModelError> {
        let path = self.field_path(name);
        let Value::Object(map) = self.require(name)? else {
            return Err(ValidationError::mismatch(path, "record").into());
        };
        let mut fields = self.child(map, path);
        let record = T::from_fields(&mut fields)?;
        fields.finish();
        Ok(record)
    }

    /// List of nested records, coerced in order.
    pub fn records<T: FromFields>(&mut self, name: &str) -> Result<Vec<T>, ModelError> {
        let path = self.field_path(name);
        let Value::Array(items) = self.require(name)? else {
            return Err(ValidationError::mismatch(path, "list of records").into());
        };
        let mut records = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            let item_path = format!("{path}[{i}]");
            let Value::Object(map) = item else {
                return Err(ValidationError::mismatch(item_path, "record").into());
            };
            let mut fields = self.child(map, item_path);
            records.push(T::from_fields(&mut fields)?);
            fields.finish();
        }
        Ok(records)
    }

    /// Nested file-backed model.
    ///
    /// A text value is a location: the child is loaded from that file. A
    /// record value is coerced in memory and stays unbound unless it carries
    /// its own [`LOCATION_KEY`].
    pub fn nested_model<T: FileModel>(&mut self, name: &str) -> Result<Option<T>, ModelError> {
        match self.take(name) {
            None => Ok(None),
            Some(Value::String(location)) => {
                file_model::construct_chained(Some(Path::new(&location)), FieldMap::new(), &self.chain)
                    .map(Some)
            }
            Some(Value::Object(map)) => {
                file_model::construct_chained(None, map, &self.chain).map(Some)
            }
            Some(_) => Err(ValidationError::mismatch(self.field_path(name), "location or record").into()),
        }
    }

    pub(crate) fn finish(self) {
        for key in self.map.keys() {
            log::warn!("ignoring unknown field '{}'", self.field_path(key));
        }
    }
}

fn integer_value<T: FromStr>(path: &str, value: &Value) -> Result<T, ValidationError> {
    let parsed = match value {
        Value::String(text) => text.trim().parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ValidationError::mismatch(path, "integer"))
}
