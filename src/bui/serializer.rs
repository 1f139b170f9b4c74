//! Writer for `.bui` text.

use super::model::{DurationParts, keys};
use super::parser::COMMENT_MARKER;
use crate::error::ModelError;
use crate::fields::{FieldMap, TIMESTAMP_FORMAT};
use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Format of the construction timestamp in the file's comment header.
pub const CONSTRUCTION_TIME_FORMAT: &str = "%d-%m-%y %H:%M:%S";

/// Render `data` and write it to `path`, stamped with the local time.
///
/// Missing parent directories are created.
///
/// # Errors
///
/// [`ModelError::Render`] if `data` cannot be rendered,
/// [`ModelError::Write`] if the file cannot be written.
pub fn write_bui_file(path: &Path, data: &FieldMap) -> Result<(), ModelError> {
    let text = render_document(path, data, Local::now().naive_local())?;
    let write_error = |source| ModelError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    fs::write(path, text).map_err(write_error)
}

/// Render a flattened `.bui` mapping as file text.
///
/// `path` is recorded in the header comment, `constructed_at` in the line
/// after it.
///
/// # Errors
///
/// [`ModelError::Render`] if a key is missing, holds a value with no text
/// form, or the first station name starts with the comment marker.
pub fn render_document(
    path: &Path,
    data: &FieldMap,
    constructed_at: NaiveDateTime,
) -> Result<String, ModelError> {
    let mut lines = vec![
        format!("*Name of this file: {}", path.display()),
        format!(
            "*Date and time of construction: {}",
            constructed_at.format(CONSTRUCTION_TIME_FORMAT)
        ),
        "*Comments are following an * (asterisk) and written above variables".to_string(),
        scalar(keys::DATASET_KIND, get(data, keys::DATASET_KIND)?)?,
        "*Number of stations".to_string(),
        scalar(keys::STATION_COUNT, get(data, keys::STATION_COUNT)?)?,
        "*Station Name".to_string(),
        station_names_line(get(data, keys::STATION_NAMES)?)?,
        "*Number_of_events seconds_per_timestamp".to_string(),
        format!(
            "{} {}",
            scalar(keys::EVENT_COUNT, get(data, keys::EVENT_COUNT)?)?,
            scalar(keys::SECONDS_PER_TIMESTEP, get(data, keys::SECONDS_PER_TIMESTEP)?)?
        ),
        "*Start datetime and number of timestamps in the format: yyyy#m#d:#h#m#s:#d#h#m#s"
            .to_string(),
        "*Observations per timestamp (row) and per station (column)".to_string(),
    ];

    let Value::Array(events) = get(data, keys::EVENTS)? else {
        return Err(ModelError::render(keys::EVENTS, "expected a list of events"));
    };
    for (i, event) in events.iter().enumerate() {
        render_event(&format!("{}[{i}]", keys::EVENTS), event, &mut lines)?;
    }

    let mut text = lines.join("\n");
    text.push('\n');
    Ok(text)
}

fn render_event(field: &str, event: &Value, lines: &mut Vec<String>) -> Result<(), ModelError> {
    let Value::Object(event) = event else {
        return Err(ModelError::render(field, "expected an event record"));
    };
    let key = |name: &str| format!("{field}.{name}");
    let value = move |name: &str| {
        event
            .get(name)
            .ok_or_else(|| ModelError::render(key(name), "missing"))
    };

    let start_text = scalar(&key(keys::START_TIME), value(keys::START_TIME)?)?;
    let start_time = NaiveDateTime::parse_from_str(&start_text, TIMESTAMP_FORMAT)
        .map_err(|e| ModelError::render(key(keys::START_TIME), format!("'{start_text}': {e}")))?;
    let duration_text = scalar(&key(keys::DURATION), value(keys::DURATION)?)?;
    let duration: u64 = duration_text.parse().map_err(|_| {
        ModelError::render(
            key(keys::DURATION),
            format!("expected whole non-negative seconds, got '{duration_text}'"),
        )
    })?;
    lines.push(format!(
        "{} {}",
        render_start_time(&start_time),
        render_duration(duration)
    ));

    let Value::Array(rows) = value(keys::VALUES)? else {
        return Err(ModelError::render(key(keys::VALUES), "expected a list of rows"));
    };
    let rows = rows
        .iter()
        .enumerate()
        .map(|(r, row)| text_list(&format!("{}[{r}]", key(keys::VALUES)), row))
        .collect::<Result<Vec<_>, _>>()?;
    if !rows.is_empty() {
        lines.push(render_rows(&rows));
    }
    Ok(())
}

fn station_names_line(value: &Value) -> Result<String, ModelError> {
    let line = render_station_names(&text_list(keys::STATION_NAMES, value)?);
    if line.starts_with(COMMENT_MARKER) {
        return Err(ModelError::render(
            format!("{}[0]", keys::STATION_NAMES),
            format!("a name starting with '{COMMENT_MARKER}' would read back as a comment"),
        ));
    }
    Ok(line)
}

/// Station names as one space-separated line.
///
/// Names are not escaped, so a name containing a space reads back as two
/// stations.
pub fn render_station_names(names: &[String]) -> String {
    names.join(" ")
}

/// Start time as `Y M D h m s`, without padding.
pub fn render_start_time(time: &NaiveDateTime) -> String {
    format!(
        "{} {} {} {} {} {}",
        time.year(),
        time.month(),
        time.day(),
        time.hour(),
        time.minute(),
        time.second()
    )
}

/// Duration as `d h m s`.
pub fn render_duration(total_seconds: u64) -> String {
    DurationParts::from_seconds(total_seconds).to_string()
}

/// Observation rows, one line per row, values separated by single spaces.
pub fn render_rows(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| row.join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

fn get<'a>(data: &'a FieldMap, key: &str) -> Result<&'a Value, ModelError> {
    data.get(key)
        .ok_or_else(|| ModelError::render(key, "missing"))
}

fn scalar(field: &str, value: &Value) -> Result<String, ModelError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(ModelError::render(field, format!("expected text or a number, got {value}"))),
    }
}

fn text_list(field: &str, value: &Value) -> Result<Vec<String>, ModelError> {
    let Value::Array(items) = value else {
        return Err(ModelError::render(field, "expected a list"));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| scalar(&format!("{field}[{i}]"), item))
        .collect()
}
