//! Reader for `.bui` text.
//!
//! After comment lines are dropped a file is laid out as:
//!
//! ```text
//! 1                              dataset kind
//! 2                              number of stations
//! Station_A Station_B            station names
//! 1 3600                         number of events, seconds per timestep
//! 1996 1 1 0 0 0 1 3 0 0         event header: start Y M D h m s, duration d h m s
//! 0.2 0.3                        one row per timestep, one value per station
//! ...                            more rows and more events
//! ```
//!
//! Everything is returned as text; coercion happens later.

use super::model::{DurationParts, keys};
use crate::error::ModelError;
use crate::fields::{FieldMap, TIMESTAMP_FORMAT};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// First character of a comment line.
pub const COMMENT_MARKER: char = '*';

/// Number of integer tokens on an event header line.
pub const HEADER_TOKENS: usize = 10;

type Line<'a> = (usize, &'a str);

/// Read and parse the `.bui` file at `path`.
///
/// # Errors
///
/// [`ModelError::Load`] if the file cannot be read, otherwise see
/// [`parse_str`].
pub fn parse_file(path: &Path) -> Result<FieldMap, ModelError> {
    let text = fs::read_to_string(path).map_err(|source| ModelError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&text)
}

/// Logical lines of `text` with their 1-based physical line numbers.
///
/// Only comment lines are dropped. Blank lines are kept: an empty station
/// names line or an event row without readings is still a line.
pub fn logical_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.starts_with(COMMENT_MARKER))
}

/// Parse a whole `.bui` document.
///
/// # Errors
///
/// [`ModelError::Format`] if one of the four leading lines is missing or not
/// made of integers where integers are required, if there is no event, or if
/// the first event line is not a ten-integer header.
pub fn parse_str(text: &str) -> Result<FieldMap, ModelError> {
    let lines: Vec<Line<'_>> = logical_lines(text).collect();
    let [dataset, stations, names, counts, rest @ ..] = lines.as_slice() else {
        return Err(ModelError::format(
            0,
            format!(
                "expected dataset kind, station count, station names and event counts, found {} line(s)",
                lines.len()
            ),
        ));
    };

    let mut map = FieldMap::new();
    map.insert(keys::DATASET_KIND.into(), integer_line(*dataset, "dataset kind")?);
    map.insert(keys::STATION_COUNT.into(), integer_line(*stations, "station count")?);
    map.insert(
        keys::STATION_NAMES.into(),
        Value::Array(names.1.split_whitespace().map(text_value).collect()),
    );

    let (line_no, line) = *counts;
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [event_count, seconds_per_timestep] = tokens.as_slice() else {
        return Err(ModelError::format(
            line_no,
            format!(
                "expected event count and seconds per timestep, got {} token(s)",
                tokens.len()
            ),
        ));
    };
    map.insert(
        keys::EVENT_COUNT.into(),
        integer_token(line_no, event_count, "event count")?,
    );
    map.insert(
        keys::SECONDS_PER_TIMESTEP.into(),
        integer_token(line_no, seconds_per_timestep, "seconds per timestep")?,
    );

    let events = event_blocks(rest)?
        .into_iter()
        .map(|block| parse_block(block).map(Value::Object))
        .collect::<Result<Vec<_>, _>>()?;
    map.insert(keys::EVENTS.into(), Value::Array(events));

    Ok(map)
}

/// Parse the text of a single event block: a header line and its rows.
///
/// ```
/// use hydrofile::bui::parser::parse_event;
/// use serde_json::json;
///
/// let event = parse_event("2021 12 20 0 0 0 1 0 4 20\n4.2\n4.2").unwrap();
/// assert_eq!(event["start_time"], json!("2021-12-20T00:00:00"));
/// assert_eq!(event["duration"], json!("86660"));
/// assert_eq!(event["values"], json!([["4.2"], ["4.2"]]));
/// ```
///
/// # Errors
///
/// [`ModelError::Format`] if the text is not exactly one event block.
pub fn parse_event(text: &str) -> Result<FieldMap, ModelError> {
    let lines: Vec<Line<'_>> = logical_lines(text).collect();
    let blocks = event_blocks(&lines)?;
    match blocks.as_slice() {
        [block] => parse_block(block),
        _ => Err(ModelError::format(
            blocks[1][0].0,
            "expected a single event block, found another header",
        )),
    }
}

/// Split the event section into blocks.
///
/// A line opens a new block exactly when it has the ten-integer header
/// shape, so a data row that happens to look like a header also starts one.
fn event_blocks<'a, 'b>(lines: &'b [Line<'a>]) -> Result<Vec<&'b [Line<'a>]>, ModelError> {
    let Some(&(line_no, first)) = lines.first() else {
        return Err(ModelError::format(0, "expected at least one event block"));
    };
    if header_fields(first).is_none() {
        return Err(ModelError::format(
            line_no,
            format!(
                "event header must have {HEADER_TOKENS} integer tokens, got '{}'",
                first.trim()
            ),
        ));
    }

    let mut blocks = Vec::new();
    let mut start = 0;
    for (i, &(line_no, line)) in lines.iter().enumerate().skip(1) {
        if header_fields(line).is_some() {
            log::trace!("line {line_no} starts a new event");
            blocks.push(&lines[start..i]);
            start = i;
        }
    }
    blocks.push(&lines[start..]);
    Ok(blocks)
}

fn parse_block(block: &[Line<'_>]) -> Result<FieldMap, ModelError> {
    let Some((&(line_no, header), rows)) = block.split_first() else {
        return Err(ModelError::format(0, "empty event block"));
    };
    let (start_time, duration) = parse_header(line_no, header)?;

    let values = rows
        .iter()
        .map(|(_, row)| Value::Array(row.split_whitespace().map(text_value).collect()))
        .collect();

    let mut map = FieldMap::new();
    map.insert(
        keys::START_TIME.into(),
        Value::String(start_time.format(TIMESTAMP_FORMAT).to_string()),
    );
    map.insert(
        keys::DURATION.into(),
        Value::String(duration.total_seconds().to_string()),
    );
    map.insert(keys::VALUES.into(), Value::Array(values));
    Ok(map)
}

fn parse_header(line_no: usize, line: &str) -> Result<(NaiveDateTime, DurationParts), ModelError> {
    let Some([year, month, day, hour, minute, second, days, hours, minutes, seconds]) =
        header_fields(line)
    else {
        return Err(ModelError::format(
            line_no,
            format!("event header must have {HEADER_TOKENS} integer tokens"),
        ));
    };

    let start_time = i32::try_from(year)
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, month, day))
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or_else(|| {
            ModelError::format(
                line_no,
                format!("invalid start time {year}-{month}-{day} {hour}:{minute}:{second}"),
            )
        })?;

    let duration = DurationParts {
        days: u64::from(days),
        hours: u64::from(hours),
        minutes: u64::from(minutes),
        seconds: u64::from(seconds),
    };
    Ok((start_time, duration))
}

/// The ten integers of a header line, or `None` if `line` is not one.
fn header_fields(line: &str) -> Option<[u32; HEADER_TOKENS]> {
    let mut fields = [0; HEADER_TOKENS];
    let mut tokens = line.split_whitespace();
    for field in &mut fields {
        *field = tokens.next()?.parse().ok()?;
    }
    match tokens.next() {
        Some(_) => None,
        None => Some(fields),
    }
}

fn integer_line((line_no, line): Line<'_>, what: &str) -> Result<Value, ModelError> {
    integer_token(line_no, line.trim(), what)
}

fn integer_token(line_no: usize, token: &str, what: &str) -> Result<Value, ModelError> {
    match token.parse::<i64>() {
        Ok(_) => Ok(text_value(token)),
        Err(_) => Err(ModelError::format(
            line_no,
            format!("expected {what} as an integer, got '{token}'"),
        )),
    }
}

fn text_value(token: &str) -> Value {
    Value::String(token.to_string())
}
