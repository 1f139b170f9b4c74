use super::{parser, serializer};
use crate::error::{ModelError, ValidationError};
use crate::fields::{Fields, FromFields, TIMESTAMP_FORMAT};
use crate::file_model::{FileFormat, FileModel};
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Serialize, Serializer};
use std::fmt;
use std::num::ParseFloatError;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Mapping keys shared by the parser, the serializer and coercion.
pub(crate) mod keys {
    pub const DATASET_KIND: &str = "dataset_kind";
    pub const STATION_COUNT: &str = "station_count";
    pub const STATION_NAMES: &str = "station_names";
    pub const EVENT_COUNT: &str = "event_count";
    pub const SECONDS_PER_TIMESTEP: &str = "seconds_per_timestep";
    pub const EVENTS: &str = "events";
    pub const START_TIME: &str = "start_time";
    pub const DURATION: &str = "duration";
    pub const VALUES: &str = "values";
}

/// Dataset kind written when none is given. `.bui` files always use 1.
pub const DEFAULT_DATASET_KIND: u32 = 1;

/// Contents of a `.bui` precipitation file.
///
/// `station_count` and `event_count` are carried as written. They are not
/// checked against `station_names` or `events`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiModel {
    /// Bound location, `None` for a model that only lives in memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filepath: Option<PathBuf>,
    pub dataset_kind: u32,
    pub station_count: u32,
    /// Station names. Names must not contain whitespace: they are written
    /// space-separated and split on whitespace when read back. The first
    /// name must not start with `*`, which would turn the line into a
    /// comment; saving such a model fails with a render error.
    pub station_names: Vec<String>,
    pub event_count: u32,
    pub seconds_per_timestep: u32,
    pub events: EventList,
}

impl BuiModel {
    /// Build an unbound model whose station and event counts match the
    /// given names and events. Counts above `u32::MAX` are stored as
    /// `u32::MAX`.
    pub fn new(station_names: Vec<String>, seconds_per_timestep: u32, events: EventList) -> Self {
        BuiModel {
            filepath: None,
            dataset_kind: DEFAULT_DATASET_KIND,
            station_count: count(station_names.len()),
            station_names,
            event_count: count(events.len()),
            seconds_per_timestep,
            events,
        }
    }
}

// Saturates at `u32::MAX`, the largest count a header can carry.
fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl FromFields for BuiModel {
    fn from_fields(fields: &mut Fields) -> Result<Self, ModelError> {
        let dataset_kind = fields.integer_or(keys::DATASET_KIND, DEFAULT_DATASET_KIND)?;
        let station_count = fields.integer(keys::STATION_COUNT)?;
        let station_names = fields.text_list(keys::STATION_NAMES)?;
        let event_count = fields.integer(keys::EVENT_COUNT)?;
        let seconds_per_timestep = fields.integer(keys::SECONDS_PER_TIMESTEP)?;
        let events_path = fields.field_path(keys::EVENTS);
        let events = EventList::new(fields.records(keys::EVENTS)?)
            .ok_or_else(|| ValidationError::constraint(events_path, "at least one event is required"))?;

        Ok(BuiModel {
            filepath: None,
            dataset_kind,
            station_count,
            station_names,
            event_count,
            seconds_per_timestep,
            events,
        })
    }
}

impl FileModel for BuiModel {
    const FORMAT: FileFormat = FileFormat {
        filename: "bui_file",
        extension: ".bui",
        parse: parser::parse_file,
        serialize: serializer::write_bui_file,
    };

    fn filepath(&self) -> Option<&Path> {
        self.filepath.as_deref()
    }

    fn set_filepath(&mut self, path: PathBuf) {
        self.filepath = Some(path);
    }
}

/// Non-empty, ordered list of precipitation events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EventList(Vec<PrecipitationEvent>);

impl EventList {
    /// Wrap `events`, or `None` if there are none.
    pub fn new(events: Vec<PrecipitationEvent>) -> Option<Self> {
        if events.is_empty() {
            None
        } else {
            Some(EventList(events))
        }
    }

    /// Unwrap into the underlying events.
    pub fn into_inner(self) -> Vec<PrecipitationEvent> {
        self.0
    }
}

impl Deref for EventList {
    type Target = [PrecipitationEvent];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a EventList {
    type Item = &'a PrecipitationEvent;
    type IntoIter = std::slice::Iter<'a, PrecipitationEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One timestamped run of precipitation observations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrecipitationEvent {
    #[serde(serialize_with = "serialize_timestamp")]
    pub start_time: NaiveDateTime,
    /// Length of the event. Files store whole seconds, so any sub-second
    /// part is dropped when the event is saved.
    #[serde(serialize_with = "serialize_seconds")]
    pub duration: TimeDelta,
    /// One row per timestep, one reading per station.
    pub values: Vec<Vec<Reading>>,
}

impl PrecipitationEvent {
    /// Build an event. `duration` keeps second resolution only once saved.
    pub fn new(start_time: NaiveDateTime, duration: TimeDelta, values: Vec<Vec<Reading>>) -> Self {
        PrecipitationEvent {
            start_time,
            duration,
            values,
        }
    }

    /// Number of whole timesteps the duration spans, or `None` for a zero
    /// timestep length.
    pub fn timestep_count(&self, seconds_per_timestep: u32) -> Option<i64> {
        if seconds_per_timestep == 0 {
            return None;
        }
        Some(self.duration.num_seconds() / i64::from(seconds_per_timestep))
    }
}

impl FromFields for PrecipitationEvent {
    fn from_fields(fields: &mut Fields) -> Result<Self, ModelError> {
        let start_time = fields.timestamp(keys::START_TIME)?;
        let duration = fields.seconds(keys::DURATION)?;
        let values_path = fields.field_path(keys::VALUES);
        let values = fields
            .text_rows(keys::VALUES)?
            .into_iter()
            .enumerate()
            .map(|(r, row)| {
                row.into_iter()
                    .enumerate()
                    .map(|(c, text)| {
                        Reading::new(text).map_err(|e| {
                            ValidationError::constraint(format!("{values_path}[{r}][{c}]"), e.to_string())
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PrecipitationEvent {
            start_time,
            duration,
            values,
        })
    }
}

fn serialize_timestamp<S: Serializer>(time: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&time.format(TIMESTAMP_FORMAT))
}

fn serialize_seconds<S: Serializer>(duration: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(duration.num_seconds())
}

/// One observation, kept as the exact decimal text it was written with.
///
/// ```
/// use hydrofile::bui::Reading;
///
/// let reading: Reading = "0.10".parse().unwrap();
/// assert_eq!(reading.as_str(), "0.10");
/// assert_eq!(reading.value(), 0.1);
/// assert!(Reading::new("wet").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Reading {
    text: String,
    value: f64,
}

impl Reading {
    /// Check that `text` is a number and keep it verbatim.
    pub fn new(text: impl Into<String>) -> Result<Self, ParseFloatError> {
        let text = text.into();
        let value = text.parse()?;
        Ok(Reading { text, value })
    }

    /// The reading as written.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Numeric value of the reading.
    pub fn value(&self) -> f64 {
        self.value
    }
}

impl PartialEq for Reading {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Reading {}

impl FromStr for Reading {
    type Err = ParseFloatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reading::new(s)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

/// A duration split into the day, hour, minute and second fields of an
/// event header.
///
/// ```
/// use hydrofile::bui::DurationParts;
///
/// let parts = DurationParts::from_seconds(4 * 86_400 + 2_000);
/// assert_eq!(parts.to_string(), "4 0 33 20");
/// assert_eq!(parts.total_seconds(), 4 * 86_400 + 2_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationParts {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl DurationParts {
    /// Decompose a total number of seconds.
    pub fn from_seconds(total: u64) -> Self {
        let days = total / 86_400;
        let mut rest = total % 86_400;
        let hours = rest / 3_600;
        rest %= 3_600;
        DurationParts {
            days,
            hours,
            minutes: rest / 60,
            seconds: rest % 60,
        }
    }

    /// Recombine the fields into seconds. Fields are not required to be
    /// normalized, e.g. 90 minutes is accepted.
    pub fn total_seconds(&self) -> u64 {
        self.days * 86_400 + self.hours * 3_600 + self.minutes * 60 + self.seconds
    }
}

impl fmt::Display for DurationParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.days, self.hours, self.minutes, self.seconds)
    }
}
