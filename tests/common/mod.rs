#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use hydrofile::bui::{BuiModel, EventList, PrecipitationEvent, Reading};
use hydrofile::{FieldMap, FileFormat, FileModel, Fields, FromFields, ModelError, NestedModel};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub fn data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("data")
}

pub fn timestamp(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(hh, mm, ss)
        .unwrap()
}

pub fn readings(rows: &[&[&str]]) -> Vec<Vec<Reading>> {
    rows.iter()
        .map(|row| row.iter().map(|text| Reading::new(*text).unwrap()).collect())
        .collect()
}

/// The model stored in `tests/data/default.bui`, unbound.
pub fn default_bui_model() -> BuiModel {
    let event = PrecipitationEvent::new(
        timestamp(1996, 1, 1, 0, 0, 0),
        TimeDelta::days(1) + TimeDelta::hours(3),
        readings(&vec![&["0.2"][..]; 9]),
    );
    BuiModel::new(
        vec!["’Station1’".to_string()],
        10800,
        EventList::new(vec![event]).unwrap(),
    )
}

/// Lines of a written `.bui` file without the construction timestamp.
pub fn lines_without_timestamp(text: &str) -> Vec<&str> {
    text.lines()
        .filter(|line| !line.starts_with("*Date and time of construction:"))
        .collect()
}

// A minimal `key = value` format used to build nested model graphs.

pub fn parse_ini(path: &Path) -> Result<FieldMap, ModelError> {
    let text = fs::read_to_string(path).map_err(|source| ModelError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    let mut map = FieldMap::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(" = ") else {
            return Err(ModelError::Format {
                line: i + 1,
                reason: format!("expected 'key = value', got '{line}'"),
            });
        };
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(map)
}

pub fn write_ini(path: &Path, data: &FieldMap) -> Result<(), ModelError> {
    let mut text = String::new();
    for (key, value) in data {
        let value = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(ModelError::Render {
                    field: key.clone(),
                    reason: format!("not a scalar: {other}"),
                });
            }
        };
        text.push_str(&format!("{key} = {value}\n"));
    }
    fs::write(path, text).map_err(|source| ModelError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filepath: Option<PathBuf>,
    pub node_count: u32,
}

impl FromFields for NetworkModel {
    fn from_fields(fields: &mut Fields) -> Result<Self, ModelError> {
        Ok(NetworkModel {
            filepath: None,
            node_count: fields.integer_or("node_count", 100)?,
        })
    }
}

impl FileModel for NetworkModel {
    const FORMAT: FileFormat = FileFormat {
        filename: "network",
        extension: ".net",
        parse: parse_ini,
        serialize: write_ini,
    };

    fn filepath(&self) -> Option<&Path> {
        self.filepath.as_deref()
    }

    fn set_filepath(&mut self, path: PathBuf) {
        self.filepath = Some(path);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filepath: Option<PathBuf>,
    pub name: String,
    pub network: Option<NetworkModel>,
}

impl FromFields for FlowModel {
    fn from_fields(fields: &mut Fields) -> Result<Self, ModelError> {
        let name = match fields.take("name") {
            Some(Value::String(name)) => name,
            Some(_) => return Err(hydrofile::ValidationError::mismatch("name", "text").into()),
            None => "Dummy".to_string(),
        };
        Ok(FlowModel {
            filepath: None,
            name,
            network: fields.nested_model("network")?,
        })
    }
}

impl FileModel for FlowModel {
    const FORMAT: FileFormat = FileFormat {
        filename: "fm",
        extension: ".mdu",
        parse: parse_ini,
        serialize: write_ini,
    };

    fn filepath(&self) -> Option<&Path> {
        self.filepath.as_deref()
    }

    fn set_filepath(&mut self, path: PathBuf) {
        self.filepath = Some(path);
    }

    fn nested_models(&mut self) -> Vec<NestedModel<'_>> {
        self.network
            .as_mut()
            .map(|network| NestedModel::new("network", network))
            .into_iter()
            .collect()
    }
}

/// Root of a coupled model: a flow model and a rainfall file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouplerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filepath: Option<PathBuf>,
    pub flow: Option<FlowModel>,
    pub rainfall: Option<BuiModel>,
}

impl FromFields for CouplerConfig {
    fn from_fields(fields: &mut Fields) -> Result<Self, ModelError> {
        Ok(CouplerConfig {
            filepath: None,
            flow: fields.nested_model("flow")?,
            rainfall: fields.nested_model("rainfall")?,
        })
    }
}

impl FileModel for CouplerConfig {
    const FORMAT: FileFormat = FileFormat {
        filename: "dimrconfig",
        extension: ".xml",
        parse: parse_ini,
        serialize: write_ini,
    };

    fn filepath(&self) -> Option<&Path> {
        self.filepath.as_deref()
    }

    fn set_filepath(&mut self, path: PathBuf) {
        self.filepath = Some(path);
    }

    fn nested_models(&mut self) -> Vec<NestedModel<'_>> {
        let mut nested = Vec::new();
        if let Some(flow) = self.flow.as_mut() {
            nested.push(NestedModel::new("flow", flow));
        }
        if let Some(rainfall) = self.rainfall.as_mut() {
            nested.push(NestedModel::new("rainfall", rainfall));
        }
        nested
    }
}
