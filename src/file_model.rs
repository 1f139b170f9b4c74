//! Lifecycle of models that are backed by a file on disk.

use crate::error::ModelError;
use crate::fields::{self, FieldMap, Fields, FromFields, LOCATION_KEY};
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Reads the file at a location into an untyped field mapping.
///
/// Parsers must not coerce types; every leaf they produce is text.
pub type ParseFn = fn(&Path) -> Result<FieldMap, ModelError>;

/// Writes a flattened field mapping to a location.
///
/// Serializers only render. They never re-validate field semantics.
pub type SerializeFn = fn(&Path, &FieldMap) -> Result<(), ModelError>;

/// Everything the lifecycle needs to know about one file format.
#[derive(Debug, Clone, Copy)]
pub struct FileFormat {
    /// File name stem used when an unbound model is saved.
    pub filename: &'static str,
    /// Extension appended to `filename`, including the leading dot.
    pub extension: &'static str,
    /// Reads a file of this format.
    pub parse: ParseFn,
    /// Writes a file of this format.
    pub serialize: SerializeFn,
}

impl FileFormat {
    /// File name given to unbound models on save, e.g. `bui_file.bui`.
    pub fn default_file_name(&self) -> String {
        format!("{}{}", self.filename, self.extension)
    }
}

/// A model that can be bound to a file, loaded from it and saved to it.
///
/// Implementors supply the format record, access to the bound location and
/// the list of nested file-backed fields. Loading and saving are provided.
///
/// Nested models must be declared under the same name their field has in the
/// flattened mapping, so that saving can replace the nested record with the
/// child's location.
pub trait FileModel: Serialize + FromFields {
    /// Format of the file backing this model.
    const FORMAT: FileFormat;

    /// Bound location, `None` while the model lives in memory only.
    fn filepath(&self) -> Option<&Path>;

    /// Bind the model to a location.
    fn set_filepath(&mut self, path: PathBuf);

    /// Nested file-backed fields, in declaration order.
    fn nested_models(&mut self) -> Vec<NestedModel<'_>> {
        Vec::new()
    }

    /// Load a model from a file.
    fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        Self::construct(Some(path.as_ref()), FieldMap::new())
    }

    /// Build an unbound model from an explicit field mapping.
    fn from_mapping(fields: FieldMap) -> Result<Self, ModelError> {
        Self::construct(None, fields)
    }

    /// Construct a model from an optional location and explicit fields.
    ///
    /// With a location the file is parsed first and `fields` are overlaid
    /// on the parsed mapping, see [`fields::merge`].
    ///
    /// # Errors
    ///
    /// [`ModelError::Load`] or [`ModelError::Format`] if the file cannot be
    /// read or parsed, [`ModelError::Validation`] if coercion rejects the
    /// merged mapping.
    fn construct(location: Option<&Path>, fields: FieldMap) -> Result<Self, ModelError> {
        construct_chained(location, fields, &[])
    }

    /// Start building a model from a location and/or explicit fields.
    fn builder() -> ModelBuilder<Self> {
        ModelBuilder::new()
    }

    /// Save this model and all nested file-backed models into `folder`.
    ///
    /// Unbound models are bound to `folder/<filename><extension>`; bound
    /// models keep their location. Children are written before their
    /// parent, which records each child's location in place of its record.
    /// Returns the absolute location of this model's file.
    ///
    /// # Errors
    ///
    /// [`ModelError::Cycle`] if a model resolves to the same file as one of
    /// its ancestors; this is detected before anything is written. Any
    /// flattening, rendering or write error of a serializer is returned as is.
    ///
    /// A model is bound only once its own file is written. When a write fails,
    /// children written before the failure stay on disk and stay bound, while
    /// the failing model and its ancestors are left unbound.
    fn save(&mut self, folder: impl AsRef<Path>) -> Result<PathBuf, ModelError> {
        let folder = folder.as_ref();
        let mut ancestors = Vec::new();
        check_cycles(self, folder, &mut ancestors)?;
        self.write_tree(folder)
    }
}

/// A nested file-backed field of a parent model.
pub struct NestedModel<'a> {
    name: &'static str,
    node: &'a mut dyn ModelNode,
}

impl<'a> NestedModel<'a> {
    /// Declare `model` as the nested field `name`.
    pub fn new<T: FileModel>(name: &'static str, model: &'a mut T) -> Self {
        NestedModel { name, node: model }
    }

    /// Field name of the nested model.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for NestedModel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NestedModel")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Type-erased view of a [`FileModel`] used to walk a model graph.
///
/// This trait is sealed and implemented for every [`FileModel`].
pub trait ModelNode: sealed::Sealed {
    /// Location this node is written to when saved into `folder`.
    fn location_in(&self, folder: &Path) -> PathBuf;
    /// Nested file-backed fields of this node.
    fn nested_nodes(&mut self) -> Vec<NestedModel<'_>>;
    /// Write this node and its children, returning its absolute location.
    fn write_tree(&mut self, folder: &Path) -> Result<PathBuf, ModelError>;
}

impl<T: FileModel> sealed::Sealed for T {}

impl<T: FileModel> ModelNode for T {
    fn location_in(&self, folder: &Path) -> PathBuf {
        match self.filepath() {
            Some(path) => path.to_path_buf(),
            None => folder.join(T::FORMAT.default_file_name()),
        }
    }

    fn nested_nodes(&mut self) -> Vec<NestedModel<'_>> {
        self.nested_models()
    }

    fn write_tree(&mut self, folder: &Path) -> Result<PathBuf, ModelError> {
        let location = self.location_in(folder);

        let mut children = FieldMap::new();
        for nested in self.nested_models() {
            let child = nested.node.write_tree(folder)?;
            children.insert(
                nested.name.to_string(),
                Value::String(fields::path_text(&child)),
            );
        }

        let mut data = flatten(self)?;
        data.remove(LOCATION_KEY);
        data.extend(children);

        debug!("writing {}", location.display());
        (T::FORMAT.serialize)(&location, &data)?;
        if self.filepath().is_none() {
            self.set_filepath(location.clone());
        }
        Ok(absolute(&location))
    }
}

fn check_cycles(
    node: &mut dyn ModelNode,
    folder: &Path,
    ancestors: &mut Vec<PathBuf>,
) -> Result<(), ModelError> {
    let location = absolute(&node.location_in(folder));
    if ancestors.contains(&location) {
        return Err(ModelError::Cycle { path: location });
    }
    ancestors.push(location);
    for nested in node.nested_nodes() {
        check_cycles(nested.node, folder, ancestors)?;
    }
    ancestors.pop();
    Ok(())
}

/// Construct a model, refusing to load any location in `chain`.
pub(crate) fn construct_chained<T: FileModel>(
    location: Option<&Path>,
    explicit: FieldMap,
    chain: &[PathBuf],
) -> Result<T, ModelError> {
    let mut chain = chain.to_vec();
    let merged = match location {
        Some(path) => {
            let resolved = absolute(path);
            if chain.contains(&resolved) {
                return Err(ModelError::Cycle { path: resolved });
            }
            debug!("loading {}", path.display());
            let parsed = (T::FORMAT.parse)(path)?;
            chain.push(resolved);
            fields::merge(parsed, Some(path), explicit)
        }
        None => explicit,
    };

    let mut fields = Fields::with_chain(merged, chain);
    let filepath = fields.path(LOCATION_KEY)?;
    let mut model = T::from_fields(&mut fields)?;
    fields.finish();
    if let Some(path) = filepath {
        model.set_filepath(path);
    }
    Ok(model)
}

/// Flatten a model into a mapping, dropping absent values at every depth.
fn flatten<T: Serialize>(model: &T) -> Result<FieldMap, ModelError> {
    match serde_json::to_value(model)? {
        Value::Object(map) => Ok(strip_absent(map)),
        other => Err(ModelError::render(
            "<root>",
            format!("expected a record, got {other}"),
        )),
    }
}

fn strip_absent(map: FieldMap) -> FieldMap {
    map.into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key, strip_value(value)))
        .collect()
}

fn strip_value(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(strip_absent(map)),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_value).collect()),
        other => other,
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Builder for [`FileModel::construct`].
///
/// ```no_run
/// use hydrofile::FileModel;
/// use hydrofile::bui::BuiModel;
///
/// let model: BuiModel = BuiModel::builder()
///     .location("rr/default.bui")
///     .field("seconds_per_timestep", 3600)
///     .build()?;
/// assert_eq!(model.seconds_per_timestep, 3600);
/// # Ok::<(), hydrofile::ModelError>(())
/// ```
#[must_use]
pub struct ModelBuilder<T> {
    location: Option<PathBuf>,
    fields: FieldMap,
    _model: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for ModelBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBuilder")
            .field("location", &self.location)
            .field("fields", &self.fields)
            .finish()
    }
}

impl<T: FileModel> Default for ModelBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FileModel> ModelBuilder<T> {
    /// Empty builder: no location, no explicit fields.
    pub fn new() -> Self {
        ModelBuilder {
            location: None,
            fields: FieldMap::new(),
            _model: PhantomData,
        }
    }

    /// Load the model from `path`.
    pub fn location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Set one explicit field. Explicit fields win over parsed ones.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set several explicit fields at once.
    pub fn fields(mut self, fields: FieldMap) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Construct the model.
    ///
    /// # Errors
    ///
    /// See [`FileModel::construct`].
    pub fn build(self) -> Result<T, ModelError> {
        T::construct(self.location.as_deref(), self.fields)
    }
}
