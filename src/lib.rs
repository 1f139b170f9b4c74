//! File-backed simulation models.
//!
//! A [`FileModel`] is a typed model that may be bound to a file. Loading
//! parses the file into an untyped [`FieldMap`], overlays explicit fields and
//! coerces the result through [`FromFields`]. Saving flattens the model back
//! into a mapping and hands it to the format's serializer, writing every
//! nested file-backed model to its own file first.
//!
//! The [`bui`] module implements the `.bui` precipitation event format.

pub mod bui;
mod error;
mod fields;
mod file_model;

pub use error::{ModelError, ValidationError, ValidationErrorKind};
pub use fields::{FieldMap, Fields, FromFields, LOCATION_KEY, TIMESTAMP_FORMAT, merge};
pub use file_model::{
    FileFormat, FileModel, ModelBuilder, ModelNode, NestedModel, ParseFn, SerializeFn,
};
