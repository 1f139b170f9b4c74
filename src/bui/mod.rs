//! The `.bui` precipitation event format.
//!
//! A `.bui` file lists the rain stations of a rainfall-runoff model and one
//! or more events, each a start time, a duration and a block of observations
//! per timestep and station. Observations keep their exact decimal text, so a
//! loaded file saves back with the same values it was read with.

mod model;
pub mod parser;
pub mod serializer;

pub use model::{
    BuiModel, DEFAULT_DATASET_KIND, DurationParts, EventList, PrecipitationEvent, Reading,
};
