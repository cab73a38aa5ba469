#![warn(missing_docs)]

//! Converts rooms between Tiled's TMX authoring format and the JSON room
//! format the game engine loads, and validates room files.

pub mod batch;
mod config;
#[allow(missing_docs)]
pub mod convert;
pub mod csv;
mod error;
#[allow(missing_docs)]
pub mod migrate;
#[allow(missing_docs)]
pub mod room;
#[allow(missing_docs)]
pub mod tmx;
#[allow(missing_docs)]
pub mod validate;

pub use batch::{convert_file, BatchSummary, Direction};
pub use config::PipelineConfig;
pub use convert::{map_to_room, room_to_map};
pub use error::MapError;
pub use room::RoomDocument;
pub use tmx::MapDocument;
pub use validate::{validate_map, validate_room, ValidationReport};
