//! Build and parse KDM key-data containers.
//!
//! # Overview
//!
//! A KDM container stores a small typed document: named numeric parameters, struct type
//! declarations, arrays of entities and named tables, with every string interned once in a
//! dedicated section. All values are little-endian and every section is word aligned.
//!
//! A concrete container declares its struct types, tables and parameters up front ([Kdm::new]),
//! and exposes its document as a plain state through the [Container] trait. [MapData] is the
//! container used for map metadata.
//!
//! # Example
//!
//! ```
//! use radiante_kdm::{Container, MapData, MapDataState};
//!
//! let mut map_data = MapData::default();
//! map_data.set(&MapDataState::default()).unwrap();
//! let bytes = map_data.build().unwrap();
//! assert_eq!(bytes.len(), 220);
//!
//! let parsed = MapData::parse(&bytes).unwrap();
//! assert_eq!(parsed.get().unwrap(), MapDataState::default());
//! ```

pub mod arena;
pub mod codec;
pub mod config;
pub mod container;
pub mod cursor;
pub mod error;
pub mod header;
pub mod mapdata;
pub mod registry;
pub mod types;

pub use arena::{Arena, ArrayId};
pub use codec::{Entity, Pointer};
pub use config::Config;
pub use container::{Container, Kdm, Symbol, Table};
pub use error::{Error, InvalidState, PathSegment};
pub use header::SectionOffsets;
pub use mapdata::{MapData, MapDataState, MapEntry};
pub use registry::Registry;
pub use types::{
    number::Number,
    parameter::Parameter,
    pointer::{StringPointer, StructArrayPointer},
    structure::{Struct, StructDef},
    AnyEntity, Kind, Primitive,
};
