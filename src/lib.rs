//! Reader for mapsforge binary map files.
//!
//! A map file packs OpenStreetMap data into per-zoom sub-files of tile
//! blocks. [`MapFile`] parses the header on open and answers tile queries
//! by resolving the covered blocks through a cached block index and
//! decoding them into [`PointOfInterest`] and [`Way`] values.
//!
//! ```no_run
//! use mapsforge_reader::{MapFile, Tile};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let map = MapFile::open("berlin.map")?;
//! let tile = Tile::new(8802, 5373, 14);
//! let data = map.read_map_data(&tile)?;
//! println!("{} pois, {} ways", data.pois.len(), data.ways.len());
//! # Ok(())
//! # }
//! ```

mod block;
mod cursor;
mod error;
mod header;
mod index_cache;
mod map_data;
mod map_file;
mod mercator;
mod query;
mod source;
mod tile;
mod types;

pub use block::{decode_double_delta_ring, decode_single_delta_ring, WayFilter};
pub use cursor::{ByteCursor, MAXIMUM_BUFFER_SIZE};
pub use error::{DecodeError, FormatError, ReadError};
pub use header::{FileHeader, FileInfo, SubFileParameter};
pub use index_cache::{IndexCache, IndexEntry, INDEX_ENTRIES_PER_PAGE};
pub use map_data::{MapReadResult, PointOfInterest, Selector, Way};
pub use map_file::MapFile;
pub use mercator::{MercatorProjection, MERCATOR_LATITUDE_MAX, MERCATOR_LATITUDE_MIN};
pub use query::QueryParameters;
pub use source::{ByteSource, FileSource, MemorySource};
pub use tile::Tile;
pub use types::{
    degrees_to_microdegrees, microdegrees_to_degrees, BoundingBox, LatLong, Tag,
};
