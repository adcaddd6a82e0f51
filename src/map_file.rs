use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::block::{BlockDecoder, WayFilter};
use crate::cursor::{ByteCursor, MAXIMUM_BUFFER_SIZE};
use crate::error::{FormatError, ReadError};
use crate::header::{FileHeader, FileInfo, SubFileParameter};
use crate::index_cache::IndexCache;
use crate::map_data::{MapReadResult, Selector};
use crate::mercator::MercatorProjection;
use crate::query::QueryParameters;
use crate::source::{ByteSource, FileSource};
use crate::tile::Tile;
use crate::types::{BoundingBox, LatLong};

const INDEX_CACHE_SIZE: usize = 64;
const DEFAULT_START_ZOOM_LEVEL: u8 = 12;

/// An open map file.
///
/// All query methods take `&self` and are safe to call from multiple
/// threads at once; each call performs its own positioned reads and the
/// shared index cache serializes only page loads.
pub struct MapFile {
    // `None` once closed; queries clone the inner handle so a close during
    // a running query releases the source when that query finishes.
    source: Mutex<Option<Arc<dyn ByteSource>>>,
    header: FileHeader,
    index_cache: IndexCache,
    timestamp: i64,
    way_filter: WayFilter,
    zoom_level_min: u8,
    zoom_level_max: u8,
}

impl MapFile {
    /// Opens and validates a map file on disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<MapFile, FormatError> {
        let source = FileSource::open(path.as_ref())?;
        let timestamp = source.modified();
        Self::with_source(Arc::new(source), timestamp)
    }

    /// Opens a map over any byte source, e.g. an in-memory buffer.
    pub fn from_source(source: Arc<dyn ByteSource>) -> Result<MapFile, FormatError> {
        Self::with_source(source, 0)
    }

    fn with_source(source: Arc<dyn ByteSource>, timestamp: i64) -> Result<MapFile, FormatError> {
        let header = FileHeader::parse(source.as_ref())?;
        Ok(MapFile {
            source: Mutex::new(Some(source)),
            header,
            index_cache: IndexCache::new(INDEX_CACHE_SIZE),
            timestamp,
            way_filter: WayFilter::default(),
            zoom_level_min: 0,
            zoom_level_max: u8::MAX,
        })
    }

    pub fn info(&self) -> &FileInfo {
        self.header.info()
    }

    /// Modification time of the underlying file in seconds since the
    /// epoch, zero for non-file sources.
    pub fn data_timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Preferred initial map position: the position from the header if
    /// present, otherwise the center of the file's bounding box.
    pub fn start_position(&self) -> LatLong {
        let info = self.header.info();
        info.start_position
            .unwrap_or_else(|| info.bounding_box.center())
    }

    pub fn start_zoom_level(&self) -> u8 {
        self.header
            .info()
            .start_zoom_level
            .unwrap_or(DEFAULT_START_ZOOM_LEVEL)
    }

    /// The language list from the header's preference string, if any.
    pub fn map_languages(&self) -> Option<Vec<String>> {
        self.header
            .info()
            .language_preference
            .as_ref()
            .map(|languages| languages.split(',').map(str::to_string).collect())
    }

    /// Restricts queries to the given zoom range; tiles outside it fail
    /// with an unsupported-zoom error.
    pub fn restrict_to_zoom_range(&mut self, min_zoom: u8, max_zoom: u8) {
        self.zoom_level_min = min_zoom;
        self.zoom_level_max = max_zoom;
    }

    /// Configures the spatial way filter applied on zoomed-in queries.
    pub fn set_way_filter(&mut self, way_filter: WayFilter) {
        self.way_filter = way_filter;
    }

    /// Closes the reader and releases the underlying byte source. Queries
    /// already running complete; every later call fails with
    /// [`ReadError::Closed`]. Idempotent.
    pub fn close(&self) {
        self.source.lock().expect("source lock poisoned").take();
    }

    /// Reads all POIs and ways for one tile.
    pub fn read_map_data(&self, tile: &Tile) -> Result<MapReadResult, ReadError> {
        self.read_in_range(tile, tile, Selector::All)
    }

    /// Reads only POIs for one tile; way geometry is skipped undecoded.
    pub fn read_poi_data(&self, tile: &Tile) -> Result<MapReadResult, ReadError> {
        self.read_in_range(tile, tile, Selector::Pois)
    }

    /// Reads POIs and only those ways carrying a name, house number or
    /// ref, for label layers.
    pub fn read_named_items(&self, tile: &Tile) -> Result<MapReadResult, ReadError> {
        self.read_in_range(tile, tile, Selector::Named)
    }

    /// Reads a rectangular tile range in one pass. Both corner tiles must
    /// share a zoom level and `upper_left` must not lie below or right of
    /// `lower_right`.
    pub fn read_map_data_range(
        &self,
        upper_left: &Tile,
        lower_right: &Tile,
    ) -> Result<MapReadResult, ReadError> {
        self.read_in_range(upper_left, lower_right, Selector::All)
    }

    fn read_in_range(
        &self,
        upper_left: &Tile,
        lower_right: &Tile,
        selector: Selector,
    ) -> Result<MapReadResult, ReadError> {
        let source = self
            .source
            .lock()
            .expect("source lock poisoned")
            .clone()
            .ok_or(ReadError::Closed)?;

        if upper_left.zoom_level != lower_right.zoom_level
            || upper_left.tile_x > lower_right.tile_x
            || upper_left.tile_y > lower_right.tile_y
        {
            return Err(ReadError::InvalidTileRange);
        }

        let zoom_level = upper_left.zoom_level;
        if zoom_level < self.zoom_level_min || zoom_level > self.zoom_level_max {
            return Err(ReadError::UnsupportedZoom(zoom_level));
        }

        let query_zoom_level = self.header.query_zoom_level(zoom_level);
        let sub_file = self
            .header
            .sub_file_for_zoom(query_zoom_level)
            .ok_or(ReadError::UnsupportedZoom(query_zoom_level))?;

        let query = QueryParameters::plan(upper_left, lower_right, query_zoom_level, sub_file);
        if query.is_empty() {
            return Ok(MapReadResult::default());
        }

        let bounding_box = tile_range_bounding_box(upper_left, lower_right);
        self.process_blocks(source.as_ref(), &query, sub_file, &bounding_box, selector)
    }

    /// Scans the planned block range top to bottom, left to right. A
    /// failure confined to one block is logged and skipped; the query
    /// still returns the data of every decodable block.
    fn process_blocks(
        &self,
        source: &dyn ByteSource,
        query: &QueryParameters,
        sub_file: &SubFileParameter,
        bounding_box: &BoundingBox,
        selector: Selector,
    ) -> Result<MapReadResult, ReadError> {
        let decoder = BlockDecoder::new(self.header.info(), sub_file, query, bounding_box, self.way_filter);

        let mut result = MapReadResult::default();
        let mut all_water = true;
        let mut water_info_read = false;

        debug!(
            from_x = query.from_block_x,
            to_x = query.to_block_x,
            from_y = query.from_block_y,
            to_y = query.to_block_y,
            "processing blocks"
        );

        for row in query.from_block_y..=query.to_block_y {
            for column in query.from_block_x..=query.to_block_x {
                let block_number = (row * sub_file.blocks_width + column) as u64;

                let entry = match self
                    .index_cache
                    .get_index_entry(sub_file, source, block_number)
                {
                    Ok(entry) => entry,
                    Err(error) => {
                        warn!(block_number, %error, "skipping block, index entry unavailable");
                        continue;
                    }
                };

                all_water &= entry.is_water;
                water_info_read = true;

                if entry.block_offset == 0 {
                    warn!(block_number, "skipping block with zero offset");
                    continue;
                }
                if entry.block_offset > sub_file.sub_file_size {
                    warn!(
                        block_number,
                        offset = entry.block_offset,
                        "skipping block with offset past sub-file end"
                    );
                    continue;
                }

                let next_offset = if block_number + 1 == sub_file.number_of_blocks as u64 {
                    sub_file.sub_file_size
                } else {
                    match self
                        .index_cache
                        .get_index_entry(sub_file, source, block_number + 1)
                    {
                        Ok(next) if next.block_offset <= sub_file.sub_file_size => {
                            next.block_offset
                        }
                        Ok(next) => {
                            warn!(
                                block_number,
                                offset = next.block_offset,
                                "skipping block, next offset past sub-file end"
                            );
                            continue;
                        }
                        Err(error) => {
                            warn!(block_number, %error, "skipping block, next index entry unavailable");
                            continue;
                        }
                    }
                };

                let block_size = match next_offset.checked_sub(entry.block_offset) {
                    Some(0) | None => continue,
                    Some(size) => size as usize,
                };
                if block_size > MAXIMUM_BUFFER_SIZE {
                    warn!(block_number, block_size, "skipping oversized block");
                    continue;
                }

                let mut buffer = vec![0u8; block_size];
                let position = sub_file.start_address + entry.block_offset;
                if let Err(error) = source.read_at(position, &mut buffer) {
                    warn!(block_number, %error, "skipping unreadable block");
                    continue;
                }
                let mut cursor = match ByteCursor::new(buffer) {
                    Ok(cursor) => cursor,
                    Err(error) => {
                        warn!(block_number, %error, "skipping block");
                        continue;
                    }
                };

                let tile_latitude = MercatorProjection::tile_y_to_latitude(
                    sub_file.boundary_tile_top + row,
                    sub_file.base_zoom_level,
                );
                let tile_longitude = MercatorProjection::tile_x_to_longitude(
                    sub_file.boundary_tile_left + column,
                    sub_file.base_zoom_level,
                );

                match decoder.decode(&mut cursor, tile_latitude, tile_longitude, selector) {
                    Ok(block_data) => {
                        result.pois.extend(block_data.pois);
                        result.ways.extend(block_data.ways);
                    }
                    Err(error) => {
                        warn!(block_number, %error, "skipping undecodable block");
                        continue;
                    }
                }
            }
        }

        result.is_water = all_water && water_info_read;
        Ok(result)
    }
}

/// Geographic extent of the tile range spanned by two corner tiles.
fn tile_range_bounding_box(upper_left: &Tile, lower_right: &Tile) -> BoundingBox {
    let upper = upper_left.bounding_box();
    let lower = lower_right.bounding_box();
    BoundingBox {
        min_latitude: lower.min_latitude,
        min_longitude: upper.min_longitude,
        max_latitude: upper.max_latitude,
        max_longitude: lower.max_longitude,
    }
}
