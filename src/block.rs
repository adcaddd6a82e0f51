use crate::cursor::ByteCursor;
use crate::error::DecodeError;
use crate::header::{FileInfo, SubFileParameter};
use crate::map_data::{PointOfInterest, Selector, Way};
use crate::query::QueryParameters;
use crate::types::{microdegrees_to_degrees, BoundingBox, LatLong, Tag, LONGITUDE_MAX, LONGITUDE_MIN};

const SIGNATURE_LENGTH_BLOCK: usize = 32;
const SIGNATURE_LENGTH_POI: usize = 32;
const SIGNATURE_LENGTH_WAY: usize = 32;

const TAG_KEY_ELE: &str = "ele";
const TAG_KEY_HOUSE_NUMBER: &str = "addr:housenumber";
const TAG_KEY_NAME: &str = "name";
const TAG_KEY_REF: &str = "ref";

const POI_FEATURE_NAME: u8 = 0x80;
const POI_FEATURE_HOUSE_NUMBER: u8 = 0x40;
const POI_FEATURE_ELEVATION: u8 = 0x20;

const WAY_FEATURE_NAME: u8 = 0x80;
const WAY_FEATURE_HOUSE_NUMBER: u8 = 0x40;
const WAY_FEATURE_REF: u8 = 0x20;
const WAY_FEATURE_LABEL_POSITION: u8 = 0x10;
const WAY_FEATURE_DATA_BLOCKS_BYTE: u8 = 0x08;
const WAY_FEATURE_DOUBLE_DELTA_ENCODING: u8 = 0x04;

const LAYER_BITMASK: u8 = 0xf0;
const LAYER_SHIFT: u8 = 4;
const NUMBER_OF_TAGS_BITMASK: u8 = 0x0f;

const MAX_WAY_NODES: u32 = i16::MAX as u32;
const MAX_WAY_COORDINATE_BLOCKS: u32 = i16::MAX as u32;

// A slightly out-of-range longitude near the date line is a rounding
// artifact of the delta encoding, not corruption.
const DATE_LINE_TOLERANCE: f64 = 0.001;

/// Spatial filter applied to way geometry when the query zoom is above the
/// sub-file's base zoom.
#[derive(Debug, Clone, Copy)]
pub struct WayFilter {
    pub enabled: bool,
    pub distance_meters: f64,
}

impl Default for WayFilter {
    fn default() -> Self {
        WayFilter {
            enabled: true,
            distance_meters: 20.0,
        }
    }
}

/// The decoded content of one tile block.
#[derive(Debug, Default)]
pub struct BlockData {
    pub pois: Vec<PointOfInterest>,
    pub ways: Vec<Way>,
}

/// Decodes tile blocks of one sub-file against a planned query.
///
/// The decoder is pure: it works on an in-memory block window and never
/// touches the file, so a decode failure is attributable to exactly one
/// block.
pub struct BlockDecoder<'a> {
    info: &'a FileInfo,
    sub_file: &'a SubFileParameter,
    query: &'a QueryParameters,
    bounding_box: BoundingBox,
    way_filter_bbox: BoundingBox,
    way_filter_enabled: bool,
}

impl<'a> BlockDecoder<'a> {
    /// `bounding_box` is the geographic extent of the queried tile range.
    pub fn new(
        info: &'a FileInfo,
        sub_file: &'a SubFileParameter,
        query: &'a QueryParameters,
        bounding_box: &BoundingBox,
        way_filter: WayFilter,
    ) -> BlockDecoder<'a> {
        let way_filter_bbox = if way_filter.enabled {
            bounding_box.extend_meters(way_filter.distance_meters)
        } else {
            *bounding_box
        };
        BlockDecoder {
            info,
            sub_file,
            query,
            bounding_box: *bounding_box,
            way_filter_bbox,
            way_filter_enabled: way_filter.enabled,
        }
    }

    /// Decodes one block whose tile origin is `(tile_latitude,
    /// tile_longitude)`, the top-left corner of the block's base tile.
    pub fn decode(
        &self,
        cursor: &mut ByteCursor,
        tile_latitude: f64,
        tile_longitude: f64,
        selector: Selector,
    ) -> Result<BlockData, DecodeError> {
        if self.info.debug_file {
            let signature = cursor.read_utf8_fixed(SIGNATURE_LENGTH_BLOCK)?;
            if !signature.starts_with("###TileStart") {
                return Err(DecodeError::InvalidSignature(signature));
            }
        }

        let (pois_on_level, ways_on_level) = self.read_zoom_table(cursor)?;

        let first_way_offset = cursor.read_vbe_u32()? as usize + cursor.position();
        if first_way_offset > cursor.len() {
            return Err(DecodeError::InvalidValue {
                field: "first way offset",
                value: first_way_offset as i64,
            });
        }

        // POIs and ways outside the block's own tile may be stored in it;
        // they only need filtering when the query is for a sub-tile.
        let filter_required = self.query.query_zoom_level > self.sub_file.base_zoom_level;

        let pois =
            self.decode_pois(cursor, tile_latitude, tile_longitude, pois_on_level, filter_required)?;

        let ways = if selector == Selector::Pois {
            Vec::new()
        } else {
            if cursor.position() > first_way_offset {
                return Err(DecodeError::InvalidValue {
                    field: "buffer position past first way offset",
                    value: cursor.position() as i64,
                });
            }
            cursor.set_position(first_way_offset)?;
            self.decode_ways(
                cursor,
                tile_latitude,
                tile_longitude,
                ways_on_level,
                filter_required,
                selector,
            )?
        };

        Ok(BlockData { pois, ways })
    }

    /// Reads the cumulative zoom table and returns the POI and way counts
    /// at the query zoom level.
    fn read_zoom_table(&self, cursor: &mut ByteCursor) -> Result<(usize, usize), DecodeError> {
        let rows = (self.sub_file.zoom_level_max - self.sub_file.zoom_level_min + 1) as usize;
        let row = (self.query.query_zoom_level - self.sub_file.zoom_level_min) as usize;

        let mut cumulated_pois = 0u64;
        let mut cumulated_ways = 0u64;
        let (mut pois_on_level, mut ways_on_level) = (0, 0);

        for current_row in 0..rows {
            cumulated_pois += u64::from(cursor.read_vbe_u32()?);
            cumulated_ways += u64::from(cursor.read_vbe_u32()?);
            if current_row == row {
                pois_on_level = cumulated_pois as usize;
                ways_on_level = cumulated_ways as usize;
            }
        }

        Ok((pois_on_level, ways_on_level))
    }

    fn decode_pois(
        &self,
        cursor: &mut ByteCursor,
        tile_latitude: f64,
        tile_longitude: f64,
        number_of_pois: usize,
        filter_required: bool,
    ) -> Result<Vec<PointOfInterest>, DecodeError> {
        let mut pois = Vec::new();

        for _ in 0..number_of_pois {
            if self.info.debug_file {
                let signature = cursor.read_utf8_fixed(SIGNATURE_LENGTH_POI)?;
                if !signature.starts_with("***POIStart") {
                    return Err(DecodeError::InvalidSignature(signature));
                }
            }

            let latitude = tile_latitude + microdegrees_to_degrees(cursor.read_vbe_s32()?);
            let longitude = tile_longitude + microdegrees_to_degrees(cursor.read_vbe_s32()?);

            let special_byte = cursor.read_u8()?;
            let layer = layer_from_special_byte(special_byte);
            let number_of_tags = special_byte & NUMBER_OF_TAGS_BITMASK;

            let mut tags = read_tags(cursor, &self.info.poi_tags, number_of_tags)?;

            let feature_byte = cursor.read_u8()?;
            if feature_byte & POI_FEATURE_NAME != 0 {
                tags.push(Tag::new(TAG_KEY_NAME, cursor.read_utf8()?));
            }
            if feature_byte & POI_FEATURE_HOUSE_NUMBER != 0 {
                tags.push(Tag::new(TAG_KEY_HOUSE_NUMBER, cursor.read_utf8()?));
            }
            if feature_byte & POI_FEATURE_ELEVATION != 0 {
                tags.push(Tag::new(TAG_KEY_ELE, cursor.read_vbe_s32()?.to_string()));
            }

            if !filter_required || self.bounding_box.contains(latitude, longitude) {
                pois.push(PointOfInterest {
                    layer,
                    tags,
                    position: LatLong::new(latitude, longitude),
                });
            }
        }

        Ok(pois)
    }

    fn decode_ways(
        &self,
        cursor: &mut ByteCursor,
        tile_latitude: f64,
        tile_longitude: f64,
        number_of_ways: usize,
        filter_required: bool,
        selector: Selector,
    ) -> Result<Vec<Way>, DecodeError> {
        let mut ways = Vec::new();

        for _ in 0..number_of_ways {
            if self.info.debug_file {
                let signature = cursor.read_utf8_fixed(SIGNATURE_LENGTH_WAY)?;
                if !signature.starts_with("---WayStart") {
                    return Err(DecodeError::InvalidSignature(signature));
                }
            }

            // The way data size counts from the tile bitmask onward, so a
            // bitmask-rejected way can be skipped without decoding it.
            let way_data_size = cursor.read_vbe_u32()? as usize;
            if way_data_size < 2 {
                return Err(DecodeError::InvalidValue {
                    field: "way data size",
                    value: way_data_size as i64,
                });
            }

            if self.query.use_tile_bitmask {
                let tile_bitmask = cursor.read_u16()?;
                if self.query.query_tile_bitmask & tile_bitmask == 0 {
                    cursor.skip(way_data_size - 2)?;
                    continue;
                }
            } else {
                cursor.skip(2)?;
            }

            let special_byte = cursor.read_u8()?;
            let layer = layer_from_special_byte(special_byte);
            let number_of_tags = special_byte & NUMBER_OF_TAGS_BITMASK;

            let mut tags = read_tags(cursor, &self.info.way_tags, number_of_tags)?;

            let feature_byte = cursor.read_u8()?;
            let feature_name = feature_byte & WAY_FEATURE_NAME != 0;
            let feature_house_number = feature_byte & WAY_FEATURE_HOUSE_NUMBER != 0;
            let feature_ref = feature_byte & WAY_FEATURE_REF != 0;
            let double_delta = feature_byte & WAY_FEATURE_DOUBLE_DELTA_ENCODING != 0;

            if feature_name {
                tags.push(Tag::new(TAG_KEY_NAME, cursor.read_utf8()?));
            }
            if feature_house_number {
                tags.push(Tag::new(TAG_KEY_HOUSE_NUMBER, cursor.read_utf8()?));
            }
            if feature_ref {
                tags.push(Tag::new(TAG_KEY_REF, cursor.read_utf8()?));
            }

            // Label offsets are relative to the first node of the first
            // ring, latitude first.
            let label_offsets = if feature_byte & WAY_FEATURE_LABEL_POSITION != 0 {
                let latitude_offset = cursor.read_vbe_s32()?;
                let longitude_offset = cursor.read_vbe_s32()?;
                Some((latitude_offset, longitude_offset))
            } else {
                None
            };

            let way_data_blocks = if feature_byte & WAY_FEATURE_DATA_BLOCKS_BYTE != 0 {
                cursor.read_vbe_u32()?
            } else {
                1
            };
            if way_data_blocks < 1 {
                return Err(DecodeError::InvalidValue {
                    field: "number of way data blocks",
                    value: i64::from(way_data_blocks),
                });
            }

            let named = feature_name || feature_house_number || feature_ref || has_label_tag(&tags);

            for _ in 0..way_data_blocks {
                let way_nodes =
                    decode_way_data_block(cursor, tile_latitude, tile_longitude, double_delta)?;

                if filter_required
                    && self.way_filter_enabled
                    && !way_intersects(&way_nodes, &self.way_filter_bbox)
                {
                    continue;
                }
                if selector == Selector::Named && !named {
                    continue;
                }

                let label_position = label_offsets.map(|(latitude_offset, longitude_offset)| {
                    let anchor = way_nodes[0][0];
                    LatLong::new(
                        anchor.latitude + microdegrees_to_degrees(latitude_offset),
                        anchor.longitude + microdegrees_to_degrees(longitude_offset),
                    )
                });

                ways.push(Way {
                    layer,
                    tags: tags.clone(),
                    way_nodes,
                    label_position,
                });
            }
        }

        Ok(ways)
    }
}

fn layer_from_special_byte(special_byte: u8) -> i8 {
    ((special_byte & LAYER_BITMASK) >> LAYER_SHIFT) as i8
}

/// Resolves tag ids against the shared dictionary.
fn read_tags(cursor: &mut ByteCursor, dictionary: &[Tag], count: u8) -> Result<Vec<Tag>, DecodeError> {
    let mut tags = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let id = cursor.read_vbe_u32()? as usize;
        let tag = dictionary.get(id).ok_or(DecodeError::TagIdOutOfRange {
            id,
            len: dictionary.len(),
        })?;
        tags.push(tag.clone());
    }
    Ok(tags)
}

fn has_label_tag(tags: &[Tag]) -> bool {
    tags.iter()
        .any(|tag| tag.key == TAG_KEY_NAME || tag.key == TAG_KEY_REF)
}

fn way_intersects(way_nodes: &[Vec<LatLong>], bbox: &BoundingBox) -> bool {
    way_nodes.iter().any(|ring| {
        BoundingBox::from_positions(ring)
            .map(|ring_bbox| bbox.intersects(&ring_bbox))
            .unwrap_or(false)
    })
}

/// Decodes one way data block: a ring count followed by that many
/// coordinate rings.
fn decode_way_data_block(
    cursor: &mut ByteCursor,
    tile_latitude: f64,
    tile_longitude: f64,
    double_delta: bool,
) -> Result<Vec<Vec<LatLong>>, DecodeError> {
    let number_of_rings = cursor.read_vbe_u32()?;
    if number_of_rings < 1 || number_of_rings > MAX_WAY_COORDINATE_BLOCKS {
        return Err(DecodeError::InvalidValue {
            field: "number of way coordinate blocks",
            value: i64::from(number_of_rings),
        });
    }

    let mut rings = Vec::with_capacity(number_of_rings as usize);
    for _ in 0..number_of_rings {
        let number_of_nodes = cursor.read_vbe_u32()?;
        if number_of_nodes < 2 || number_of_nodes > MAX_WAY_NODES {
            return Err(DecodeError::InvalidValue {
                field: "number of way nodes",
                value: i64::from(number_of_nodes),
            });
        }

        let ring = if double_delta {
            decode_double_delta_ring(cursor, number_of_nodes as usize, tile_latitude, tile_longitude)?
        } else {
            decode_single_delta_ring(cursor, number_of_nodes as usize, tile_latitude, tile_longitude)?
        };
        rings.push(ring);
    }

    Ok(rings)
}

/// Decodes a ring of single-delta encoded nodes: the first node is an
/// offset from the tile origin, every later node an offset from its
/// predecessor.
pub fn decode_single_delta_ring(
    cursor: &mut ByteCursor,
    number_of_nodes: usize,
    tile_latitude: f64,
    tile_longitude: f64,
) -> Result<Vec<LatLong>, DecodeError> {
    let mut latitude = tile_latitude + microdegrees_to_degrees(cursor.read_vbe_s32()?);
    let mut longitude = tile_longitude + microdegrees_to_degrees(cursor.read_vbe_s32()?);

    let mut ring = Vec::with_capacity(number_of_nodes);
    ring.push(LatLong::new(latitude, longitude));

    for _ in 1..number_of_nodes {
        latitude += microdegrees_to_degrees(cursor.read_vbe_s32()?);
        longitude += microdegrees_to_degrees(cursor.read_vbe_s32()?);
        longitude = clamp_longitude(longitude);
        ring.push(LatLong::new(latitude, longitude));
    }

    Ok(ring)
}

/// Decodes a ring of double-delta encoded nodes: each stored value is the
/// change of the previous single delta.
pub fn decode_double_delta_ring(
    cursor: &mut ByteCursor,
    number_of_nodes: usize,
    tile_latitude: f64,
    tile_longitude: f64,
) -> Result<Vec<LatLong>, DecodeError> {
    let mut latitude = tile_latitude + microdegrees_to_degrees(cursor.read_vbe_s32()?);
    let mut longitude = tile_longitude + microdegrees_to_degrees(cursor.read_vbe_s32()?);

    let mut ring = Vec::with_capacity(number_of_nodes);
    ring.push(LatLong::new(latitude, longitude));

    let mut previous_delta_latitude = 0.0;
    let mut previous_delta_longitude = 0.0;

    for _ in 1..number_of_nodes {
        let delta_latitude =
            microdegrees_to_degrees(cursor.read_vbe_s32()?) + previous_delta_latitude;
        let delta_longitude =
            microdegrees_to_degrees(cursor.read_vbe_s32()?) + previous_delta_longitude;

        latitude += delta_latitude;
        longitude += delta_longitude;
        longitude = clamp_longitude(longitude);

        ring.push(LatLong::new(latitude, longitude));

        previous_delta_latitude = delta_latitude;
        previous_delta_longitude = delta_longitude;
    }

    Ok(ring)
}

/// Snaps a longitude just past the date line back onto it.
fn clamp_longitude(longitude: f64) -> f64 {
    if longitude < LONGITUDE_MIN && LONGITUDE_MIN - longitude < DATE_LINE_TOLERANCE {
        LONGITUDE_MIN
    } else if longitude > LONGITUDE_MAX && longitude - LONGITUDE_MAX < DATE_LINE_TOLERANCE {
        LONGITUDE_MAX
    } else {
        longitude
    }
}
