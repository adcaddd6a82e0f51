use tracing::debug;

use crate::cursor::ByteCursor;
use crate::error::FormatError;
use crate::mercator::MercatorProjection;
use crate::source::ByteSource;
use crate::types::{microdegrees_to_degrees, BoundingBox, LatLong, Tag};

const MAGIC_BYTE: &str = "mapsforge binary OSM";
const HEADER_SIZE_MIN: i32 = 70;
const HEADER_SIZE_MAX: i32 = 1_000_000;
const SUPPORTED_FILE_VERSION_MIN: i32 = 3;
const SUPPORTED_FILE_VERSION_MAX: i32 = 5;
const MERCATOR: &str = "Mercator";
const BASE_ZOOM_LEVEL_MAX: u8 = 20;
const ZOOM_LEVEL_MAX: u8 = 22;
// 2008-01-10, before the first map files were produced.
const OLDEST_SUPPORTED_MAP_DATE: i64 = 1_200_000_000_000;

const HEADER_FLAG_DEBUG: u8 = 0x80;
const HEADER_FLAG_START_POSITION: u8 = 0x40;
const HEADER_FLAG_START_ZOOM_LEVEL: u8 = 0x20;
const HEADER_FLAG_LANGUAGE_PREFERENCE: u8 = 0x10;
const HEADER_FLAG_COMMENT: u8 = 0x08;
const HEADER_FLAG_CREATED_BY: u8 = 0x04;

/// Immutable metadata of an open map file, produced once by
/// [`FileHeader::parse`].
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub file_version: i32,
    pub file_size: u64,
    pub bounding_box: BoundingBox,
    pub map_date: i64,
    pub tile_pixel_size: u16,
    pub projection_name: String,
    pub debug_file: bool,
    pub start_position: Option<LatLong>,
    pub start_zoom_level: Option<u8>,
    pub language_preference: Option<String>,
    pub comment: Option<String>,
    pub created_by: Option<String>,
    pub poi_tags: Vec<Tag>,
    pub way_tags: Vec<Tag>,
    pub number_of_sub_files: u8,
    pub zoom_level_min: u8,
    pub zoom_level_max: u8,
}

/// Derived geometry of one sub-file: the zoom range it serves, its byte
/// range inside the file and the block grid covering the file's bounding
/// box at the sub-file's base zoom level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubFileParameter {
    /// Ordinal of this sub-file in header order, used as a cache key.
    pub id: usize,
    pub base_zoom_level: u8,
    pub zoom_level_min: u8,
    pub zoom_level_max: u8,
    pub start_address: u64,
    pub sub_file_size: u64,
    pub index_start_address: u64,
    pub index_end_address: u64,
    pub boundary_tile_left: i64,
    pub boundary_tile_top: i64,
    pub blocks_width: i64,
    pub blocks_height: i64,
    pub number_of_blocks: i64,
}

impl SubFileParameter {
    pub const BYTES_PER_INDEX_ENTRY: u64 = 5;

    fn derive(
        id: usize,
        base_zoom_level: u8,
        zoom_level_min: u8,
        zoom_level_max: u8,
        start_address: u64,
        sub_file_size: u64,
        index_start_address: u64,
        bounding_box: &BoundingBox,
    ) -> SubFileParameter {
        let boundary_tile_left =
            MercatorProjection::longitude_to_tile_x(bounding_box.min_longitude, base_zoom_level);
        let boundary_tile_right =
            MercatorProjection::longitude_to_tile_x(bounding_box.max_longitude, base_zoom_level);
        let boundary_tile_top =
            MercatorProjection::latitude_to_tile_y(bounding_box.max_latitude, base_zoom_level);
        let boundary_tile_bottom =
            MercatorProjection::latitude_to_tile_y(bounding_box.min_latitude, base_zoom_level);

        let blocks_width = boundary_tile_right - boundary_tile_left + 1;
        let blocks_height = boundary_tile_bottom - boundary_tile_top + 1;
        let number_of_blocks = blocks_width * blocks_height;

        SubFileParameter {
            id,
            base_zoom_level,
            zoom_level_min,
            zoom_level_max,
            start_address,
            sub_file_size,
            index_start_address,
            index_end_address: index_start_address
                + number_of_blocks as u64 * Self::BYTES_PER_INDEX_ENTRY,
            boundary_tile_left,
            boundary_tile_top,
            blocks_width,
            blocks_height,
            number_of_blocks,
        }
    }
}

/// Parsed file preamble: global metadata plus one [`SubFileParameter`]
/// per stored zoom interval, with a dense zoom lookup table.
pub struct FileHeader {
    info: FileInfo,
    sub_files: Vec<SubFileParameter>,
    // Index into `sub_files` for every zoom level 0..=zoom_level_max.
    zoom_table: Vec<Option<usize>>,
}

impl FileHeader {
    /// Reads and validates the complete header. Any violated invariant
    /// aborts the open; there is no partial recovery from a bad header.
    pub fn parse(source: &dyn ByteSource) -> Result<FileHeader, FormatError> {
        let preamble_length = MAGIC_BYTE.len() + 4;
        let mut preamble = vec![0u8; preamble_length];
        source.read_at(0, &mut preamble)?;
        let mut cursor = ByteCursor::new(preamble)?;

        let magic = cursor.read_utf8_fixed(MAGIC_BYTE.len())?;
        if magic != MAGIC_BYTE {
            return Err(FormatError::InvalidMagic(magic));
        }

        let remaining_size = cursor.read_i32()?;
        if !(HEADER_SIZE_MIN..=HEADER_SIZE_MAX).contains(&remaining_size) {
            return Err(FormatError::InvalidField {
                field: "remaining header size",
                value: i64::from(remaining_size),
            });
        }

        let mut remaining = vec![0u8; remaining_size as usize];
        source.read_at(preamble_length as u64, &mut remaining)?;
        let mut cursor = ByteCursor::new(remaining)?;

        let file_version = cursor.read_i32()?;
        if !(SUPPORTED_FILE_VERSION_MIN..=SUPPORTED_FILE_VERSION_MAX).contains(&file_version) {
            return Err(FormatError::UnsupportedVersion(file_version));
        }

        let file_size = cursor.read_i64()?;
        if file_size <= 0 || (file_size as u64) > source.size() {
            return Err(FormatError::InvalidField {
                field: "file size",
                value: file_size,
            });
        }
        let file_size = file_size as u64;

        let map_date = cursor.read_i64()?;
        if map_date < OLDEST_SUPPORTED_MAP_DATE {
            return Err(FormatError::InvalidField {
                field: "map date",
                value: map_date,
            });
        }

        let min_latitude = microdegrees_to_degrees(cursor.read_i32()?);
        let min_longitude = microdegrees_to_degrees(cursor.read_i32()?);
        let max_latitude = microdegrees_to_degrees(cursor.read_i32()?);
        let max_longitude = microdegrees_to_degrees(cursor.read_i32()?);
        let bounding_box = BoundingBox::new(min_latitude, min_longitude, max_latitude, max_longitude)?;

        let tile_pixel_size = cursor.read_u16()?;

        let projection_name = cursor.read_utf8()?;
        if projection_name != MERCATOR {
            return Err(FormatError::UnsupportedProjection(projection_name));
        }

        let flags = cursor.read_u8()?;
        let debug_file = flags & HEADER_FLAG_DEBUG != 0;

        let start_position = if flags & HEADER_FLAG_START_POSITION != 0 {
            let latitude = microdegrees_to_degrees(cursor.read_i32()?);
            let longitude = microdegrees_to_degrees(cursor.read_i32()?);
            Some(LatLong::new(latitude, longitude))
        } else {
            None
        };

        let start_zoom_level = if flags & HEADER_FLAG_START_ZOOM_LEVEL != 0 {
            let zoom_level = cursor.read_u8()?;
            if zoom_level > ZOOM_LEVEL_MAX {
                return Err(FormatError::InvalidField {
                    field: "start zoom level",
                    value: i64::from(zoom_level),
                });
            }
            Some(zoom_level)
        } else {
            None
        };

        let language_preference = if flags & HEADER_FLAG_LANGUAGE_PREFERENCE != 0 {
            Some(cursor.read_utf8()?)
        } else {
            None
        };
        let comment = if flags & HEADER_FLAG_COMMENT != 0 {
            Some(cursor.read_utf8()?)
        } else {
            None
        };
        let created_by = if flags & HEADER_FLAG_CREATED_BY != 0 {
            Some(cursor.read_utf8()?)
        } else {
            None
        };

        let poi_tags = read_tag_table(&mut cursor)?;
        let way_tags = read_tag_table(&mut cursor)?;

        let number_of_sub_files = cursor.read_u8()?;
        if number_of_sub_files < 1 {
            return Err(FormatError::InvalidField {
                field: "number of sub-files",
                value: i64::from(number_of_sub_files),
            });
        }

        let mut sub_files = Vec::with_capacity(number_of_sub_files as usize);
        let mut zoom_level_min = u8::MAX;
        let mut zoom_level_max = 0u8;

        for id in 0..number_of_sub_files as usize {
            let sub_file = read_sub_file_parameter(&mut cursor, id, file_size, &bounding_box)?;
            zoom_level_min = zoom_level_min.min(sub_file.zoom_level_min);
            zoom_level_max = zoom_level_max.max(sub_file.zoom_level_max);
            sub_files.push(sub_file);
        }

        // First sub-file covering a zoom level wins; gaps stay empty and
        // surface as an unsupported-zoom error at query time.
        let mut zoom_table = vec![None; zoom_level_max as usize + 1];
        for (index, sub_file) in sub_files.iter().enumerate() {
            for zoom in sub_file.zoom_level_min..=sub_file.zoom_level_max {
                let slot = &mut zoom_table[zoom as usize];
                if slot.is_none() {
                    *slot = Some(index);
                }
            }
        }

        debug!(
            sub_files = sub_files.len(),
            zoom_level_min, zoom_level_max, "parsed map file header"
        );

        Ok(FileHeader {
            info: FileInfo {
                file_version,
                file_size,
                bounding_box,
                map_date,
                tile_pixel_size,
                projection_name,
                debug_file,
                start_position,
                start_zoom_level,
                language_preference,
                comment,
                created_by,
                poi_tags,
                way_tags,
                number_of_sub_files,
                zoom_level_min,
                zoom_level_max,
            },
            sub_files,
            zoom_table,
        })
    }

    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    /// Clamps a requested zoom level into the range the file serves.
    pub fn query_zoom_level(&self, zoom_level: u8) -> u8 {
        zoom_level.clamp(self.info.zoom_level_min, self.info.zoom_level_max)
    }

    /// The sub-file whose zoom interval covers `zoom_level`, if any.
    pub fn sub_file_for_zoom(&self, zoom_level: u8) -> Option<&SubFileParameter> {
        self.zoom_table
            .get(zoom_level as usize)
            .copied()
            .flatten()
            .map(|index| &self.sub_files[index])
    }
}

/// Reads one tag dictionary: a VBE-U entry count followed by that many
/// length-prefixed `key=value` strings.
fn read_tag_table(cursor: &mut ByteCursor) -> Result<Vec<Tag>, FormatError> {
    let number_of_tags = cursor.read_vbe_u32()? as usize;
    let mut tags = Vec::with_capacity(number_of_tags.min(1024));
    for _ in 0..number_of_tags {
        tags.push(Tag::from_entry(&cursor.read_utf8()?));
    }
    Ok(tags)
}

fn read_sub_file_parameter(
    cursor: &mut ByteCursor,
    id: usize,
    file_size: u64,
    bounding_box: &BoundingBox,
) -> Result<SubFileParameter, FormatError> {
    let base_zoom_level = cursor.read_u8()?;
    if base_zoom_level > BASE_ZOOM_LEVEL_MAX {
        return Err(FormatError::InvalidField {
            field: "base zoom level",
            value: i64::from(base_zoom_level),
        });
    }

    let zoom_level_min = cursor.read_u8()?;
    let zoom_level_max = cursor.read_u8()?;
    if zoom_level_min > ZOOM_LEVEL_MAX || zoom_level_max > ZOOM_LEVEL_MAX {
        return Err(FormatError::InvalidField {
            field: "zoom level",
            value: i64::from(zoom_level_min.max(zoom_level_max)),
        });
    }
    if !(zoom_level_min <= base_zoom_level && base_zoom_level <= zoom_level_max) {
        return Err(FormatError::InvalidField {
            field: "zoom interval",
            value: i64::from(base_zoom_level),
        });
    }

    let start_address = cursor.read_vbe_u64()?;
    if start_address < HEADER_SIZE_MIN as u64 || start_address >= file_size {
        return Err(FormatError::InvalidField {
            field: "sub-file start address",
            value: start_address as i64,
        });
    }

    let sub_file_size = cursor.read_vbe_u64()?;
    if sub_file_size < 1 || start_address + sub_file_size > file_size {
        return Err(FormatError::InvalidField {
            field: "sub-file size",
            value: sub_file_size as i64,
        });
    }

    let index_start_address = cursor.read_vbe_u64()?;
    if index_start_address < start_address || index_start_address >= start_address + sub_file_size {
        return Err(FormatError::InvalidField {
            field: "index start address",
            value: index_start_address as i64,
        });
    }

    let sub_file = SubFileParameter::derive(
        id,
        base_zoom_level,
        zoom_level_min,
        zoom_level_max,
        start_address,
        sub_file_size,
        index_start_address,
        bounding_box,
    );

    if sub_file.index_end_address > start_address + sub_file_size {
        return Err(FormatError::InvalidField {
            field: "index end address",
            value: sub_file.index_end_address as i64,
        });
    }

    Ok(sub_file)
}
