//! In-memory map file fixtures for the integration tests.
//!
//! The builder encodes a minimal but complete map file: one sub-file with
//! a single block, covering a small bounding box around (10.05, 10.05).

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mapsforge_reader::{
    degrees_to_microdegrees, ByteSource, MapFile, MemorySource, MercatorProjection,
};

pub const FILE_VERSION: i32 = 5;
pub const MAP_DATE: i64 = 1_400_000_000_000;
pub const TILE_PIXEL_SIZE: u16 = 256;
pub const BASE_ZOOM: u8 = 8;
pub const ZOOM_MIN: u8 = 6;
pub const ZOOM_MAX: u8 = 10;

pub const MIN_LATITUDE: f64 = 10.0;
pub const MIN_LONGITUDE: f64 = 10.0;
pub const MAX_LATITUDE: f64 = 10.1;
pub const MAX_LONGITUDE: f64 = 10.1;

const DEBUG_SIGNATURE_INDEX: &str = "+++IndexStart+++";

#[derive(Debug, Clone, Default)]
pub struct PoiSpec {
    pub latitude: f64,
    pub longitude: f64,
    pub layer: u8,
    pub tag_ids: Vec<u32>,
    pub name: Option<String>,
    pub house_number: Option<String>,
    pub elevation: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct WaySpec {
    pub layer: u8,
    pub tag_ids: Vec<u32>,
    pub name: Option<String>,
    pub house_number: Option<String>,
    pub reference: Option<String>,
    /// Label anchor offsets relative to the first node, microdegrees,
    /// latitude first.
    pub label_offset: Option<(i32, i32)>,
    pub double_delta: bool,
    pub tile_bitmask: u16,
    /// Rings as (latitude, longitude) pairs.
    pub rings: Vec<Vec<(f64, f64)>>,
}

impl Default for WaySpec {
    fn default() -> Self {
        WaySpec {
            layer: 5,
            tag_ids: Vec::new(),
            name: None,
            house_number: None,
            reference: None,
            label_offset: None,
            double_delta: false,
            tile_bitmask: 0xffff,
            rings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapBuilder {
    pub debug: bool,
    pub water: bool,
    pub poi_tag_entries: Vec<String>,
    pub way_tag_entries: Vec<String>,
    pub start_position: Option<(f64, f64)>,
    pub start_zoom_level: Option<u8>,
    pub language_preference: Option<String>,
    pub comment: Option<String>,
    pub created_by: Option<String>,
    pub pois: Vec<PoiSpec>,
    pub ways: Vec<WaySpec>,
}

impl Default for MapBuilder {
    fn default() -> Self {
        MapBuilder {
            debug: false,
            water: false,
            poi_tag_entries: Vec::new(),
            way_tag_entries: Vec::new(),
            start_position: None,
            start_zoom_level: None,
            language_preference: None,
            comment: None,
            // Keeps even a minimal header above the reader's lower size
            // bound, like real writer output.
            created_by: Some("mapsforge-map-writer-test".to_string()),
            pois: Vec::new(),
            ways: Vec::new(),
        }
    }
}

impl MapBuilder {
    /// Top-left corner of the single block's base tile, `(latitude,
    /// longitude)`. All record offsets in the fixture are relative to it.
    pub fn tile_origin() -> (f64, f64) {
        let left = MercatorProjection::longitude_to_tile_x(MIN_LONGITUDE, BASE_ZOOM);
        let top = MercatorProjection::latitude_to_tile_y(MAX_LATITUDE, BASE_ZOOM);
        (
            MercatorProjection::tile_y_to_latitude(top, BASE_ZOOM),
            MercatorProjection::tile_x_to_longitude(left, BASE_ZOOM),
        )
    }

    pub fn build(&self) -> Vec<u8> {
        let body = self.encode_sub_file();

        // The sub-file addresses are variable-length, so the header size
        // depends on the values it encodes. Iterate to a fixed point.
        let mut start_address = 0u64;
        let header = loop {
            let header = self.encode_header(start_address, body.len() as u64);
            if header.len() as u64 == start_address {
                break header;
            }
            start_address = header.len() as u64;
        };

        let mut file = header;
        file.extend_from_slice(&body);
        file
    }

    pub fn open(&self) -> MapFile {
        MapFile::from_source(Arc::new(MemorySource::new(self.build())))
            .expect("fixture must parse")
    }

    fn encode_header(&self, start_address: u64, body_length: u64) -> Vec<u8> {
        let file_size = start_address + body_length;
        let index_start = start_address + if self.debug { 16 } else { 0 };

        let mut tail = Vec::new();
        write_i32(&mut tail, FILE_VERSION);
        write_i64(&mut tail, file_size as i64);
        write_i64(&mut tail, MAP_DATE);
        write_i32(&mut tail, degrees_to_microdegrees(MIN_LATITUDE));
        write_i32(&mut tail, degrees_to_microdegrees(MIN_LONGITUDE));
        write_i32(&mut tail, degrees_to_microdegrees(MAX_LATITUDE));
        write_i32(&mut tail, degrees_to_microdegrees(MAX_LONGITUDE));
        write_u16(&mut tail, TILE_PIXEL_SIZE);
        write_utf8(&mut tail, "Mercator");

        let mut flags = 0u8;
        if self.debug {
            flags |= 0x80;
        }
        if self.start_position.is_some() {
            flags |= 0x40;
        }
        if self.start_zoom_level.is_some() {
            flags |= 0x20;
        }
        if self.language_preference.is_some() {
            flags |= 0x10;
        }
        if self.comment.is_some() {
            flags |= 0x08;
        }
        if self.created_by.is_some() {
            flags |= 0x04;
        }
        tail.push(flags);

        if let Some((latitude, longitude)) = self.start_position {
            write_i32(&mut tail, degrees_to_microdegrees(latitude));
            write_i32(&mut tail, degrees_to_microdegrees(longitude));
        }
        if let Some(zoom_level) = self.start_zoom_level {
            tail.push(zoom_level);
        }
        if let Some(languages) = &self.language_preference {
            write_utf8(&mut tail, languages);
        }
        if let Some(comment) = &self.comment {
            write_utf8(&mut tail, comment);
        }
        if let Some(created_by) = &self.created_by {
            write_utf8(&mut tail, created_by);
        }

        write_vbe_u(&mut tail, self.poi_tag_entries.len() as u64);
        for entry in &self.poi_tag_entries {
            write_utf8(&mut tail, entry);
        }
        write_vbe_u(&mut tail, self.way_tag_entries.len() as u64);
        for entry in &self.way_tag_entries {
            write_utf8(&mut tail, entry);
        }

        tail.push(1); // sub-file count
        tail.push(BASE_ZOOM);
        tail.push(ZOOM_MIN);
        tail.push(ZOOM_MAX);
        write_vbe_u(&mut tail, start_address);
        write_vbe_u(&mut tail, body_length);
        write_vbe_u(&mut tail, index_start);

        let mut header = Vec::new();
        header.extend_from_slice(b"mapsforge binary OSM");
        write_i32(&mut header, tail.len() as i32);
        header.extend_from_slice(&tail);
        header
    }

    fn encode_sub_file(&self) -> Vec<u8> {
        let mut body = Vec::new();
        if self.debug {
            body.extend_from_slice(&signature(DEBUG_SIGNATURE_INDEX, 16));
        }

        // One block, starting right after the single index entry.
        let block_offset = body.len() as u64 + 5;
        let mut entry = block_offset;
        if self.water {
            entry |= 1 << 39;
        }
        body.extend_from_slice(&entry.to_be_bytes()[3..8]);
        body.extend_from_slice(&self.encode_block());
        body
    }

    fn encode_block(&self) -> Vec<u8> {
        let mut block = Vec::new();
        if self.debug {
            block.extend_from_slice(&signature("###TileStart", 32));
        }

        // All records live on the base zoom row of the cumulative table.
        let base_row = BASE_ZOOM - ZOOM_MIN;
        for row in ZOOM_MIN..=ZOOM_MAX {
            let (pois, ways) = if row - ZOOM_MIN == base_row {
                (self.pois.len(), self.ways.len())
            } else {
                (0, 0)
            };
            write_vbe_u(&mut block, pois as u64);
            write_vbe_u(&mut block, ways as u64);
        }

        let poi_section = self.encode_pois();
        let way_section = self.encode_ways();
        write_vbe_u(&mut block, poi_section.len() as u64);
        block.extend_from_slice(&poi_section);
        block.extend_from_slice(&way_section);
        block
    }

    fn encode_pois(&self) -> Vec<u8> {
        let (origin_latitude, origin_longitude) = Self::tile_origin();
        let mut section = Vec::new();

        for poi in &self.pois {
            if self.debug {
                section.extend_from_slice(&signature("***POIStart", 32));
            }
            write_vbe_s(&mut section, degrees_to_microdegrees(poi.latitude - origin_latitude));
            write_vbe_s(&mut section, degrees_to_microdegrees(poi.longitude - origin_longitude));
            section.push((poi.layer << 4) | poi.tag_ids.len() as u8);
            for id in &poi.tag_ids {
                write_vbe_u(&mut section, u64::from(*id));
            }

            let mut features = 0u8;
            if poi.name.is_some() {
                features |= 0x80;
            }
            if poi.house_number.is_some() {
                features |= 0x40;
            }
            if poi.elevation.is_some() {
                features |= 0x20;
            }
            section.push(features);

            if let Some(name) = &poi.name {
                write_utf8(&mut section, name);
            }
            if let Some(house_number) = &poi.house_number {
                write_utf8(&mut section, house_number);
            }
            if let Some(elevation) = poi.elevation {
                write_vbe_s(&mut section, elevation);
            }
        }

        section
    }

    fn encode_ways(&self) -> Vec<u8> {
        let mut section = Vec::new();

        for way in &self.ways {
            if self.debug {
                section.extend_from_slice(&signature("---WayStart", 32));
            }

            // The size field counts from the tile bitmask onward.
            let payload = encode_way_payload(way);
            write_vbe_u(&mut section, payload.len() as u64);
            section.extend_from_slice(&payload);
        }

        section
    }
}

fn encode_way_payload(way: &WaySpec) -> Vec<u8> {
    let (origin_latitude, origin_longitude) = MapBuilder::tile_origin();
    let mut payload = Vec::new();

    write_u16(&mut payload, way.tile_bitmask);
    payload.push((way.layer << 4) | way.tag_ids.len() as u8);
    for id in &way.tag_ids {
        write_vbe_u(&mut payload, u64::from(*id));
    }

    let mut features = 0u8;
    if way.name.is_some() {
        features |= 0x80;
    }
    if way.house_number.is_some() {
        features |= 0x40;
    }
    if way.reference.is_some() {
        features |= 0x20;
    }
    if way.label_offset.is_some() {
        features |= 0x10;
    }
    if way.double_delta {
        features |= 0x04;
    }
    payload.push(features);

    if let Some(name) = &way.name {
        write_utf8(&mut payload, name);
    }
    if let Some(house_number) = &way.house_number {
        write_utf8(&mut payload, house_number);
    }
    if let Some(reference) = &way.reference {
        write_utf8(&mut payload, reference);
    }
    if let Some((latitude_offset, longitude_offset)) = way.label_offset {
        write_vbe_s(&mut payload, latitude_offset);
        write_vbe_s(&mut payload, longitude_offset);
    }

    // Single way data block, implicit count.
    write_vbe_u(&mut payload, way.rings.len() as u64);
    for ring in &way.rings {
        write_vbe_u(&mut payload, ring.len() as u64);

        let positions: Vec<(i32, i32)> = ring
            .iter()
            .map(|(latitude, longitude)| {
                (
                    degrees_to_microdegrees(latitude - origin_latitude),
                    degrees_to_microdegrees(longitude - origin_longitude),
                )
            })
            .collect();

        if way.double_delta {
            let mut previous = (0i32, 0i32);
            let mut previous_delta = (0i32, 0i32);
            for (index, position) in positions.iter().enumerate() {
                if index == 0 {
                    write_vbe_s(&mut payload, position.0);
                    write_vbe_s(&mut payload, position.1);
                } else {
                    let delta = (position.0 - previous.0, position.1 - previous.1);
                    write_vbe_s(&mut payload, delta.0 - previous_delta.0);
                    write_vbe_s(&mut payload, delta.1 - previous_delta.1);
                    previous_delta = delta;
                }
                previous = *position;
            }
        } else {
            let mut previous = (0i32, 0i32);
            for (index, position) in positions.iter().enumerate() {
                if index == 0 {
                    write_vbe_s(&mut payload, position.0);
                    write_vbe_s(&mut payload, position.1);
                } else {
                    write_vbe_s(&mut payload, position.0 - previous.0);
                    write_vbe_s(&mut payload, position.1 - previous.1);
                }
                previous = *position;
            }
        }
    }

    payload
}

fn signature(prefix: &str, length: usize) -> Vec<u8> {
    let mut bytes = prefix.as_bytes().to_vec();
    bytes.resize(length, b' ');
    bytes
}

pub fn write_vbe_u(buffer: &mut Vec<u8>, mut value: u64) {
    while value > 0x7f {
        buffer.push((value & 0x7f) as u8 | 0x80);
        value >>= 7;
    }
    buffer.push(value as u8);
}

pub fn write_vbe_s(buffer: &mut Vec<u8>, value: i32) {
    let negative = value < 0;
    let mut value = value.unsigned_abs();
    while value > 0x3f {
        buffer.push((value & 0x7f) as u8 | 0x80);
        value >>= 7;
    }
    buffer.push(value as u8 | if negative { 0x40 } else { 0 });
}

pub fn write_utf8(buffer: &mut Vec<u8>, value: &str) {
    write_vbe_u(buffer, value.len() as u64);
    buffer.extend_from_slice(value.as_bytes());
}

pub fn write_u16(buffer: &mut Vec<u8>, value: u16) {
    buffer.extend_from_slice(&value.to_be_bytes());
}

pub fn write_i32(buffer: &mut Vec<u8>, value: i32) {
    buffer.extend_from_slice(&value.to_be_bytes());
}

pub fn write_i64(buffer: &mut Vec<u8>, value: i64) {
    buffer.extend_from_slice(&value.to_be_bytes());
}

/// Byte source that counts every read, for cache behavior tests.
pub struct CountingSource {
    inner: MemorySource,
    reads: AtomicUsize,
}

impl CountingSource {
    pub fn new(data: Vec<u8>) -> CountingSource {
        CountingSource {
            inner: MemorySource::new(data),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ByteSource for CountingSource {
    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_at(offset, buf)
    }
}

pub fn approx_equal(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}
