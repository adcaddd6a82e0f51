mod common;

use std::sync::Arc;

use mapsforge_reader::{FormatError, LatLong, MapFile, MemorySource};

use common::{approx_equal, MapBuilder, FILE_VERSION, MAP_DATE, TILE_PIXEL_SIZE};

fn open_bytes(bytes: Vec<u8>) -> Result<MapFile, FormatError> {
    MapFile::from_source(Arc::new(MemorySource::new(bytes)))
}

#[test]
fn file_info_fields() {
    let map = MapBuilder {
        start_position: Some((10.05, 10.02)),
        start_zoom_level: Some(9),
        language_preference: Some("en,de".to_string()),
        comment: Some("testcomment".to_string()),
        created_by: Some("mapsforge-map-writer-0.3.1".to_string()),
        poi_tag_entries: vec!["amenity=cafe".to_string()],
        way_tag_entries: vec!["highway=primary".to_string(), "building=yes".to_string()],
        ..Default::default()
    }
    .open();

    let info = map.info();
    assert_eq!(info.file_version, FILE_VERSION);
    assert_eq!(info.map_date, MAP_DATE);
    assert_eq!(info.tile_pixel_size, TILE_PIXEL_SIZE);
    assert_eq!(info.projection_name, "Mercator");
    assert_eq!(info.number_of_sub_files, 1);
    assert_eq!(info.zoom_level_min, 6);
    assert_eq!(info.zoom_level_max, 10);
    assert!(!info.debug_file);

    assert!(approx_equal(info.bounding_box.min_latitude, 10.0, 1e-9));
    assert!(approx_equal(info.bounding_box.max_longitude, 10.1, 1e-9));

    assert_eq!(info.start_position, Some(LatLong::new(10.05, 10.02)));
    assert_eq!(info.start_zoom_level, Some(9));
    assert_eq!(info.comment.as_deref(), Some("testcomment"));
    assert_eq!(info.created_by.as_deref(), Some("mapsforge-map-writer-0.3.1"));

    assert_eq!(info.poi_tags.len(), 1);
    assert_eq!(info.poi_tags[0].key, "amenity");
    assert_eq!(info.poi_tags[0].value, "cafe");
    assert_eq!(info.way_tags.len(), 2);
    assert_eq!(info.way_tags[1].value, "yes");

    assert_eq!(
        map.map_languages(),
        Some(vec!["en".to_string(), "de".to_string()])
    );
}

#[test]
fn start_position_defaults_to_bounding_box_center() {
    let map = MapBuilder::default().open();
    assert!(map.info().start_position.is_none());

    let start = map.start_position();
    assert!(approx_equal(start.latitude, 10.05, 1e-9));
    assert!(approx_equal(start.longitude, 10.05, 1e-9));
    assert_eq!(map.start_zoom_level(), 12);
}

#[test]
fn explicit_start_settings_win() {
    let map = MapBuilder {
        start_position: Some((10.08, 10.01)),
        start_zoom_level: Some(15),
        ..Default::default()
    }
    .open();

    assert!(approx_equal(map.start_position().latitude, 10.08, 1e-9));
    assert_eq!(map.start_zoom_level(), 15);
}

#[test]
fn empty_optional_strings_parse_as_blank() {
    let map = MapBuilder {
        comment: Some(String::new()),
        language_preference: Some(String::new()),
        ..Default::default()
    }
    .open();

    assert_eq!(map.info().comment.as_deref(), Some(""));
    assert_eq!(map.map_languages(), Some(vec![String::new()]));
}

#[test]
fn rejects_invalid_magic() {
    let mut bytes = MapBuilder::default().build();
    bytes[0] = b'X';

    match open_bytes(bytes) {
        Err(FormatError::InvalidMagic(_)) => {}
        other => panic!("expected invalid magic, got {:?}", other.err()),
    }
}

#[test]
fn rejects_unsupported_version() {
    let mut bytes = MapBuilder::default().build();
    // Version is the first field after the 20-byte magic and the 4-byte
    // remaining-size field.
    bytes[24..28].copy_from_slice(&99i32.to_be_bytes());

    match open_bytes(bytes) {
        Err(FormatError::UnsupportedVersion(99)) => {}
        other => panic!("expected unsupported version, got {:?}", other.err()),
    }
}

#[test]
fn rejects_truncated_file() {
    let bytes = MapBuilder::default().build();
    let truncated = bytes[..40].to_vec();

    assert!(matches!(open_bytes(truncated), Err(FormatError::Io(_))));
}

#[test]
fn rejects_declared_size_beyond_actual() {
    let builder = MapBuilder::default();
    let mut bytes = builder.build();
    let too_large = (bytes.len() as i64 + 1).to_be_bytes();
    // Declared file size follows the version field.
    bytes[28..36].copy_from_slice(&too_large);

    match open_bytes(bytes) {
        Err(FormatError::InvalidField { field, .. }) => assert_eq!(field, "file size"),
        other => panic!("expected invalid file size, got {:?}", other.err()),
    }
}

#[test]
fn rejects_inverted_bounding_box() {
    let mut bytes = MapBuilder::default().build();
    // min latitude (first bounding box field) above max latitude.
    bytes[44..48].copy_from_slice(&11_000_000i32.to_be_bytes());

    assert!(matches!(
        open_bytes(bytes),
        Err(FormatError::InvalidBoundingBox(..))
    ));
}

#[test]
fn rejects_stale_map_date() {
    let mut bytes = MapBuilder::default().build();
    // Map date follows the declared file size.
    bytes[36..44].copy_from_slice(&1_000i64.to_be_bytes());

    match open_bytes(bytes) {
        Err(FormatError::InvalidField { field, .. }) => assert_eq!(field, "map date"),
        other => panic!("expected invalid map date, got {:?}", other.err()),
    }
}

#[test]
fn data_timestamp_is_zero_for_memory_sources() {
    let map = MapBuilder::default().open();
    assert_eq!(map.data_timestamp(), 0);
}
