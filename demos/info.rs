//! Prints the header metadata of a map file.
//!
//! Usage: cargo run --example info -- <file.map>

use std::process::ExitCode;

use mapsforge_reader::MapFile;

fn main() -> ExitCode {
    tracing_subscriber::fmt().init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: info <file.map>");
        return ExitCode::FAILURE;
    };

    let map = match MapFile::open(&path) {
        Ok(map) => map,
        Err(error) => {
            eprintln!("cannot open {path}: {error}");
            return ExitCode::FAILURE;
        }
    };

    let info = map.info();
    println!("file version:   {}", info.file_version);
    println!("file size:      {} bytes", info.file_size);
    println!("map date:       {}", info.map_date);
    println!("projection:     {}", info.projection_name);
    println!("tile size:      {} px", info.tile_pixel_size);
    println!("debug file:     {}", info.debug_file);
    println!(
        "bounding box:   {:.6}, {:.6} / {:.6}, {:.6}",
        info.bounding_box.min_latitude,
        info.bounding_box.min_longitude,
        info.bounding_box.max_latitude,
        info.bounding_box.max_longitude
    );
    println!("zoom levels:    {}..={}", info.zoom_level_min, info.zoom_level_max);
    println!("sub-files:      {}", info.number_of_sub_files);
    println!("poi tags:       {}", info.poi_tags.len());
    println!("way tags:       {}", info.way_tags.len());

    let start = map.start_position();
    println!(
        "start position: {:.6}, {:.6} @ z{}",
        start.latitude,
        start.longitude,
        map.start_zoom_level()
    );
    if let Some(languages) = map.map_languages() {
        println!("languages:      {}", languages.join(", "));
    }
    if let Some(comment) = &info.comment {
        println!("comment:        {comment}");
    }
    if let Some(created_by) = &info.created_by {
        println!("created by:     {created_by}");
    }

    ExitCode::SUCCESS
}
