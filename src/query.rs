use crate::header::SubFileParameter;
use crate::tile::Tile;

/// A planned block scan for one query: the base-tile range mapped into the
/// sub-file's block grid, plus the sub-tile bitmask used to filter ways
/// when the query zoom is above the base zoom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameters {
    pub query_zoom_level: u8,
    pub from_base_tile_x: i64,
    pub from_base_tile_y: i64,
    pub to_base_tile_x: i64,
    pub to_base_tile_y: i64,
    pub from_block_x: i64,
    pub from_block_y: i64,
    pub to_block_x: i64,
    pub to_block_y: i64,
    pub use_tile_bitmask: bool,
    pub query_tile_bitmask: u16,
}

impl QueryParameters {
    /// Plans the scan for the tile range `upper_left..=lower_right` (both at
    /// the same zoom level) against one sub-file. `query_zoom_level` is the
    /// clamped zoom the zoom table will be cut off at.
    pub fn plan(
        upper_left: &Tile,
        lower_right: &Tile,
        query_zoom_level: u8,
        sub_file: &SubFileParameter,
    ) -> QueryParameters {
        let zoom_level = upper_left.zoom_level;
        let (from_x, from_y, to_x, to_y, use_bitmask, bitmask) =
            if zoom_level < sub_file.base_zoom_level {
                // Zoomed out past the base level: one query tile covers
                // several base tiles, so the covered range is read whole.
                let difference = sub_file.base_zoom_level - zoom_level;
                (
                    upper_left.tile_x << difference,
                    upper_left.tile_y << difference,
                    (lower_right.tile_x << difference) + (1 << difference) - 1,
                    (lower_right.tile_y << difference) + (1 << difference) - 1,
                    false,
                    0,
                )
            } else if zoom_level > sub_file.base_zoom_level {
                // Zoomed in past the base level: the query tiles are
                // sub-tiles of their base tiles and ways get filtered by
                // the occupancy bitmask.
                let difference = zoom_level - sub_file.base_zoom_level;
                (
                    upper_left.tile_x >> difference,
                    upper_left.tile_y >> difference,
                    lower_right.tile_x >> difference,
                    lower_right.tile_y >> difference,
                    true,
                    tile_bitmask_range(upper_left, lower_right, difference),
                )
            } else {
                (
                    upper_left.tile_x,
                    upper_left.tile_y,
                    lower_right.tile_x,
                    lower_right.tile_y,
                    false,
                    0,
                )
            };

        QueryParameters {
            query_zoom_level,
            from_base_tile_x: from_x,
            from_base_tile_y: from_y,
            to_base_tile_x: to_x,
            to_base_tile_y: to_y,
            from_block_x: i64::max(from_x - sub_file.boundary_tile_left, 0),
            from_block_y: i64::max(from_y - sub_file.boundary_tile_top, 0),
            to_block_x: i64::min(to_x - sub_file.boundary_tile_left, sub_file.blocks_width - 1),
            to_block_y: i64::min(to_y - sub_file.boundary_tile_top, sub_file.blocks_height - 1),
            use_tile_bitmask: use_bitmask,
            query_tile_bitmask: bitmask,
        }
    }

    /// True if the planned block range is empty, i.e. the query lies
    /// entirely outside the sub-file's grid.
    pub fn is_empty(&self) -> bool {
        self.from_block_x > self.to_block_x || self.from_block_y > self.to_block_y
    }
}

/// Union of the bitmasks of every query tile in the range.
fn tile_bitmask_range(upper_left: &Tile, lower_right: &Tile, zoom_level_difference: u8) -> u16 {
    let mut bitmask = 0;
    for tile_x in upper_left.tile_x..=lower_right.tile_x {
        for tile_y in upper_left.tile_y..=lower_right.tile_y {
            let tile = Tile::new(tile_x, tile_y, upper_left.zoom_level);
            bitmask |= tile_bitmask(&tile, zoom_level_difference);
        }
    }
    bitmask
}

/// The 16-bit mask selecting the 1/16th of a base tile that contains the
/// given query tile. At one level below the base tile the four quadrant
/// masks cover four bits each; deeper levels select a single bit of the
/// quadrant holding the tile.
fn tile_bitmask(tile: &Tile, zoom_level_difference: u8) -> u16 {
    if zoom_level_difference == 1 {
        return first_level_bitmask(tile.tile_x, tile.tile_y);
    }

    // Project the tile down to the second level below the base tile.
    let subtile_x = tile.tile_x >> (zoom_level_difference - 2);
    let subtile_y = tile.tile_y >> (zoom_level_difference - 2);
    let parent_x = subtile_x >> 1;
    let parent_y = subtile_y >> 1;

    // The 16 bits form a row-major 4x4 grid of sub-tiles, so the four
    // positions inside a quadrant differ by a per-quadrant shift.
    let within_quadrant = second_level_bitmask(subtile_x, subtile_y);
    match (parent_x % 2, parent_y % 2) {
        (0, 0) => within_quadrant << 10,
        (_, 0) => within_quadrant << 8,
        (0, _) => within_quadrant << 2,
        _ => within_quadrant,
    }
}

fn first_level_bitmask(tile_x: i64, tile_y: i64) -> u16 {
    match (tile_x % 2, tile_y % 2) {
        (0, 0) => 0xcc00,
        (_, 0) => 0x3300,
        (0, _) => 0x00cc,
        _ => 0x0033,
    }
}

fn second_level_bitmask(subtile_x: i64, subtile_y: i64) -> u16 {
    match (subtile_x % 2, subtile_y % 2) {
        (0, 0) => 0x20,
        (_, 0) => 0x10,
        (0, _) => 0x02,
        _ => 0x01,
    }
}
