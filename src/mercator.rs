use std::f64::consts::PI;

/// Web-Mercator latitude limit; tile rows only exist inside it.
pub const MERCATOR_LATITUDE_MAX: f64 = 85.05112877980659;
pub const MERCATOR_LATITUDE_MIN: f64 = -MERCATOR_LATITUDE_MAX;

/// Tile/degree conversions for the spherical Mercator projection used by
/// the file format. Tile numbering follows the usual slippy-map scheme:
/// x grows eastward, y grows southward, `2^zoom` tiles per axis.
pub struct MercatorProjection;

impl MercatorProjection {
    /// Longitude of the left edge of tile column `tile_x`.
    pub fn tile_x_to_longitude(tile_x: i64, zoom_level: u8) -> f64 {
        let n = 1i64 << zoom_level;
        (tile_x as f64 * 360.0 / n as f64) - 180.0
    }

    /// Latitude of the top edge of tile row `tile_y`.
    pub fn tile_y_to_latitude(tile_y: i64, zoom_level: u8) -> f64 {
        let n = 1i64 << zoom_level;
        let y = 0.5 - (tile_y as f64 / n as f64);
        90.0 - 360.0 * ((-y * (2.0 * PI)).exp().atan()) / PI
    }

    pub fn longitude_to_tile_x(longitude: f64, zoom_level: u8) -> i64 {
        let n = 1i64 << zoom_level;
        let tile_x = ((longitude + 180.0) / 360.0 * n as f64).floor() as i64;
        tile_x.clamp(0, n - 1)
    }

    pub fn latitude_to_tile_y(latitude: f64, zoom_level: u8) -> i64 {
        let latitude = latitude.clamp(MERCATOR_LATITUDE_MIN, MERCATOR_LATITUDE_MAX);
        let n = 1i64 << zoom_level;
        let y = 0.5 - (latitude.to_radians().sin().atanh() / (2.0 * PI));
        let tile_y = (y * n as f64).floor() as i64;
        tile_y.clamp(0, n - 1)
    }

    pub fn tile_count(zoom_level: u8) -> i64 {
        1i64 << zoom_level
    }
}
