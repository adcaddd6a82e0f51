use crate::error::FormatError;

pub const LATITUDE_MAX: f64 = 90.0;
pub const LATITUDE_MIN: f64 = -90.0;
pub const LONGITUDE_MAX: f64 = 180.0;
pub const LONGITUDE_MIN: f64 = -180.0;

const CONVERSION_FACTOR: f64 = 1_000_000.0;
const EQUATORIAL_RADIUS: f64 = 6_378_137.0;

/// Converts a microdegree value from the file into degrees.
pub fn microdegrees_to_degrees(microdegrees: i32) -> f64 {
    f64::from(microdegrees) / CONVERSION_FACTOR
}

pub fn degrees_to_microdegrees(degrees: f64) -> i32 {
    (degrees * CONVERSION_FACTOR).round() as i32
}

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLong {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLong {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A geographic rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub min_longitude: f64,
    pub max_latitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    pub fn new(
        min_latitude: f64,
        min_longitude: f64,
        max_latitude: f64,
        max_longitude: f64,
    ) -> Result<Self, FormatError> {
        if min_latitude > max_latitude || min_longitude > max_longitude {
            return Err(FormatError::InvalidBoundingBox(
                min_latitude,
                min_longitude,
                max_latitude,
                max_longitude,
            ));
        }
        Ok(Self {
            min_latitude,
            min_longitude,
            max_latitude,
            max_longitude,
        })
    }

    /// Smallest box containing all `positions`. `None` for an empty slice.
    pub fn from_positions(positions: &[LatLong]) -> Option<BoundingBox> {
        let first = positions.first()?;
        let mut bbox = BoundingBox {
            min_latitude: first.latitude,
            min_longitude: first.longitude,
            max_latitude: first.latitude,
            max_longitude: first.longitude,
        };
        for position in &positions[1..] {
            bbox.min_latitude = bbox.min_latitude.min(position.latitude);
            bbox.min_longitude = bbox.min_longitude.min(position.longitude);
            bbox.max_latitude = bbox.max_latitude.max(position.latitude);
            bbox.max_longitude = bbox.max_longitude.max(position.longitude);
        }
        Some(bbox)
    }

    pub fn center(&self) -> LatLong {
        LatLong::new(
            (self.min_latitude + self.max_latitude) / 2.0,
            (self.min_longitude + self.max_longitude) / 2.0,
        )
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.min_latitude
            && latitude <= self.max_latitude
            && longitude >= self.min_longitude
            && longitude <= self.max_longitude
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(other.min_latitude > self.max_latitude
            || other.max_latitude < self.min_latitude
            || other.min_longitude > self.max_longitude
            || other.max_longitude < self.min_longitude)
    }

    /// Returns this box grown by `meters` on every side, converted to
    /// degrees on the sphere. The longitude expansion uses the latitude
    /// farthest from the equator, so the margin is never too small.
    pub fn extend_meters(&self, meters: f64) -> BoundingBox {
        let vertical = latitude_distance(meters);
        let widest_latitude = self.min_latitude.abs().max(self.max_latitude.abs());
        let horizontal = longitude_distance(meters, widest_latitude);

        BoundingBox {
            min_latitude: (self.min_latitude - vertical).max(LATITUDE_MIN),
            min_longitude: (self.min_longitude - horizontal).max(LONGITUDE_MIN),
            max_latitude: (self.max_latitude + vertical).min(LATITUDE_MAX),
            max_longitude: (self.max_longitude + horizontal).min(LONGITUDE_MAX),
        }
    }
}

/// Angular distance covered by `meters` along a meridian.
fn latitude_distance(meters: f64) -> f64 {
    (meters * 360.0) / (2.0 * std::f64::consts::PI * EQUATORIAL_RADIUS)
}

/// Angular distance covered by `meters` along the parallel at `latitude`.
fn longitude_distance(meters: f64, latitude: f64) -> f64 {
    (meters * 360.0)
        / (2.0 * std::f64::consts::PI * EQUATORIAL_RADIUS * latitude.to_radians().cos())
}

/// A key/value pair from the shared tag dictionary or synthesized from an
/// optional record feature. Values are kept as normalized strings;
/// [`Tag::value_as_f64`] is the typed accessor for numeric values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parses a dictionary entry of the form `key=value`. An entry without
    /// a separator becomes a key with an empty value.
    pub fn from_entry(entry: &str) -> Self {
        match entry.split_once('=') {
            Some((key, value)) => Tag::new(key, value),
            None => Tag::new(entry, ""),
        }
    }

    /// Interprets the value as a number, for elevation and similar tags.
    pub fn value_as_f64(&self) -> Option<f64> {
        self.value.parse().ok()
    }
}
