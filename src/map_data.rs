use crate::types::{LatLong, Tag};

/// A point of interest decoded from a tile block.
#[derive(Debug, Clone, PartialEq)]
pub struct PointOfInterest {
    /// Drawing layer, stored with a +5 bias so it is never negative.
    pub layer: i8,
    pub tags: Vec<Tag>,
    pub position: LatLong,
}

/// A way decoded from a tile block. The first coordinate block is the
/// outer ring; any further blocks are inner rings (holes) or additional
/// parts of a multi-polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    pub layer: i8,
    pub tags: Vec<Tag>,
    pub way_nodes: Vec<Vec<LatLong>>,
    /// Preferred label anchor in absolute degrees.
    pub label_position: Option<LatLong>,
}

/// Which record kinds a query should decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// Every POI and way in range.
    All,
    /// POIs only; way records are skipped without decoding their geometry.
    Pois,
    /// Only records carrying a name, house number or ref tag.
    Named,
}

/// The merged result of one read call over a tile or tile range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapReadResult {
    pub pois: Vec<PointOfInterest>,
    pub ways: Vec<Way>,
    /// True if every block touched by the query was flagged as pure water
    /// in the block index.
    pub is_water: bool,
}

impl MapReadResult {
    pub fn is_empty(&self) -> bool {
        self.pois.is_empty() && self.ways.is_empty()
    }
}
