use std::io;
use thiserror::Error;

/// A decode failure inside a single buffer window (header bytes, an index
/// page or one tile block). Header-time occurrences are fatal to `open`;
/// block-time occurrences abort only the affected block.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("read of {wanted} bytes overruns buffer end ({remaining} bytes remaining)")]
    BufferOverrun { wanted: usize, remaining: usize },

    #[error("buffer window of {0} bytes exceeds the maximum of {1} bytes")]
    OversizedBuffer(usize, usize),

    #[error("variable-length integer exceeds {0} bytes")]
    VarintTooLong(usize),

    #[error("invalid UTF-8 in string field")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("invalid tag id {id}, dictionary has {len} entries")]
    TagIdOutOfRange { id: usize, len: usize },

    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: i64 },

    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}

/// A structural problem with the file header. Always fatal to `open`;
/// the reader never guesses its way past a malformed header.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("reading the header failed")]
    Io(#[from] io::Error),

    #[error("invalid magic byte: {0:?}")]
    InvalidMagic(String),

    #[error("unsupported file version: {0}")]
    UnsupportedVersion(i32),

    #[error("unsupported projection: {0}")]
    UnsupportedProjection(String),

    #[error("invalid {field}: {value}")]
    InvalidField { field: &'static str, value: i64 },

    #[error("invalid bounding box: [{0}, {1}, {2}, {3}]")]
    InvalidBoundingBox(f64, f64, f64, f64),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// A failure of one `read_map_data` call. `UnsupportedZoom` is an
/// expected condition (the file simply does not serve that zoom), not a
/// corruption report.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("no sub-file serves zoom level {0}")]
    UnsupportedZoom(u8),

    #[error("map file is closed")]
    Closed,

    #[error("invalid tile range: corner tiles must share a zoom level, upper-left above and left of lower-right")]
    InvalidTileRange,

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
