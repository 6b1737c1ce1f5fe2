use std::path::PathBuf;

/// Errors surfaced by the format 107 codec.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither the plain file nor its `.gz` sibling exists.
    #[error("Neither {} nor its .gz sibling exists", .path.display())]
    NotFound { path: PathBuf },

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// The bytes (or the snapshot being written) cannot be represented as format 107.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("Unknown file format {found} (expected {expected})")]
    FormatTag { found: i32, expected: i32 },

    #[error("Negative {field}: {value}")]
    NegativeCount { field: &'static str, value: i32 },

    #[error("{active} active parcels exceed the total of {total}")]
    ActiveExceedsTotal { active: i32, total: i32 },

    #[error("Array {field} holds {actual} elements, header announces {expected}")]
    ArrayLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Header record count is {found}, must be {expected}")]
    HeaderRecordCount { found: i32, expected: i32 },

    #[error("Record marker {marker} does not match payload length {expected}")]
    RecordMarker { marker: u32, expected: usize },

    #[error("Record payload of {0} bytes cannot be framed")]
    RecordTooLarge(usize),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
