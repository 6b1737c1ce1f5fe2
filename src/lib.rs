//! Reader and writer for format 107 trajectory snapshots.
//!
//! Format 107 is a big-endian Fortran unformatted sequential file: three
//! header records followed, when there are active parcels, by seven parcel
//! records. See [header] and [body] for the record contents.
//!
//! Files are named without `.gz`; reading falls back to the gzipped sibling.
//!
//! The library logs through `tracing` and stays silent unless a subscriber
//! is installed.

use std::path::Path;

pub mod access;
pub mod body;
pub mod error;
pub mod flag;
pub mod header;
pub mod record;
pub mod snapshot;

pub use access::FileCompression;
pub use body::{Parcel, Parcels};
pub use error::{Error, FormatError, Result};
pub use flag::FlagFields;
pub use header::{Header, Mode, StampDate, FORMAT_TAG};
pub use snapshot::{
    decode_snapshot, encode_snapshot, Correction, HeaderPolicy, NormalizedSnapshot, ReadOptions,
    Snapshot, WriteOptions,
};

/// Reads the snapshot stored under the logical name `path`.
pub fn read_snapshot(path: impl AsRef<Path>, options: &ReadOptions) -> Result<Snapshot> {
    let source = access::open_source(path)?;
    let _span = tracing::debug_span!("read", path = %source.path().display()).entered();

    decode_snapshot(source, options)
}

/// Reads `part_NNN` for `hour` in a trajectory model output directory.
pub fn read_part(dir: impl AsRef<Path>, hour: u32, options: &ReadOptions) -> Result<Snapshot> {
    read_snapshot(access::part_file_path(dir, hour), options)
}

/// Writes `snapshot` to exactly `path`, returning the uncompressed size.
///
/// A partially written file is removed when encoding fails.
pub fn write_snapshot(
    path: impl AsRef<Path>,
    snapshot: &Snapshot,
    options: &WriteOptions,
) -> Result<u64> {
    let path = path.as_ref();
    let normalized = snapshot.prepare_with_policy(options.header_policy)?;

    let mut sink = access::create_sink(path, options.compression)?;
    let _span = tracing::debug_span!("write", path = %path.display()).entered();

    let encoded = {
        let mut writer = record::RecordWriter::new(&mut sink);
        normalized.encode(&mut writer).map(|_| writer.written())
    };
    let written = encoded.and_then(|written| sink.finish().map(|_| written));

    if written.is_err() {
        std::fs::remove_file(path)
            .inspect_err(|e| tracing::error!(path = %path.display(), "{e}"))
            .ok();
    }

    written
}
