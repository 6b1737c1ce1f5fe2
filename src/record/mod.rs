//! Fortran unformatted sequential records.
//!
//! Layout of one record:
//! `U32<BigEndian>` byte length, payload, the same `U32<BigEndian>` again.
//!
//! The reader is told how many bytes the payload holds and reads exactly that,
//! markers are only cross-checked.

use std::io::{self, Read, Write};

use bytes::{BufMut, BytesMut};
use tap::Pipe;
use zerocopy::{BigEndian, FromBytes, FromZeros, Immutable, IntoBytes, Unaligned, U32};

use crate::error::{FormatError, Result};

pub const MARKER_SIZE: usize = core::mem::size_of::<U32<BigEndian>>();

/// Upfront capacity of an array payload, the rest is allocated as bytes arrive.
const PREALLOC_LIMIT: usize = 1 << 20;

#[derive(Debug)]
pub struct RecordReader<R> {
    reader: R,
    strict_markers: bool,
    consumed: u64,
}

impl<R: Read> RecordReader<R> {
    /// Recommended to use BufReader
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            strict_markers: false,
            consumed: 0,
        }
    }

    /// Marker mismatches become [FormatError::RecordMarker] instead of a warning.
    pub fn strict_markers(mut self, strict: bool) -> Self {
        self.strict_markers = strict;
        self
    }

    /// Bytes consumed so far, framing included.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Reads one record whose payload fills `payload` exactly.
    pub fn read_into(&mut self, payload: &mut [u8]) -> Result<()> {
        self.read_marker(payload.len(), "leading")?;
        self.reader.read_exact(payload)?;
        self.read_marker(payload.len(), "trailing")?;

        self.consumed += (2 * MARKER_SIZE + payload.len()) as u64;
        Ok(())
    }

    /// Reads one fixed-shape record.
    pub fn read_record<T>(&mut self) -> Result<T>
    where
        T: FromBytes + IntoBytes,
    {
        let mut record = T::new_zeroed();
        self.read_into(record.as_mut_bytes())?;
        Ok(record)
    }

    /// Reads one record of `count` elements of `T`.
    ///
    /// The buffer grows with the bytes actually read, so a corrupt `count`
    /// ends in `UnexpectedEof` rather than a huge allocation.
    pub fn read_array<T>(&mut self, count: usize) -> Result<Vec<T>>
    where
        T: FromBytes + Immutable + Unaligned + Clone,
    {
        let expected = count
            .checked_mul(core::mem::size_of::<T>())
            .ok_or(FormatError::RecordTooLarge(usize::MAX))?;

        self.read_marker(expected, "leading")?;

        let mut payload = Vec::with_capacity(expected.min(PREALLOC_LIMIT));
        let read = self
            .reader
            .by_ref()
            .take(expected as u64)
            .read_to_end(&mut payload)?;
        if read != expected {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }

        self.read_marker(expected, "trailing")?;
        self.consumed += (2 * MARKER_SIZE + expected) as u64;

        <[T]>::ref_from_bytes(payload.as_slice())
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidData))?
            .to_vec()
            .pipe(Ok)
    }

    fn read_marker(&mut self, expected: usize, which: &'static str) -> Result<()> {
        let mut marker = U32::<BigEndian>::new_zeroed();
        self.reader.read_exact(marker.as_mut_bytes())?;
        self.check_marker(marker, expected, which)?;
        Ok(())
    }

    fn check_marker(
        &self,
        marker: U32<BigEndian>,
        expected: usize,
        which: &'static str,
    ) -> Result<(), FormatError> {
        let marker = marker.get();
        if marker as usize == expected {
            return Ok(());
        }

        if self.strict_markers {
            return Err(FormatError::RecordMarker { marker, expected });
        }

        tracing::warn!(
            marker,
            expected,
            offset = self.consumed,
            "{which} record marker does not match payload length"
        );
        Ok(())
    }
}

#[derive(Debug)]
pub struct RecordWriter<W> {
    writer: W,
    frame: BytesMut,
    written: u64,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            frame: BytesMut::new(),
            written: 0,
        }
    }

    /// Bytes written so far, framing included.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn write_record(&mut self, payload: &[u8]) -> Result<()> {
        let length: u32 = i32::try_from(payload.len())
            .map_err(|_| FormatError::RecordTooLarge(payload.len()))?
            as u32;

        self.frame.clear();
        self.frame.reserve(payload.len() + 2 * MARKER_SIZE);
        self.frame.put_u32(length);
        self.frame.put_slice(payload);
        self.frame.put_u32(length);

        self.writer.write_all(&self.frame)?;
        self.written += self.frame.len() as u64;
        Ok(())
    }

    /// Writes one record holding `values` back to back.
    pub fn write_array<T>(&mut self, values: &[T]) -> Result<()>
    where
        T: IntoBytes + Immutable,
    {
        self.write_record(values.as_bytes())
    }

    pub fn write_struct<T>(&mut self, record: &T) -> Result<()>
    where
        T: IntoBytes + Immutable,
    {
        self.write_record(record.as_bytes())
    }
}
