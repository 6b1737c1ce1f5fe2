//! The seven per-parcel records that follow the header.
//!
//! Each record holds `nact` elements, in this order:
//! `flag` i32, `ir_start` i32, `x` f32, `y` f32, `p` f32, `t` f32, `idx_back` i32.

use std::io::{Read, Write};

use zerocopy::{BigEndian, F32, I32};

use crate::error::{FormatError, Result};
use crate::record::{RecordReader, RecordWriter};

/// Parcel arrays, one element per active parcel.
#[derive(Debug, Clone, Default)]
pub struct Parcels {
    /// Opaque bitfield, see [crate::flag::FlagFields]
    pub flag: Vec<i32>,
    /// Launch time, seconds from the reference date
    pub ir_start: Vec<i32>,
    /// Longitude, degrees
    pub x: Vec<f32>,
    /// Latitude, degrees
    pub y: Vec<f32>,
    /// Pressure, Pa
    pub p: Vec<f32>,
    /// Temperature, K
    pub t: Vec<f32>,
    pub idx_back: Vec<i32>,
}

/// One row of [Parcels].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parcel {
    pub flag: i32,
    pub ir_start: i32,
    pub x: f32,
    pub y: f32,
    pub p: f32,
    pub t: f32,
    pub idx_back: i32,
}

/// Bit-exact comparison, so NaN payloads and signed zeros count.
impl PartialEq for Parcels {
    fn eq(&self, other: &Self) -> bool {
        let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();

        self.flag == other.flag
            && self.ir_start == other.ir_start
            && bits(&self.x) == bits(&other.x)
            && bits(&self.y) == bits(&other.y)
            && bits(&self.p) == bits(&other.p)
            && bits(&self.t) == bits(&other.t)
            && self.idx_back == other.idx_back
    }
}

impl Parcels {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            flag: Vec::with_capacity(capacity),
            ir_start: Vec::with_capacity(capacity),
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            p: Vec::with_capacity(capacity),
            t: Vec::with_capacity(capacity),
            idx_back: Vec::with_capacity(capacity),
        }
    }

    /// Lengths of the seven arrays in file order.
    pub fn lengths(&self) -> [(&'static str, usize); 7] {
        [
            ("flag", self.flag.len()),
            ("ir_start", self.ir_start.len()),
            ("x", self.x.len()),
            ("y", self.y.len()),
            ("p", self.p.len()),
            ("t", self.t.len()),
            ("idx_back", self.idx_back.len()),
        ]
    }

    /// Checks that every array holds exactly `expected` elements.
    pub fn check_len(&self, expected: usize) -> Result<(), FormatError> {
        match self.lengths().into_iter().find(|(_, len)| *len != expected) {
            Some((field, actual)) => Err(FormatError::ArrayLength {
                field,
                expected,
                actual,
            }),
            None => Ok(()),
        }
    }

    /// Length of `flag`; the other arrays only match it after [Self::check_len].
    pub fn len(&self) -> usize {
        self.flag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths().iter().all(|(_, len)| *len == 0)
    }

    pub fn push(&mut self, parcel: Parcel) {
        self.flag.push(parcel.flag);
        self.ir_start.push(parcel.ir_start);
        self.x.push(parcel.x);
        self.y.push(parcel.y);
        self.p.push(parcel.p);
        self.t.push(parcel.t);
        self.idx_back.push(parcel.idx_back);
    }

    pub fn get(&self, index: usize) -> Option<Parcel> {
        Some(Parcel {
            flag: *self.flag.get(index)?,
            ir_start: *self.ir_start.get(index)?,
            x: *self.x.get(index)?,
            y: *self.y.get(index)?,
            p: *self.p.get(index)?,
            t: *self.t.get(index)?,
            idx_back: *self.idx_back.get(index)?,
        })
    }

    /// Rows up to the shortest array.
    pub fn iter(&self) -> impl Iterator<Item = Parcel> + '_ {
        (0..).map_while(|i| self.get(i))
    }

    /// Reads `count` elements of each array.
    pub fn read<R: Read>(reader: &mut RecordReader<R>, count: usize) -> Result<Self> {
        let parcels = Self {
            flag: read_i32(reader, count)?,
            ir_start: read_i32(reader, count)?,
            x: read_f32(reader, count)?,
            y: read_f32(reader, count)?,
            p: read_f32(reader, count)?,
            t: read_f32(reader, count)?,
            idx_back: read_i32(reader, count)?,
        };

        if tracing::enabled!(tracing::Level::DEBUG) {
            parcels.summary().log();
        }

        Ok(parcels)
    }

    /// Writes the seven records. Lengths must have been checked by the caller.
    pub fn write<W: Write>(&self, writer: &mut RecordWriter<W>) -> Result<()> {
        write_i32(writer, &self.flag)?;
        write_i32(writer, &self.ir_start)?;
        write_f32(writer, &self.x)?;
        write_f32(writer, &self.y)?;
        write_f32(writer, &self.p)?;
        write_f32(writer, &self.t)?;
        write_i32(writer, &self.idx_back)
    }

    pub fn summary(&self) -> ArraySummary {
        ArraySummary {
            flag: (self.flag.first().copied(), self.flag.last().copied()),
            ir_start_days: Range::of(self.ir_start.iter().map(|&x| x as f64 / 86400.)),
            x: Range::of(self.x.iter().map(|&x| x as f64)),
            y: Range::of(self.y.iter().map(|&x| x as f64)),
            p: Range::of(self.p.iter().map(|&x| x as f64)),
            t: Range::of(self.t.iter().map(|&x| x as f64)),
            idx_back: (self.idx_back.first().copied(), self.idx_back.last().copied()),
        }
    }
}

impl FromIterator<Parcel> for Parcels {
    fn from_iter<T: IntoIterator<Item = Parcel>>(iter: T) -> Self {
        let mut parcels = Parcels::default();
        iter.into_iter().for_each(|x| parcels.push(x));
        parcels
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    fn of(values: impl Iterator<Item = f64>) -> Option<Self> {
        values.fold(None, |acc, v| match acc {
            None => Some(Range { min: v, max: v }),
            Some(Range { min, max }) => Some(Range {
                min: min.min(v),
                max: max.max(v),
            }),
        })
    }
}

/// Diagnostic overview of a parcel set: first/last of the integer arrays, ranges of the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySummary {
    pub flag: (Option<i32>, Option<i32>),
    pub ir_start_days: Option<Range>,
    pub x: Option<Range>,
    pub y: Option<Range>,
    pub p: Option<Range>,
    pub t: Option<Range>,
    pub idx_back: (Option<i32>, Option<i32>),
}

impl ArraySummary {
    fn log(&self) {
        tracing::debug!(first = ?self.flag.0, last = ?self.flag.1, "flag");
        tracing::debug!(range = ?self.ir_start_days, "ir_start (days)");
        tracing::debug!(range = ?self.x, "x");
        tracing::debug!(range = ?self.y, "y");
        tracing::debug!(range = ?self.p, "p");
        tracing::debug!(range = ?self.t, "t");
        tracing::debug!(first = ?self.idx_back.0, last = ?self.idx_back.1, "idx_back");
    }
}

fn read_i32<R: Read>(reader: &mut RecordReader<R>, count: usize) -> Result<Vec<i32>> {
    let raw: Vec<I32<BigEndian>> = reader.read_array(count)?;
    Ok(raw.into_iter().map(|x| x.get()).collect())
}

fn read_f32<R: Read>(reader: &mut RecordReader<R>, count: usize) -> Result<Vec<f32>> {
    let raw: Vec<F32<BigEndian>> = reader.read_array(count)?;
    Ok(raw.into_iter().map(|x| x.get()).collect())
}

fn write_i32<W: Write>(writer: &mut RecordWriter<W>, values: &[i32]) -> Result<()> {
    let raw: Vec<I32<BigEndian>> = values.iter().map(|&x| I32::new(x)).collect();
    writer.write_array(&raw)
}

fn write_f32<W: Write>(writer: &mut RecordWriter<W>, values: &[f32]) -> Result<()> {
    let raw: Vec<F32<BigEndian>> = values.iter().map(|&x| F32::new(x)).collect();
    writer.write_array(&raw)
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};

    use super::{Parcel, Parcels, Range};
    use crate::error::FormatError;
    use crate::record::{RecordReader, RecordWriter};

    fn sample() -> Parcels {
        Parcels {
            flag: vec![127, 127, 127],
            ir_start: vec![0, 100, 200],
            x: vec![10.0, 20.0, 30.0],
            y: vec![-5.0, 0.0, 5.0],
            p: vec![20000.0, 21000.0, 22000.0],
            t: vec![210.0, 211.0, 212.0],
            idx_back: vec![1, 2, 3],
        }
    }

    #[test]
    fn records_in_file_order() {
        let mut buf = BytesMut::new();
        sample()
            .write(&mut RecordWriter::new((&mut buf).writer()))
            .unwrap();

        assert_eq!(buf.len(), 7 * (3 * 4 + 8));
        // flag record
        assert_eq!(&buf[0..8], &[0, 0, 0, 12, 0, 0, 0, 127]);
        // x record starts after flag and ir_start
        assert_eq!(&buf[40..48], &[0, 0, 0, 12, 0x41, 0x20, 0, 0]);

        let mut reader = RecordReader::new(&buf[..]);
        assert_eq!(Parcels::read(&mut reader, 3).unwrap(), sample());
        assert_eq!(reader.consumed(), buf.len() as u64);
    }

    #[test]
    fn float_bits_survive() {
        let mut parcels = sample();
        parcels.x[0] = f32::from_bits(0x7FC0_1234);
        parcels.y[1] = -0.0;

        let mut buf = BytesMut::new();
        parcels
            .write(&mut RecordWriter::new((&mut buf).writer()))
            .unwrap();
        let back = Parcels::read(&mut RecordReader::new(&buf[..]), 3).unwrap();

        assert_eq!(back.x[0].to_bits(), 0x7FC0_1234);
        assert_eq!(back.y[1].to_bits(), (-0.0f32).to_bits());
        assert_eq!(back, parcels);
        assert_ne!(back, sample());
    }

    #[test]
    fn length_check_names_the_array() {
        let mut parcels = sample();
        assert_eq!(parcels.check_len(3), Ok(()));

        parcels.p.pop();
        assert_eq!(
            parcels.check_len(3),
            Err(FormatError::ArrayLength {
                field: "p",
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn rows() {
        let parcels = sample();
        let rows: Vec<Parcel> = parcels.iter().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[1],
            Parcel {
                flag: 127,
                ir_start: 100,
                x: 20.0,
                y: 0.0,
                p: 21000.0,
                t: 211.0,
                idx_back: 2
            }
        );
        assert_eq!(rows.into_iter().collect::<Parcels>(), parcels);
        assert!(Parcels::default().is_empty());
        assert_eq!(parcels.get(3), None);
    }

    #[test]
    fn summary_ranges() {
        let summary = sample().summary();
        assert_eq!(summary.flag, (Some(127), Some(127)));
        assert_eq!(summary.y, Some(Range { min: -5.0, max: 5.0 }));
        assert_eq!(summary.t, Some(Range { min: 210.0, max: 212.0 }));
        assert_eq!(Parcels::default().summary().x, None);
    }
}
