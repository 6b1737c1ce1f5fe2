//! The three header records of format 107.
//!
//! record 1: `lhead`, `outnfmt`, `mode` as 3 x i32
//! record 2: `stamp_date` as i64, `itime` and `step` as i32
//! record 3: six i32 counters

use core::fmt::{self, Display};
use std::io::{Read, Write};

use zerocopy::{BigEndian, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, I32, I64};

use crate::error::{FormatError, Result};
use crate::record::{RecordReader, RecordWriter};

pub const FORMAT_TAG: i32 = 107;
pub const HEADER_RECORD_COUNT: i32 = 3;

/// Meaning of `idx_back` and of the file itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    NewIndex,
    History,
    OldIndex,
    /// Producer defined, e.g. 3 for initialization files.
    Other(i32),
}

impl From<i32> for Mode {
    fn from(value: i32) -> Self {
        match value {
            0 => Mode::NewIndex,
            1 => Mode::History,
            2 => Mode::OldIndex,
            x => Mode::Other(x),
        }
    }
}

impl From<Mode> for i32 {
    fn from(value: Mode) -> Self {
        match value {
            Mode::NewIndex => 0,
            Mode::History => 1,
            Mode::OldIndex => 2,
            Mode::Other(x) => x,
        }
    }
}

/// Packed `YYYYMMDDHHMMSS` reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StampDate {
    pub year: i64,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl StampDate {
    pub fn from_packed(packed: i64) -> Self {
        let field = |div: i64| (packed / div % 100) as u8;
        Self {
            year: packed / 10_000_000_000,
            month: field(100_000_000),
            day: field(1_000_000),
            hour: field(10_000),
            minute: field(100),
            second: field(1),
        }
    }

    pub fn to_packed(&self) -> i64 {
        [
            self.month, self.day, self.hour, self.minute, self.second,
        ]
        .into_iter()
        .fold(self.year, |acc, x| acc * 100 + x as i64)
    }
}

impl Display for StampDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub record_count: i32,
    pub format_tag: i32,
    pub mode: Mode,
    /// `YYYYMMDDHHMMSS`
    pub stamp_date: i64,
    /// Output time, seconds since `stamp_date`
    pub itime: i32,
    /// Time step, seconds
    pub step: i32,
    pub numpart: i32,
    pub nact: i32,
    pub idx_orgn: i32,
    pub nact_last_old: i32,
    pub nact_last_new_massless: i32,
    pub nact_last_new_heavy: i32,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            record_count: HEADER_RECORD_COUNT,
            format_tag: FORMAT_TAG,
            mode: Mode::NewIndex,
            stamp_date: 0,
            itime: 0,
            step: 0,
            numpart: 0,
            nact: 0,
            idx_orgn: 0,
            nact_last_old: 0,
            nact_last_new_massless: 0,
            nact_last_new_heavy: 0,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct FormatRecord {
    lhead: I32<BigEndian>,
    outnfmt: I32<BigEndian>,
    mode: I32<BigEndian>,
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct TimeRecord {
    stamp_date: I64<BigEndian>,
    itime: I32<BigEndian>,
    step: I32<BigEndian>,
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct CountRecord {
    numpart: I32<BigEndian>,
    nact: I32<BigEndian>,
    idx_orgn: I32<BigEndian>,
    nact_last_o: I32<BigEndian>,
    nact_last_nm: I32<BigEndian>,
    nact_last_nh: I32<BigEndian>,
}

impl Header {
    pub fn stamp(&self) -> StampDate {
        StampDate::from_packed(self.stamp_date)
    }

    /// Number of elements in every parcel array.
    pub fn active_len(&self) -> Result<usize, FormatError> {
        usize::try_from(self.nact).map_err(|_| FormatError::NegativeCount {
            field: "nact",
            value: self.nact,
        })
    }

    /// Reads the three header records. Nothing past them is consumed.
    pub fn read<R: Read>(reader: &mut RecordReader<R>) -> Result<Self> {
        let format: FormatRecord = reader.read_record()?;

        if format.outnfmt.get() != FORMAT_TAG {
            tracing::debug!(
                lhead = format.lhead.get(),
                outnfmt = format.outnfmt.get(),
                mode = format.mode.get(),
                "unknown format record"
            );
            return Err(FormatError::FormatTag {
                found: format.outnfmt.get(),
                expected: FORMAT_TAG,
            }
            .into());
        }

        let time: TimeRecord = reader.read_record()?;
        tracing::debug!(
            stamp_date = time.stamp_date.get(),
            itime = time.itime.get(),
            step = time.step.get()
        );

        let counts: CountRecord = reader.read_record()?;
        tracing::debug!(
            numpart = counts.numpart.get(),
            nact = counts.nact.get(),
            idx_orgn = counts.idx_orgn.get(),
            nact_last_o = counts.nact_last_o.get(),
            nact_last_nm = counts.nact_last_nm.get(),
            nact_last_nh = counts.nact_last_nh.get()
        );

        let header = Self {
            record_count: format.lhead.get(),
            format_tag: format.outnfmt.get(),
            mode: format.mode.get().into(),
            stamp_date: time.stamp_date.get(),
            itime: time.itime.get(),
            step: time.step.get(),
            numpart: counts.numpart.get(),
            nact: counts.nact.get(),
            idx_orgn: counts.idx_orgn.get(),
            nact_last_old: counts.nact_last_o.get(),
            nact_last_new_massless: counts.nact_last_nm.get(),
            nact_last_new_heavy: counts.nact_last_nh.get(),
        };

        if header.record_count != HEADER_RECORD_COUNT {
            tracing::debug!(
                lhead = header.record_count,
                "header record count is not {HEADER_RECORD_COUNT}, kept as read"
            );
        }

        header.active_len()?;
        if header.nact > header.numpart {
            tracing::warn!(
                nact = header.nact,
                numpart = header.numpart,
                "more active parcels than parcels in total"
            );
        }

        Ok(header)
    }

    /// Writes the three header records exactly as given.
    pub fn write<W: Write>(&self, writer: &mut RecordWriter<W>) -> Result<()> {
        writer.write_struct(&FormatRecord {
            lhead: self.record_count.into(),
            outnfmt: self.format_tag.into(),
            mode: i32::from(self.mode).into(),
        })?;

        writer.write_struct(&TimeRecord {
            stamp_date: self.stamp_date.into(),
            itime: self.itime.into(),
            step: self.step.into(),
        })?;

        writer.write_struct(&CountRecord {
            numpart: self.numpart.into(),
            nact: self.nact.into(),
            idx_orgn: self.idx_orgn.into(),
            nact_last_o: self.nact_last_old.into(),
            nact_last_nm: self.nact_last_new_massless.into(),
            nact_last_nh: self.nact_last_new_heavy.into(),
        })
    }
}
