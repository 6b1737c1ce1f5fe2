use std::io::{Read, Write};

use crate::access::FileCompression;
use crate::body::Parcels;
use crate::error::{FormatError, Result};
use crate::header::{Header, FORMAT_TAG, HEADER_RECORD_COUNT};
use crate::record::{RecordReader, RecordWriter};

/// All active parcels at one reference time, i.e. one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub header: Header,
    pub parcels: Parcels,
}

/// Adjustment [Snapshot::prepare_for_encoding] made to the outgoing header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    HeaderRecordCount { from: i32, to: i32 },
}

/// Header ready to be written, with the parcels it describes.
#[derive(Debug, Clone)]
pub struct NormalizedSnapshot<'a> {
    header: Header,
    parcels: &'a Parcels,
    corrections: Vec<Correction>,
}

impl<'a> NormalizedSnapshot<'a> {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn parcels(&self) -> &'a Parcels {
        self.parcels
    }

    /// Empty when the header is written exactly as the caller built it.
    pub fn corrections(&self) -> &[Correction] {
        &self.corrections
    }

    pub fn is_adjusted(&self) -> bool {
        !self.corrections.is_empty()
    }

    /// Writes the header records, then the parcel records unless there are no active parcels.
    pub fn encode<W: Write>(&self, writer: &mut RecordWriter<W>) -> Result<()> {
        self.header.write(writer)?;

        if self.header.nact == 0 {
            tracing::info!("empty trajectory set");
            return Ok(());
        }

        self.parcels.write(writer)
    }
}

/// What the writer does with a header it had to normalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderPolicy {
    /// Write the corrected header and log a warning. `nact > numpart` is
    /// written unchanged, as the reader accepts it.
    #[default]
    Normalize,
    /// Refuse to write a header that needs a correction or has `nact > numpart`.
    Strict,
}

#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Fail on record markers that disagree with the payload length.
    pub strict_markers: bool,
}

#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub compression: FileCompression,
    pub header_policy: HeaderPolicy,
}

impl WriteOptions {
    pub fn compression(mut self, compression: FileCompression) -> Self {
        self.compression = compression;
        self
    }

    pub fn header_policy(mut self, policy: HeaderPolicy) -> Self {
        self.header_policy = policy;
        self
    }
}

impl Snapshot {
    pub fn new(header: Header, parcels: Parcels) -> Self {
        Self { header, parcels }
    }

    /// Snapshot of `parcels` with `nact` taken from them and the counts
    /// that must cover it raised accordingly.
    pub fn from_parcels(mut header: Header, parcels: Parcels) -> Result<Self, FormatError> {
        let nact = parcels.len();
        parcels.check_len(nact)?;

        header.nact = i32::try_from(nact).map_err(|_| FormatError::RecordTooLarge(nact))?;
        header.numpart = header.numpart.max(header.nact);
        Ok(Self { header, parcels })
    }

    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.header.nact == 0
    }

    /// Checks every header invariant and the array lengths, except the header record count.
    pub fn validate(&self) -> Result<(), FormatError> {
        self.check_representable()?;
        self.check_active_within_total()
    }

    /// Checks everything that would prevent a lossless write, except the header record count.
    fn check_representable(&self) -> Result<(), FormatError> {
        let header = &self.header;

        if header.format_tag != FORMAT_TAG {
            return Err(FormatError::FormatTag {
                found: header.format_tag,
                expected: FORMAT_TAG,
            });
        }

        for (field, value) in [
            ("numpart", header.numpart),
            ("nact_last_o", header.nact_last_old),
            ("nact_last_nm", header.nact_last_new_massless),
            ("nact_last_nh", header.nact_last_new_heavy),
        ] {
            if value < 0 {
                return Err(FormatError::NegativeCount { field, value });
            }
        }

        let nact = header.active_len()?;
        self.parcels.check_len(nact)
    }

    fn check_active_within_total(&self) -> Result<(), FormatError> {
        if self.header.nact > self.header.numpart {
            return Err(FormatError::ActiveExceedsTotal {
                active: self.header.nact,
                total: self.header.numpart,
            });
        }
        Ok(())
    }

    /// Validates and returns the header to write. `self` is never modified;
    /// every adjustment is listed in [NormalizedSnapshot::corrections].
    ///
    /// `nact > numpart` is representable and left to [Self::prepare_with_policy].
    pub fn prepare_for_encoding(&self) -> Result<NormalizedSnapshot<'_>, FormatError> {
        self.check_representable()?;

        let mut header = self.header.clone();
        let mut corrections = vec![];

        if header.record_count != HEADER_RECORD_COUNT {
            corrections.push(Correction::HeaderRecordCount {
                from: header.record_count,
                to: HEADER_RECORD_COUNT,
            });
            header.record_count = HEADER_RECORD_COUNT;
        }

        Ok(NormalizedSnapshot {
            header,
            parcels: &self.parcels,
            corrections,
        })
    }

    /// Same as [Self::prepare_for_encoding], then applies `policy` to the corrections
    /// and to a header announcing more active parcels than parcels in total.
    pub fn prepare_with_policy(
        &self,
        policy: HeaderPolicy,
    ) -> Result<NormalizedSnapshot<'_>, FormatError> {
        let normalized = self.prepare_for_encoding()?;

        match (policy, self.check_active_within_total()) {
            (_, Ok(())) => {}
            (HeaderPolicy::Strict, Err(e)) => return Err(e),
            (HeaderPolicy::Normalize, Err(e)) => tracing::warn!("{e}, written as is"),
        }

        for correction in normalized.corrections() {
            match (policy, *correction) {
                (HeaderPolicy::Strict, Correction::HeaderRecordCount { from, to }) => {
                    return Err(FormatError::HeaderRecordCount {
                        found: from,
                        expected: to,
                    })
                }
                (HeaderPolicy::Normalize, Correction::HeaderRecordCount { from, to }) => {
                    tracing::warn!(from, to, "lhead not equal to {to}, changed");
                }
            }
        }

        Ok(normalized)
    }

    /// Decodes one snapshot from a format 107 stream.
    pub fn decode<R: Read>(reader: &mut RecordReader<R>) -> Result<Self> {
        let header = Header::read(reader)?;
        let nact = header.active_len()?;

        if nact == 0 {
            tracing::info!("empty trajectory set");
            return Ok(Self {
                header,
                parcels: Parcels::default(),
            });
        }

        let parcels = Parcels::read(reader, nact)?;
        Ok(Self { header, parcels })
    }
}

/// Reads a snapshot from any byte source.
pub fn decode_snapshot(reader: impl Read, options: &ReadOptions) -> Result<Snapshot> {
    let mut reader = RecordReader::new(reader).strict_markers(options.strict_markers);
    Snapshot::decode(&mut reader)
}

/// Writes a snapshot to any byte sink, returning the number of bytes written.
pub fn encode_snapshot(
    writer: impl Write,
    snapshot: &Snapshot,
    policy: HeaderPolicy,
) -> Result<u64> {
    let normalized = snapshot.prepare_with_policy(policy)?;

    let mut writer = RecordWriter::new(writer);
    normalized.encode(&mut writer)?;
    Ok(writer.written())
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};

    use super::{decode_snapshot, encode_snapshot, Correction, HeaderPolicy, ReadOptions, Snapshot};
    use crate::body::Parcels;
    use crate::error::{Error, FormatError};
    use crate::header::{Header, Mode};
    use crate::record::RecordWriter;

    fn sample() -> Snapshot {
        Snapshot {
            header: Header {
                mode: Mode::NewIndex,
                stamp_date: 20170801000000,
                itime: 0,
                step: 450,
                numpart: 3,
                nact: 3,
                ..Default::default()
            },
            parcels: Parcels {
                flag: vec![127, 127, 127],
                ir_start: vec![0, 100, 200],
                x: vec![10.0, 20.0, 30.0],
                y: vec![-5.0, 0.0, 5.0],
                p: vec![20000.0, 21000.0, 22000.0],
                t: vec![210.0, 211.0, 212.0],
                idx_back: vec![1, 2, 3],
            },
        }
    }

    fn encode(snapshot: &Snapshot) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_snapshot((&mut buf).writer(), snapshot, HeaderPolicy::Normalize).unwrap();
        buf
    }

    #[test]
    fn round_trip() {
        let buf = encode(&sample());
        assert_eq!(buf.len(), 3 * 8 + 12 + 16 + 24 + 7 * (8 + 12));

        let back = decode_snapshot(&buf[..], &ReadOptions::default()).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn empty_snapshot_has_no_body_records() {
        let snapshot = Snapshot {
            header: Header {
                numpart: 10,
                ..Default::default()
            },
            parcels: Parcels::default(),
        };
        let buf = encode(&snapshot);
        assert_eq!(buf.len(), 3 * 8 + 12 + 16 + 24);

        // Trailing garbage is not read
        let mut bytes = buf.to_vec();
        bytes.extend_from_slice(&[0xFF; 5]);
        let back = decode_snapshot(&bytes[..], &ReadOptions::default()).unwrap();

        assert!(back.is_empty());
        assert!(back.parcels.is_empty());
        assert_eq!(back, snapshot);
    }

    #[test]
    fn header_record_count_is_normalized_without_touching_caller() {
        let mut snapshot = sample();
        snapshot.header.record_count = 5;

        let normalized = snapshot.prepare_for_encoding().unwrap();
        assert_eq!(
            normalized.corrections(),
            &[Correction::HeaderRecordCount { from: 5, to: 3 }]
        );
        assert_eq!(normalized.header().record_count, 3);
        assert_eq!(snapshot.header.record_count, 5);

        let buf = encode(&snapshot);
        let back = decode_snapshot(&buf[..], &ReadOptions::default()).unwrap();
        assert_eq!(back.header.record_count, 3);
        assert_eq!(back.parcels, snapshot.parcels);
    }

    #[test]
    fn strict_policy_refuses_correction() {
        let mut snapshot = sample();
        snapshot.header.record_count = 5;

        let err = encode_snapshot(Vec::<u8>::new(), &snapshot, HeaderPolicy::Strict).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::HeaderRecordCount { found: 5, expected: 3 })
        ));
        assert!(!sample().prepare_for_encoding().unwrap().is_adjusted());
    }

    #[test]
    fn inconsistent_snapshots_are_not_written() {
        let mut snapshot = sample();
        snapshot.parcels.idx_back.push(4);
        assert_eq!(
            snapshot.validate(),
            Err(FormatError::ArrayLength {
                field: "idx_back",
                expected: 3,
                actual: 4
            })
        );

        let mut snapshot = sample();
        snapshot.header.numpart = 2;
        assert_eq!(
            snapshot.validate(),
            Err(FormatError::ActiveExceedsTotal { active: 3, total: 2 })
        );

        let mut snapshot = sample();
        snapshot.header.format_tag = 103;
        let mut out = Vec::<u8>::new();
        assert!(encode_snapshot(&mut out, &snapshot, HeaderPolicy::Normalize).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn active_above_total_follows_policy() {
        let mut snapshot = sample();
        snapshot.header.numpart = 2;

        let err = encode_snapshot(Vec::<u8>::new(), &snapshot, HeaderPolicy::Strict).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::ActiveExceedsTotal { active: 3, total: 2 })
        ));

        let buf = encode(&snapshot);
        let back = decode_snapshot(&buf[..], &ReadOptions::default()).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn huge_active_count_on_truncated_file() {
        let header = Header {
            numpart: i32::MAX,
            nact: i32::MAX,
            ..Default::default()
        };

        let mut buf = BytesMut::new();
        header
            .write(&mut RecordWriter::new((&mut buf).writer()))
            .unwrap();
        buf.put_slice(&[0, 0, 0, 4]);

        let err = decode_snapshot(&buf[..], &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn header_record_count_is_kept_on_read() {
        let mut buf = encode(&sample());
        buf[4..8].copy_from_slice(&5i32.to_be_bytes());

        let back = decode_snapshot(&buf[..], &ReadOptions::default()).unwrap();
        assert_eq!(back.header.record_count, 5);
        assert_eq!(back.parcels, sample().parcels);
    }

    #[test]
    fn format_tag_103_is_rejected() {
        let mut buf = encode(&sample());
        // outnfmt lives right after the first marker and lhead
        buf[8..12].copy_from_slice(&103i32.to_be_bytes());

        let err = decode_snapshot(&buf[..], &ReadOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::FormatTag { found: 103, .. })
        ));
    }

    #[test]
    fn truncated_body() {
        let buf = encode(&sample());
        let err = decode_snapshot(&buf[..buf.len() - 6], &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn from_parcels_sets_counts() {
        let snapshot = Snapshot::from_parcels(Header::default(), sample().parcels).unwrap();
        assert_eq!(snapshot.header.nact, 3);
        assert_eq!(snapshot.header.numpart, 3);
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.validate().is_ok());
    }
}
