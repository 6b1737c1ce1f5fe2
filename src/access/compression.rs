use clap::ValueEnum;
use flate2::{read::MultiGzDecoder, write::GzEncoder, Compression};
use std::io::{self, Read, Write};
use tap::Pipe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, ValueEnum)]
#[non_exhaustive]
pub enum FileCompression {
    #[default]
    None,
    Gzip,
}

impl FileCompression {
    pub fn decoder<'a>(&self, reader: impl Read + 'a) -> Box<dyn Read + 'a> {
        match *self {
            FileCompression::None => Box::new(reader) as Box<dyn Read + 'a>,
            FileCompression::Gzip => Box::new(MultiGzDecoder::new(reader)),
        }
    }

    pub fn encoder<W: Write>(&self, writer: W) -> Encoder<W> {
        match *self {
            FileCompression::None => Encoder::Plain(writer),
            FileCompression::Gzip => Encoder::Gzip(GzEncoder::new(writer, Compression::default())),
        }
    }
}

/// Write side of [FileCompression]. Must be [finished](Encoder::finish),
/// dropping a gzip encoder loses trailer errors.
#[derive(Debug)]
pub enum Encoder<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
}

impl<W: Write> Encoder<W> {
    /// Writes the gzip trailer if any and flushes.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Encoder::Plain(writer) => writer,
            Encoder::Gzip(encoder) => encoder.finish()?,
        }
        .pipe(|mut writer| writer.flush().map(|_| writer))
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Encoder::Plain(writer) => writer.write(buf),
            Encoder::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Encoder::Plain(writer) => writer.flush(),
            Encoder::Gzip(encoder) => encoder.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::FileCompression;

    #[test]
    fn gzip_round_trip() {
        let mut encoder = FileCompression::Gzip.encoder(Vec::<u8>::new());
        encoder.write_all(b"part_000").unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(&compressed[..2], &[0x1f, 0x8b]);

        let mut plain = vec![];
        FileCompression::Gzip
            .decoder(&compressed[..])
            .read_to_end(&mut plain)
            .unwrap();
        assert_eq!(plain, b"part_000");
    }

    #[test]
    fn plain_is_passthrough() {
        let mut encoder = FileCompression::None.encoder(Vec::<u8>::new());
        encoder.write_all(b"abc").unwrap();
        assert_eq!(encoder.finish().unwrap(), b"abc");
    }
}
