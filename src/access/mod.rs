//! Opening snapshot files.
//!
//! Reading takes the logical name, without `.gz`, and falls back to the
//! gzipped sibling when the plain file does not exist. Writing uses the path
//! as given, whatever the compression.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use tap::Pipe;

use crate::error::{Error, Result};

mod compression;

pub use compression::{Encoder, FileCompression};

pub const GZIP_SUFFIX: &str = ".gz";

/// `part_NNN` file of a trajectory model output directory.
pub fn part_file_path(dir: impl AsRef<Path>, hour: u32) -> PathBuf {
    dir.as_ref().join(format!("part_{hour:03}"))
}

/// `path` with [GZIP_SUFFIX] appended to the file name.
pub fn gz_sibling(path: impl AsRef<Path>) -> PathBuf {
    let mut name = path.as_ref().as_os_str().to_owned();
    name.push(GZIP_SUFFIX);
    PathBuf::from(name)
}

/// Byte source of one snapshot file. The file is closed on drop.
pub struct Source {
    path: PathBuf,
    compression: FileCompression,
    reader: BufReader<Box<dyn Read>>,
}

impl core::fmt::Debug for Source {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Source")
            .field("path", &self.path)
            .field("compression", &self.compression)
            .finish_non_exhaustive()
    }
}

impl Source {
    fn new(path: PathBuf, compression: FileCompression, file: File) -> Self {
        // Single buffer, MultiGzDecoder buffers its compressed input internally
        let reader = file
            .pipe(|x| compression.decoder(x))
            .pipe(BufReader::new);

        Self {
            path,
            compression,
            reader,
        }
    }

    /// Path actually opened, `.gz` included when the fallback was taken.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn compression(&self) -> FileCompression {
        self.compression
    }
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Opens `path`, or `path.gz` if `path` does not exist.
///
/// Only absence triggers the fallback, any other failure is returned as is.
pub fn open_source(path: impl AsRef<Path>) -> Result<Source> {
    let path = path.as_ref();

    match File::open(path) {
        Ok(file) => {
            tracing::info!(path = %path.display(), "open");
            return Ok(Source::new(path.to_owned(), FileCompression::None, file));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let gz_path = gz_sibling(path);
    tracing::info!(path = %gz_path.display(), "try gzipped version");

    match File::open(&gz_path) {
        Ok(file) => Ok(Source::new(gz_path, FileCompression::Gzip, file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound {
            path: path.to_owned(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Byte sink of one snapshot file. Call [Sink::finish] to flush and close it.
#[derive(Debug)]
pub struct Sink {
    path: PathBuf,
    encoder: Encoder<BufWriter<File>>,
}

impl Sink {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn finish(self) -> Result<()> {
        self.encoder.finish()?.into_inner().map_err(|e| e.into_error())?;
        Ok(())
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

/// Creates or truncates `path`. No suffix is appended for [FileCompression::Gzip].
pub fn create_sink(path: impl AsRef<Path>, compression: FileCompression) -> Result<Sink> {
    let path = path.as_ref();
    tracing::info!(path = %path.display(), ?compression, "create");

    let encoder = File::create(path)?
        .pipe(BufWriter::new)
        .pipe(|x| compression.encoder(x));

    Ok(Sink {
        path: path.to_owned(),
        encoder,
    })
}
