use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{DataError, DataResult};

pub mod libmap;
pub mod samples;

#[cfg(test)]
mod test;

/// Sample-table artifact magic, `"PFLW"`.
pub const SAMPLE_MAGIC: u32 = 0x5046_4C57;
/// Memory-map artifact magic, `"PLMP"`.
pub const LIBMAP_MAGIC: u32 = 0x504C_4D50;
pub const FORMAT_VERSION: u16 = 1;
pub const HEADER_LEN: usize = 64;

pub const COMPRESSION_NONE: u8 = 0;
pub const COMPRESSION_GZIP: u8 = 1;

pub(crate) fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Writes header and body to a temporary file, then renames it into
/// place. The body is gzipped when `compression` says so.
pub(crate) fn write_atomic(
    path: &Path,
    header: &[u8; HEADER_LEN],
    body: &[u8],
    compression: u8,
) -> DataResult<()> {
    let tmp = tmp_path(path);
    let result = write_parts(&tmp, header, body, compression).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        DataError::FileWrite {
            path: path.to_owned(),
            source,
        }
    });
    result?;
    fs::rename(&tmp, path).map_err(|source| DataError::FileWrite {
        path: path.to_owned(),
        source,
    })
}

fn write_parts(tmp: &Path, header: &[u8; HEADER_LEN], body: &[u8], compression: u8) -> io::Result<()> {
    let mut file = File::create(tmp)?;
    file.write_all(header)?;
    match compression {
        COMPRESSION_GZIP => {
            let mut encoder = GzEncoder::new(&mut file, Compression::default());
            encoder.write_all(body)?;
            encoder.finish()?;
        }
        _ => file.write_all(body)?,
    }
    file.flush()
}

pub(crate) fn read_file(path: &Path) -> DataResult<Vec<u8>> {
    let mut file = File::open(path).map_err(|source| DataError::FileOpen {
        path: path.to_owned(),
        source,
    })?;
    let mut data = Vec::new();
    file.read_to_end(&mut data).map_err(|source| DataError::FileRead {
        path: path.to_owned(),
        source,
    })?;
    Ok(data)
}

/// Little-endian cursor over an in-memory artifact. Truncation surfaces
/// as a short read against the originating path.
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    path: &'a Path,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8], path: &'a Path) -> Self {
        Cursor { data, path }
    }

    fn short_read(&self) -> DataError {
        DataError::FileRead {
            path: self.path.to_owned(),
            source: io::ErrorKind::UnexpectedEof.into(),
        }
    }

    pub(crate) fn bytes(&mut self, len: usize) -> DataResult<&'a [u8]> {
        if self.data.len() < len {
            return Err(self.short_read());
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    pub(crate) fn u8(&mut self) -> DataResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> DataResult<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> DataResult<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn u64(&mut self) -> DataResult<u64> {
        let b = self.bytes(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub(crate) fn skip(&mut self, len: usize) -> DataResult<()> {
        self.bytes(len).map(|_| ())
    }
}
