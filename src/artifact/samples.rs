use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;

use super::{
    read_file, unix_timestamp, write_atomic, Cursor, COMPRESSION_GZIP, COMPRESSION_NONE,
    FORMAT_VERSION, HEADER_LEN, SAMPLE_MAGIC,
};
use crate::error::{DataError, DataResult};
use crate::table::CounterTable;

/// One decoded sample-table entry: a stack fingerprint (oldest frame
/// first) and its observation count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleEntry {
    pub frames: Vec<u64>,
    pub count: u64,
}

/// A decoded sample-table artifact.
#[derive(Clone, Debug, Default)]
pub struct SampleTable {
    pub max_stack_depth: u32,
    pub timestamp: u64,
    pub entries: Vec<SampleEntry>,
}

impl SampleTable {
    /// Sum of all entry counts.
    pub fn total_samples(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }
}

/// Serializes `table` to `path`. Entry order is unspecified.
pub fn write_sample_table(
    path: &Path,
    table: &CounterTable,
    max_stack_depth: u32,
    compress: bool,
) -> DataResult<()> {
    let mut entry_count = 0u64;
    let mut body = Vec::new();
    table.for_each(|stack, count| {
        entry_count += 1;
        body.extend_from_slice(&(stack.depth() as u32).to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&count.to_le_bytes());
        for frame in stack.frames() {
            body.extend_from_slice(&frame.to_le_bytes());
        }
    });

    let compression = if compress {
        COMPRESSION_GZIP
    } else {
        COMPRESSION_NONE
    };
    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(&SAMPLE_MAGIC.to_le_bytes());
    header[4..6].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    header[6] = compression;
    header[8..16].copy_from_slice(&entry_count.to_le_bytes());
    header[16..20].copy_from_slice(&max_stack_depth.to_le_bytes());
    header[24..32].copy_from_slice(&unix_timestamp().to_le_bytes());

    write_atomic(path, &header, &body, compression)
}

/// Decodes a sample-table artifact, validating magic, version,
/// compression and per-entry depth bounds. No partial data is returned
/// on failure.
pub fn read_sample_table(path: &Path) -> DataResult<SampleTable> {
    let data = read_file(path)?;
    let mut cursor = Cursor::new(&data, path);

    let magic = cursor.u32()?;
    if magic != SAMPLE_MAGIC {
        return Err(DataError::InvalidFormat(format!(
            "bad sample-table magic {magic:#010x}"
        )));
    }
    let version = cursor.u16()?;
    if version > FORMAT_VERSION {
        return Err(DataError::VersionMismatch {
            found: version,
            supported: FORMAT_VERSION,
        });
    }
    let compression = cursor.u8()?;
    cursor.skip(1)?;
    let entry_count = cursor.u64()?;
    let max_stack_depth = cursor.u32()?;
    cursor.skip(4)?;
    let timestamp = cursor.u64()?;
    cursor.skip(32)?;

    let body = decode_body(cursor.bytes(data.len() - HEADER_LEN)?, compression)?;
    let mut body_cursor = Cursor::new(&body, path);

    let mut entries = Vec::with_capacity(entry_count.min(1 << 20) as usize);
    for _ in 0..entry_count {
        let depth = body_cursor.u32()?;
        body_cursor.skip(4)?;
        let count = body_cursor.u64()?;
        if depth > max_stack_depth {
            return Err(DataError::Integrity(format!(
                "entry depth {depth} exceeds table maximum {max_stack_depth}"
            )));
        }
        let mut frames = Vec::with_capacity(depth as usize);
        for _ in 0..depth {
            frames.push(body_cursor.u64()?);
        }
        entries.push(SampleEntry { frames, count });
    }

    Ok(SampleTable {
        max_stack_depth,
        timestamp,
        entries,
    })
}

fn decode_body(raw: &[u8], compression: u8) -> DataResult<Vec<u8>> {
    match compression {
        COMPRESSION_NONE => Ok(raw.to_vec()),
        COMPRESSION_GZIP => {
            let mut body = Vec::new();
            GzDecoder::new(raw)
                .read_to_end(&mut body)
                .map_err(|_| DataError::Compression {
                    tag: COMPRESSION_GZIP,
                })?;
            Ok(body)
        }
        tag => Err(DataError::Compression { tag }),
    }
}

/// Advisory human-readable dump next to the binary artifact.
pub fn write_text_sidecar(path: &Path, table: &CounterTable) -> DataResult<()> {
    let mut rows: Vec<(u64, Vec<u64>)> = Vec::new();
    table.for_each(|stack, count| rows.push((count, stack.frames().to_vec())));
    rows.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let mut text = format!(
        "# {} stacks, {} samples, {} dropped\n",
        rows.len(),
        rows.iter().map(|r| r.0).sum::<u64>(),
        table.dropped()
    );
    for (count, frames) in rows {
        text.push_str(&format!("{count:>12}  "));
        for (i, frame) in frames.iter().enumerate() {
            if i > 0 {
                text.push(' ');
            }
            text.push_str(&format!("{frame:#x}"));
        }
        text.push('\n');
    }

    std::fs::write(path, text).map_err(|source| DataError::FileWrite {
        path: path.to_owned(),
        source,
    })
}
