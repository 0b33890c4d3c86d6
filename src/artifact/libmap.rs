use std::path::Path;

use super::{
    read_file, unix_timestamp, write_atomic, Cursor, COMPRESSION_NONE, FORMAT_VERSION, HEADER_LEN,
    LIBMAP_MAGIC,
};
use crate::error::{DataError, DataResult};
use crate::map::{MemoryMap, MemoryRegion};

/// A decoded memory-map artifact.
#[derive(Clone, Debug)]
pub struct LibraryMap {
    pub process_id: u32,
    pub timestamp: u64,
    pub map: MemoryMap,
}

/// Serializes the executable regions of `map` to `path`.
pub fn write_memory_map(path: &Path, map: &MemoryMap, process_id: u32) -> DataResult<()> {
    let mut body = Vec::new();
    for region in map.regions() {
        body.extend_from_slice(&region.base.to_le_bytes());
        body.extend_from_slice(&region.end.to_le_bytes());
        body.push(u8::from(region.executable));
        body.extend_from_slice(&[0u8; 7]);
        body.extend_from_slice(&(region.name.len() as u32).to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(region.name.as_bytes());
    }

    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(&LIBMAP_MAGIC.to_le_bytes());
    header[4..6].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    header[8..12].copy_from_slice(&process_id.to_le_bytes());
    header[12..16].copy_from_slice(&(map.len() as u32).to_le_bytes());
    header[16..24].copy_from_slice(&unix_timestamp().to_le_bytes());

    write_atomic(path, &header, &body, COMPRESSION_NONE)
}

/// Decodes a memory-map artifact.
pub fn read_memory_map(path: &Path) -> DataResult<LibraryMap> {
    let data = read_file(path)?;
    let mut cursor = Cursor::new(&data, path);

    let magic = cursor.u32()?;
    if magic != LIBMAP_MAGIC {
        return Err(DataError::InvalidFormat(format!(
            "bad memory-map magic {magic:#010x}"
        )));
    }
    let version = cursor.u16()?;
    if version > FORMAT_VERSION {
        return Err(DataError::VersionMismatch {
            found: version,
            supported: FORMAT_VERSION,
        });
    }
    cursor.skip(2)?;
    let process_id = cursor.u32()?;
    let library_count = cursor.u32()?;
    let timestamp = cursor.u64()?;
    cursor.skip(40)?;

    let mut regions = Vec::with_capacity(library_count.min(1 << 16) as usize);
    for _ in 0..library_count {
        let base = cursor.u64()?;
        let end = cursor.u64()?;
        let executable = cursor.u8()? != 0;
        cursor.skip(7)?;
        let name_length = cursor.u32()?;
        cursor.skip(4)?;
        if base >= end {
            return Err(DataError::Integrity(format!(
                "region {base:#x}..{end:#x} is empty or inverted"
            )));
        }
        let name = std::str::from_utf8(cursor.bytes(name_length as usize)?)
            .map_err(|_| DataError::InvalidFormat("region name is not UTF-8".to_owned()))?
            .to_owned();
        regions.push(MemoryRegion {
            name,
            base,
            end,
            executable,
        });
    }

    Ok(LibraryMap {
        process_id,
        timestamp,
        map: MemoryMap::from_regions(regions),
    })
}
