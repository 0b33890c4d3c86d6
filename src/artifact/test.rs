use std::fs;

use tempfile::TempDir;

use super::libmap::{read_memory_map, write_memory_map};
use super::samples::{read_sample_table, write_sample_table, write_text_sidecar};
use crate::error::DataError;
use crate::map::{MemoryMap, MemoryRegion};
use crate::stack::CallStack;
use crate::table::CounterTable;

fn sample_table() -> CounterTable {
    let table = CounterTable::new(256);
    let mut stack = CallStack::new();
    stack.set(&[0x400000, 0x400100, 0x400200]);
    table.add(&stack, 1000);
    stack.set(&[0x400000, 0x400300]);
    table.add(&stack, 7);
    table
}

fn region(name: &str, base: u64, end: u64) -> MemoryRegion {
    MemoryRegion {
        name: name.to_owned(),
        base,
        end,
        executable: true,
    }
}

#[test]
fn sample_table_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run_rank_0.bin");
    write_sample_table(&path, &sample_table(), 128, false).unwrap();

    let decoded = read_sample_table(&path).unwrap();
    assert_eq!(decoded.max_stack_depth, 128);
    assert_eq!(decoded.entries.len(), 2);
    assert_eq!(decoded.total_samples(), 1007);
    assert!(decoded.timestamp > 0);

    let mut entries = decoded.entries.clone();
    entries.sort_by_key(|e| e.count);
    assert_eq!(entries[0].frames, vec![0x400000, 0x400300]);
    assert_eq!(entries[0].count, 7);
    assert_eq!(entries[1].frames, vec![0x400000, 0x400100, 0x400200]);
    assert_eq!(entries[1].count, 1000);
}

#[test]
fn compressed_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run_rank_0.bin");
    write_sample_table(&path, &sample_table(), 128, true).unwrap();
    let decoded = read_sample_table(&path).unwrap();
    assert_eq!(decoded.total_samples(), 1007);
}

#[test]
fn empty_table_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.bin");
    write_sample_table(&path, &CounterTable::new(4), 128, false).unwrap();
    let decoded = read_sample_table(&path).unwrap();
    assert!(decoded.entries.is_empty());
    assert_eq!(decoded.total_samples(), 0);
}

#[test]
fn magic_flip_is_invalid_format() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.bin");
    write_sample_table(&path, &sample_table(), 128, false).unwrap();

    let mut data = fs::read(&path).unwrap();
    data[0] ^= 0xff;
    fs::write(&path, &data).unwrap();

    assert!(matches!(
        read_sample_table(&path),
        Err(DataError::InvalidFormat(_))
    ));
}

#[test]
fn newer_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.bin");
    write_sample_table(&path, &sample_table(), 128, false).unwrap();

    let mut data = fs::read(&path).unwrap();
    data[4] = 2;
    fs::write(&path, &data).unwrap();

    assert!(matches!(
        read_sample_table(&path),
        Err(DataError::VersionMismatch {
            found: 2,
            supported: 1
        })
    ));
}

#[test]
fn unknown_compression_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.bin");
    write_sample_table(&path, &sample_table(), 128, false).unwrap();

    let mut data = fs::read(&path).unwrap();
    data[6] = 7;
    fs::write(&path, &data).unwrap();

    assert!(matches!(
        read_sample_table(&path),
        Err(DataError::Compression { tag: 7 })
    ));
}

#[test]
fn oversized_depth_is_an_integrity_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.bin");
    // Header claims a lower bound than the entry uses.
    write_sample_table(&path, &sample_table(), 2, false).unwrap();

    assert!(matches!(
        read_sample_table(&path),
        Err(DataError::Integrity(_))
    ));
}

#[test]
fn truncated_body_is_a_short_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.bin");
    write_sample_table(&path, &sample_table(), 128, false).unwrap();

    let data = fs::read(&path).unwrap();
    fs::write(&path, &data[..72]).unwrap();

    assert!(matches!(
        read_sample_table(&path),
        Err(DataError::FileRead { .. })
    ));
}

#[test]
fn missing_file_is_a_file_open_error() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        read_sample_table(&dir.path().join("absent.bin")),
        Err(DataError::FileOpen { .. })
    ));
}

#[test]
fn memory_map_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run_rank_3.libmap");
    let map = MemoryMap::from_regions(vec![
        region("/usr/bin/app", 0x400000, 0x452000),
        region("/usr/lib/libc.so.6", 0x7f8a_4c00_0000, 0x7f8a_4c02_1000),
        region("[vdso]", 0x7ffc_1230_0000, 0x7ffc_1230_2000),
    ]);
    write_memory_map(&path, &map, 3).unwrap();

    let decoded = read_memory_map(&path).unwrap();
    assert_eq!(decoded.process_id, 3);
    assert_eq!(decoded.map.regions(), map.regions());
}

#[test]
fn libmap_rejects_inverted_region() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.libmap");
    let map = MemoryMap::from_regions(vec![region("app", 0x1000, 0x2000)]);
    write_memory_map(&path, &map, 0).unwrap();

    let mut data = fs::read(&path).unwrap();
    // Swap base and end of the first entry.
    let (base, end) = (0x2000u64, 0x1000u64);
    data[64..72].copy_from_slice(&base.to_le_bytes());
    data[72..80].copy_from_slice(&end.to_le_bytes());
    fs::write(&path, &data).unwrap();

    assert!(matches!(
        read_memory_map(&path),
        Err(DataError::Integrity(_))
    ));
}

#[test]
fn text_sidecar_lists_stacks_by_weight() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run_rank_0.txt");
    write_text_sidecar(&path, &sample_table()).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[0].contains("2 stacks"));
    assert!(lines[1].trim_start().starts_with("1000"));
    assert!(lines[2].contains("0x400300"));
}
