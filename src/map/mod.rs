use std::fs::File;
use std::io::{BufRead, BufReader, Result};


/// Load addresses below this are treated as non-relocatable: offsets in
/// such regions equal the raw address.
pub const DYNAMIC_BASE_THRESHOLD: u64 = 0x1000_0000;

/// Sentinel name for executable regions without a pathname.
pub const ANONYMOUS_REGION: &str = "[anonymous]";

/// One executable mapping of the process address space.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryRegion {
    pub name: String,
    pub base: u64,
    pub end: u64,
    pub executable: bool,
}

impl MemoryRegion {
    pub fn contains(&self, addr: u64) -> bool {
        self.base <= addr && addr < self.end
    }

    /// Library-relative offset of `addr` under the static/dynamic rule.
    pub fn offset_of(&self, addr: u64) -> u64 {
        if self.base >= DYNAMIC_BASE_THRESHOLD {
            addr - self.base
        } else {
            addr
        }
    }
}

/// An immutable snapshot of the executable regions of a process, taken
/// once at sampler init from `/proc/self/maps`.
#[derive(Clone, Debug, Default)]
pub struct MemoryMap {
    regions: Vec<MemoryRegion>,
}

impl MemoryMap {
    /// Captures the current process map.
    pub fn snapshot() -> Result<Self> {
        let file = File::open("/proc/self/maps")?;
        let map = Self::from_reader(BufReader::new(file))?;
        tracing::debug!(regions = map.regions.len(), "captured memory map snapshot");
        Ok(map)
    }

    /// Parses a line-oriented map listing, retaining executable regions.
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut regions = Vec::new();
        for line in reader.lines() {
            if let Some(region) = parse_line(&line?) {
                regions.push(region);
            }
        }
        Ok(MemoryMap { regions })
    }

    /// Rebuilds a snapshot from already-decoded regions, dropping any
    /// that are non-executable or empty.
    pub fn from_regions(regions: Vec<MemoryRegion>) -> Self {
        let regions = regions
            .into_iter()
            .filter(|r| r.executable && r.base < r.end)
            .collect();
        MemoryMap { regions }
    }

    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// First region containing `addr`, with the library-relative offset.
    pub fn resolve(&self, addr: u64) -> Option<(&str, u64)> {
        self.regions
            .iter()
            .find(|r| r.contains(addr))
            .map(|r| (r.name.as_str(), r.offset_of(addr)))
    }
}

fn split_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], &s[i..]),
        None => (s, ""),
    }
}

// `address-range perms offset dev inode [pathname]`, e.g.
// `7f8a4c000000-7f8a4c021000 r-xp 00000000 08:02 131122 /usr/lib/libc.so.6`
fn parse_line(line: &str) -> Option<MemoryRegion> {
    let (range, rest) = split_token(line);
    let (perms, rest) = split_token(rest);
    let (_offset, rest) = split_token(rest);
    let (_dev, rest) = split_token(rest);
    let (_inode, rest) = split_token(rest);

    if !perms.contains('x') {
        return None;
    }

    let (base, end) = range.split_once('-')?;
    let base = u64::from_str_radix(base, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;
    if base >= end {
        return None;
    }

    let name = rest.trim();
    let name = if name.is_empty() {
        ANONYMOUS_REGION.to_owned()
    } else {
        name.to_owned()
    };

    Some(MemoryRegion {
        name,
        base,
        end,
        executable: true,
    })
}
