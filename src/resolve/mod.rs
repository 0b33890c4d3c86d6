use std::collections::BTreeMap;
use std::fmt;

use crate::map::MemoryMap;

#[cfg(test)]
mod test;

/// Library name assigned to addresses no snapshot region contains.
pub const UNRESOLVED: &str = "<unresolved>";

/// A raw frame address resolved against a memory-map snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResolvedFrame {
    pub raw: u64,
    pub library: String,
    pub offset: u64,
}

impl ResolvedFrame {
    pub fn unresolved(raw: u64) -> Self {
        ResolvedFrame {
            raw,
            library: UNRESOLVED.to_owned(),
            offset: raw,
        }
    }

    /// `library+0xoffset`, the form downstream symbolizers consume.
    pub fn location(&self) -> String {
        format!("{}+{:#x}", self.library, self.offset)
    }
}

impl fmt::Display for ResolvedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{:#x}", self.library, self.offset)
    }
}

pub type ResolvedStack = Vec<ResolvedFrame>;

/// Turns raw sample addresses into `(library, offset)` pairs using the
/// per-rank memory-map snapshots registered under their map ids.
#[derive(Debug, Default)]
pub struct AddressResolver {
    maps: BTreeMap<i32, MemoryMap>,
}

impl AddressResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_map(&mut self, map_id: i32, map: MemoryMap) {
        self.maps.insert(map_id, map);
    }

    pub fn map(&self, map_id: i32) -> Option<&MemoryMap> {
        self.maps.get(&map_id)
    }

    pub fn resolve_addr(&self, addr: u64, map_id: i32) -> ResolvedFrame {
        match self.maps.get(&map_id).and_then(|map| map.resolve(addr)) {
            Some((name, offset)) => ResolvedFrame {
                raw: addr,
                library: name.to_owned(),
                offset,
            },
            None => ResolvedFrame::unresolved(addr),
        }
    }

    /// Resolves a whole stack, preserving frame order.
    pub fn resolve_stack(&self, raw_stack: &[u64], map_id: i32) -> ResolvedStack {
        raw_stack
            .iter()
            .map(|&addr| self.resolve_addr(addr, map_id))
            .collect()
    }

    /// Batched variant of [`resolve_stack`](Self::resolve_stack).
    pub fn resolve_all<'a>(
        &self,
        raw_stacks: impl IntoIterator<Item = &'a [u64]>,
        map_id: i32,
    ) -> Vec<ResolvedStack> {
        raw_stacks
            .into_iter()
            .map(|stack| self.resolve_stack(stack, map_id))
            .collect()
    }
}
