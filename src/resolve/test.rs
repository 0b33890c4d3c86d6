use super::{AddressResolver, ResolvedFrame, UNRESOLVED};
use crate::map::{MemoryMap, MemoryRegion};

fn resolver() -> AddressResolver {
    let mut resolver = AddressResolver::new();
    resolver.register_map(
        0,
        MemoryMap::from_regions(vec![
            MemoryRegion {
                name: "app".into(),
                base: 0x400000,
                end: 0x401000,
                executable: true,
            },
            MemoryRegion {
                name: "libm.so".into(),
                base: 0x7f00_0000_0000,
                end: 0x7f00_0010_0000,
                executable: true,
            },
        ]),
    );
    resolver
}

#[test]
fn static_region_keeps_raw_offset() {
    let frame = resolver().resolve_addr(0x400200, 0);
    assert_eq!(frame.library, "app");
    assert_eq!(frame.offset, 0x400200);
    assert_eq!(frame.raw, 0x400200);
}

#[test]
fn dynamic_region_is_rebased() {
    let frame = resolver().resolve_addr(0x7f00_0000_1234, 0);
    assert_eq!(frame.library, "libm.so");
    assert_eq!(frame.offset, 0x1234);
}

#[test]
fn miss_yields_unresolved_with_raw_offset() {
    let frame = resolver().resolve_addr(0xdead_beef, 0);
    assert_eq!(frame, ResolvedFrame::unresolved(0xdead_beef));
    assert_eq!(frame.library, UNRESOLVED);
    assert_eq!(frame.offset, 0xdead_beef);
}

#[test]
fn unknown_map_id_resolves_nothing() {
    let frame = resolver().resolve_addr(0x400200, 9);
    assert_eq!(frame.library, UNRESOLVED);
}

#[test]
fn stack_order_is_preserved() {
    let stack = resolver().resolve_stack(&[0x400000, 0x7f00_0000_0040, 0x1], 0);
    assert_eq!(stack.len(), 3);
    assert_eq!(stack[0].library, "app");
    assert_eq!(stack[1].library, "libm.so");
    assert_eq!(stack[2].library, UNRESOLVED);
}

#[test]
fn batched_resolution_matches_single() {
    let resolver = resolver();
    let stacks: Vec<&[u64]> = vec![&[0x400010], &[0x7f00_0000_0100]];
    let resolved = resolver.resolve_all(stacks, 0);
    assert_eq!(resolved[0], resolver.resolve_stack(&[0x400010], 0));
    assert_eq!(resolved[1], resolver.resolve_stack(&[0x7f00_0000_0100], 0));
}

#[test]
fn location_formats_library_and_offset() {
    let frame = resolver().resolve_addr(0x7f00_0000_1234, 0);
    assert_eq!(frame.location(), "libm.so+0x1234");
}
