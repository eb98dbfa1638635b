use std::ptr::{self, NonNull};

use segmalloc::{Allocator, PlacementConfig};

fn write_pattern(
  ptr: NonNull<u8>,
  byte: u8,
  len: usize,
) {
  unsafe { ptr::write_bytes(ptr.as_ptr(), byte, len) };
}

fn read_byte(
  ptr: NonNull<u8>,
  index: usize,
) -> u8 {
  unsafe { ptr.as_ptr().add(index).read() }
}

#[test]
fn alloc_free_alloc_reuses_and_stays_consistent() {
  let _guard = segmalloc::testing::serialize();
  let mut a = Allocator::init().expect("init");
  a.check(false).expect("fresh arena is consistent");

  let p1 = a.alloc(24).expect("alloc 1");
  a.check(false).expect("after first alloc");
  a.free(Some(p1));
  a.check(false).expect("after free");
  let p2 = a.alloc(24).expect("alloc 2");
  a.check(false).expect("after reuse");
  assert_eq!(p1, p2, "the freed block should be reused");
}

#[test]
fn split_carves_a_tight_remainder() {
  let _guard = segmalloc::testing::serialize();
  let mut a = Allocator::init().expect("init");

  let p1 = a.alloc(24).expect("alloc 1");
  a.check(false).expect("after alloc 1");
  let p2 = a.alloc(8).expect("alloc 2");
  a.check(false).expect("after alloc 2");

  let stride = p2.as_ptr() as usize - p1.as_ptr() as usize;
  assert_eq!(stride, 32, "a 24-byte request rounds to a 32-byte block");
}

#[test]
fn three_way_coalesce_then_reuse_stays_consistent() {
  let _guard = segmalloc::testing::serialize();
  let mut a = Allocator::init().expect("init");

  let p1 = a.alloc(24).expect("alloc 1");
  let p2 = a.alloc(24).expect("alloc 2");
  let p3 = a.alloc(24).expect("alloc 3");
  a.check(false).expect("after three allocs");

  a.free(Some(p1));
  a.check(false).expect("after freeing p1");
  a.free(Some(p3));
  a.check(false).expect("after freeing p3 (no adjacent merge yet)");
  a.free(Some(p2));
  a.check(false).expect("after freeing p2 merges all three");

  let p4 = a.alloc(72).expect("a 72-byte request fits the merged 96-byte block");
  a.check(false).expect("after reuse");
  assert_eq!(p4, p1, "the merged block should start where p1 did");
}

#[test]
fn prev_alloc_bit_survives_coalesce_and_further_allocation() {
  let _guard = segmalloc::testing::serialize();
  let mut a = Allocator::init().expect("init");

  let p1 = a.alloc(24).expect("alloc 1");
  let p2 = a.alloc(24).expect("alloc 2");
  let p3 = a.alloc(24).expect("alloc 3");
  a.free(Some(p1));
  a.free(Some(p3));
  a.free(Some(p2));
  a.check(true).expect("after three-way coalesce");

  let _p4 = a.alloc(72).expect("absorb the merged block");
  a.check(true).expect("after absorbing the merged block");
  let p5 = a.alloc(8).expect("alloc from whatever is left");
  a.check(true).expect("after one more alloc");
  assert!(!p5.as_ptr().is_null());
}

#[test]
fn heap_growth_keeps_every_invariant_through_many_allocations() {
  let _guard = segmalloc::testing::serialize();
  let mut a = Allocator::with_config(PlacementConfig {
    chunk_hint: 64,
    ..PlacementConfig::default()
  })
  .expect("init with a small chunk hint to force repeated growth");

  let mut live = Vec::new();
  for i in 0..96 {
    let p = a.alloc(40).unwrap_or_else(|| panic!("alloc {i} should grow the arena"));
    live.push(p);
    a.check(false).unwrap_or_else(|_| panic!("invariants hold at alloc {i}"));
  }

  for (i, p) in live.into_iter().enumerate() {
    a.free(Some(p));
    a.check(false).unwrap_or_else(|_| panic!("invariants hold at free {i}"));
  }
}

#[test]
fn realloc_grow_and_shrink_preserve_the_shared_prefix() {
  let _guard = segmalloc::testing::serialize();
  let mut a = Allocator::init().expect("init");

  let p = a.alloc(200).expect("alloc");
  write_pattern(p, 0x5A, 200);
  a.check(false).expect("after alloc");

  let grown = a.realloc(Some(p), 800).expect("grow");
  a.check(false).expect("after growing realloc");
  for i in 0..200 {
    assert_eq!(read_byte(grown, i), 0x5A, "byte {i} must survive growing");
  }

  let shrunk = a.realloc(Some(grown), 32).expect("shrink");
  a.check(false).expect("after shrinking realloc");
  for i in 0..32 {
    assert_eq!(read_byte(shrunk, i), 0x5A, "byte {i} must survive shrinking");
  }
}

#[test]
fn realloc_edge_cases_match_the_documented_contract() {
  let _guard = segmalloc::testing::serialize();
  let mut a = Allocator::init().expect("init");

  let via_nil = a.realloc(None, 16).expect("realloc(None, n) behaves like alloc(n)");
  assert!(!via_nil.as_ptr().is_null());
  a.check(false).expect("after realloc-as-alloc");

  assert!(
    a.realloc(Some(via_nil), 0).is_none(),
    "realloc(p, 0) behaves like free(p) and returns nil"
  );
  a.check(false).expect("after realloc-as-free");
}

#[test]
fn calloc_zeroes_every_byte_of_reused_memory() {
  let _guard = segmalloc::testing::serialize();
  let mut a = Allocator::init().expect("init");

  let scratch = a.alloc(128).expect("alloc scratch");
  write_pattern(scratch, 0xFF, 128);
  a.free(Some(scratch));
  a.check(false).expect("after freeing scratch");

  let zeroed = a.calloc(16, 8).expect("calloc reusing the freed scratch block");
  a.check(false).expect("after calloc");
  for i in 0..128 {
    assert_eq!(read_byte(zeroed, i), 0, "byte {i} must be zeroed even though it was reused");
  }
}

#[test]
fn alloc_zero_and_free_nil_are_well_defined_no_ops() {
  let _guard = segmalloc::testing::serialize();
  let mut a = Allocator::init().expect("init");

  assert!(a.alloc(0).is_none(), "alloc(0) is defined to return nil");
  a.free(None); // must not panic
  a.check(false).expect("invariants hold after the no-ops");
}
