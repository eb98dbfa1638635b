//! Coalescing engine: merges a newly-free block with its physical
//! neighbors across the four prev/next occupancy cases.
//!
//! Grounded directly in `original_source/mm.c`'s `_merge_free_blocks`,
//! whose four-way `if pred_alloc && succ_alloc / pred_alloc / succ_alloc
//! / else` structure this mirrors exactly. Two things are new relative
//! to mm.c, because mm.c's variant has no `P` bit and always writes a
//! footer: (1) the surviving block's `P` bit is preserved rather than
//! recomputed from a footer that may not exist, and (2) the block
//! physically following the merge result has its `P` bit cleared, since
//! the merge result is free.
//!
//! The four cases, `bp` being the block that just became free:
//!
//! ```text
//!   CASE 1: prev alloc, next alloc — no merge
//!   ┌────────┐┌────────┐┌────────┐
//!   │ A: prev ││ F: bp  ││ A: next │    survivor = bp
//!   └────────┘└────────┘└────────┘
//!
//!   CASE 2: prev alloc, next free — absorb next
//!   ┌────────┐┌────────┐┌────────┐
//!   │ A: prev ││ F: bp  ││ F: next │ ─► │ A: prev ││  F: bp+next merged  │
//!   └────────┘└────────┘└────────┘    survivor = bp
//!
//!   CASE 3: prev free, next alloc — absorb prev
//!   ┌────────┐┌────────┐┌────────┐
//!   │ F: prev ││ F: bp  ││ A: next │ ─► │  F: prev+bp merged  ││ A: next │
//!   └────────┘└────────┘└────────┘    survivor = prev
//!
//!   CASE 4: prev free, next free — absorb both
//!   ┌────────┐┌────────┐┌────────┐
//!   │ F: prev ││ F: bp  ││ F: next │ ─► │   F: prev+bp+next merged   │
//!   └────────┘└────────┘└────────┘    survivor = prev
//! ```

use tracing::trace;

use crate::block;
use crate::freelist::FreeLists;

/// Merges `bp` (already marked free, with a valid footer) with whichever
/// physical neighbors are also free, inserts the surviving block into
/// its free list, and returns the surviving block's offset.
pub fn coalesce(
  base: *mut u8,
  lists: &mut FreeLists,
  bp: u32,
) -> u32 {
  let prev_is_alloc = block::prev_alloc(base, bp);
  let next_bp = block::next_block(base, bp);
  let next_is_alloc = block::is_allocated(base, next_bp);

  let survivor = match (prev_is_alloc, next_is_alloc) {
    (true, true) => {
      // Case 1: no neighbor is free. Just record that `bp` itself
      // is now free for whoever follows it.
      block::set_prev_alloc_bit(base, next_bp, false);
      bp
    }
    (true, false) => {
      // Case 2: absorb the next block.
      lists.unlink(base, next_bp);
      let prev_alloc_bit = block::prev_alloc(base, bp);
      let new_size = block::size_of(base, bp) + block::size_of(base, next_bp);
      block::set_header(base, bp, new_size, false, prev_alloc_bit);
      block::set_footer(base, bp, new_size, false);
      bp
    }
    (false, true) => {
      // Case 3: absorb into the previous block.
      let prev_bp = block::prev_block(base, bp);
      lists.unlink(base, prev_bp);
      let prev_prev_alloc = block::prev_alloc(base, prev_bp);
      let new_size = block::size_of(base, prev_bp) + block::size_of(base, bp);
      block::set_header(base, prev_bp, new_size, false, prev_prev_alloc);
      block::set_footer(base, prev_bp, new_size, false);
      block::set_prev_alloc_bit(base, next_bp, false);
      prev_bp
    }
    (false, false) => {
      // Case 4: absorb both neighbors.
      let prev_bp = block::prev_block(base, bp);
      let next_next_bp = block::next_block(base, next_bp);
      lists.unlink(base, prev_bp);
      lists.unlink(base, next_bp);
      let prev_prev_alloc = block::prev_alloc(base, prev_bp);
      let new_size =
        block::size_of(base, prev_bp) + block::size_of(base, bp) + block::size_of(base, next_bp);
      block::set_header(base, prev_bp, new_size, false, prev_prev_alloc);
      block::set_footer(base, prev_bp, new_size, false);
      block::set_prev_alloc_bit(base, next_next_bp, false);
      prev_bp
    }
  };

  trace!(bp, survivor, size = block::size_of(base, survivor), "coalesced");
  lists.insert(base, survivor);
  survivor
}

#[cfg(test)]
mod tests {
  use super::*;

  /// Lays out `prologue(alloc) | blocks... | epilogue(alloc)` in a mock
  /// arena and returns `(arena, base_offset_of_first_block)`.
  fn arena_with_blocks(sizes_and_alloc: &[(u32, bool)]) -> (Vec<u8>, u32) {
    let total: u32 = sizes_and_alloc.iter().map(|(s, _)| s).sum();
    let mut arena = vec![0u8; (total + 64) as usize];
    let base = arena.as_mut_ptr();
    let mut bp = 8u32; // leave room for a fake predecessor footer
    let first_bp = bp;
    let mut prev_alloc = true;
    for &(size, alloc) in sizes_and_alloc {
      block::set_header(base, bp, size, alloc, prev_alloc);
      if !alloc {
        block::set_footer(base, bp, size, false);
      }
      prev_alloc = alloc;
      bp += size;
    }
    block::set_header(base, bp, 0, true, prev_alloc); // epilogue
    (arena, first_bp)
  }

  #[test]
  fn case_both_neighbors_allocated_does_not_merge() {
    let (mut arena, first) = arena_with_blocks(&[(32, true), (32, false), (32, true)]);
    let base = arena.as_mut_ptr();
    let mut lists = FreeLists::new();
    let middle = first + 32;
    let survivor = coalesce(base, &mut lists, middle);
    assert_eq!(survivor, middle);
    assert_eq!(block::size_of(base, survivor), 32);
    let next = block::next_block(base, survivor);
    assert!(!block::prev_alloc(base, next));
  }

  #[test]
  fn case_merges_with_free_successor() {
    let (mut arena, first) = arena_with_blocks(&[(32, true), (32, false), (32, false), (8, true)]);
    let base = arena.as_mut_ptr();
    let mut lists = FreeLists::new();
    let middle = first + 32;
    let next = block::next_block(base, middle);
    lists.insert(base, next);

    let survivor = coalesce(base, &mut lists, middle);
    assert_eq!(survivor, middle);
    assert_eq!(block::size_of(base, survivor), 64);
    assert!(!block::is_allocated(base, survivor));
  }

  #[test]
  fn case_merges_with_free_predecessor() {
    let (mut arena, first) = arena_with_blocks(&[(32, true), (32, false), (32, false), (8, true)]);
    let base = arena.as_mut_ptr();
    let mut lists = FreeLists::new();
    let prev = first + 32;
    lists.insert(base, prev);
    let bp = block::next_block(base, prev);

    let survivor = coalesce(base, &mut lists, bp);
    assert_eq!(survivor, prev);
    assert_eq!(block::size_of(base, survivor), 64);
    let next = block::next_block(base, survivor);
    assert!(!block::prev_alloc(base, next));
  }

  #[test]
  fn case_merges_both_neighbors() {
    let (mut arena, first) =
      arena_with_blocks(&[(32, true), (24, false), (24, false), (24, false), (8, true)]);
    let base = arena.as_mut_ptr();
    let mut lists = FreeLists::new();
    let prev = first + 32;
    let bp = prev + 24;
    let next = bp + 24;
    lists.insert(base, prev);
    lists.insert(base, next);

    let survivor = coalesce(base, &mut lists, bp);
    assert_eq!(survivor, prev);
    assert_eq!(block::size_of(base, survivor), 72);
    let after = block::next_block(base, survivor);
    assert!(!block::prev_alloc(base, after));
    assert_eq!(lists.head(crate::freelist::class_of(72)), Some(survivor));
  }
}
