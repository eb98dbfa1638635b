//! Public API: `init`, `alloc`, `free`, `realloc`, `calloc`, `check`.
//!
//! This is the component that ties the rest of the engine together,
//! generalizing the orchestration `original_source/mm.c`'s `mm_init` /
//! `malloc` / `free` / `realloc` / `calloc` perform over a single free
//! list into the segregated design the allocator's design notes
//! describe. Pointer-returning operations use `Option<NonNull<u8>>`
//! rather than a raw pointer, matching the teacher's own choice to
//! express "nil on failure" through a real Rust type rather than a
//! sentinel bit pattern once a safe wrapper is doing the returning.
//!
//! The arena right after the padding/prologue/epilogue sentinels are
//! written, and again after `init`'s one chunk-hint pre-extension:
//!
//! ```text
//!   just bootstrapped:
//!   ┌─────┬──────────────┬──────────┐
//!   │ pad │ prologue (A) │ epilogue │
//!   └─────┴──────────────┴──────────┘
//!
//!   after pre-extend (the epilogue slot becomes the new block's header,
//!   and a fresh epilogue is written past the end of the free block):
//!   ┌─────┬──────────────┬───────────────────────────┬──────────┐
//!   │ pad │ prologue (A) │ free: chunk_hint bytes (F) │ epilogue │
//!   └─────┴──────────────┴───────────────────────────┴──────────┘
//! ```

use std::ptr::{self, NonNull};

use tracing::{debug, error, instrument};

use crate::block::{self, MIN_BLOCK, WORD};
use crate::coalesce::coalesce;
use crate::error::AllocatorError;
use crate::freelist::{class_of, FreeLists, NUM_CLASSES};
use crate::heap::HeapProvider;
use crate::placement::{find_fit, split, PlacementConfig};

/// Bytes reserved for the prologue (one min-size sentinel block) plus
/// the epilogue (a single zero-size header word), laid out the way
/// `original_source/mm.c`'s `mm_init` does: one padding word so the
/// prologue's payload begins 8-byte aligned, the prologue itself, then
/// the epilogue.
const PROLOGUE_AND_EPILOGUE_BYTES: u32 = WORD + MIN_BLOCK + WORD;

/// A single-threaded, segregated-fit allocator over one growable `sbrk`
/// arena.
///
/// All state — the arena's base pointer and current break, and every
/// free-list head — lives on this value; there is no hidden global.
/// Callers who want concurrent access must serialize calls to it
/// themselves (see the crate-level docs).
pub struct Allocator {
  heap: HeapProvider,
  lists: FreeLists,
  cfg: PlacementConfig,
}

impl Allocator {
  /// Bootstraps a fresh arena with the default placement policy.
  #[instrument(skip_all)]
  pub fn init() -> Result<Self, AllocatorError> {
    Self::with_config(PlacementConfig::default())
  }

  /// Bootstraps a fresh arena with an explicit placement policy.
  #[instrument(skip_all)]
  pub fn with_config(cfg: PlacementConfig) -> Result<Self, AllocatorError> {
    let mut heap = HeapProvider::bootstrap(PROLOGUE_AND_EPILOGUE_BYTES)?;
    let base = heap.base();

    // w0: padding so the prologue's header lands 8-byte aligned.
    block::write_raw_word(base, 0, 0);
    // Prologue: a permanently allocated MIN_BLOCK-size sentinel.
    // Its `P` bit is irrelevant (coalesce never steps left of it,
    // since the first real block's own `P` bit is forced true).
    let prologue_bp = WORD + WORD;
    block::set_header(base, prologue_bp, MIN_BLOCK, true, true);
    let prologue_footer = block::footer_offset(base, prologue_bp);
    block::write_raw_word(base, prologue_footer, block::pack(MIN_BLOCK, true, false));
    // Epilogue: size-0, allocated, `P` reflects the prologue.
    let epilogue_bp = block::next_block(base, prologue_bp);
    block::write_raw_word(
      base,
      block::header_offset(epilogue_bp),
      block::pack(0, true, true),
    );
    debug_assert_eq!(epilogue_bp, PROLOGUE_AND_EPILOGUE_BYTES);

    let mut allocator = Self {
      heap,
      lists: FreeLists::new(),
      cfg,
    };
    allocator.extend_heap(cfg.chunk_hint)?;
    debug!("allocator initialized");
    Ok(allocator)
  }

  #[inline]
  fn base(&self) -> *mut u8 {
    self.heap.base()
  }

  /// Grows the arena by `nbytes` (rounded up to 8 bytes), lays down a
  /// fresh free block plus a new epilogue, and coalesces it into
  /// whatever free space preceded it. Returns the offset of the
  /// resulting (possibly merged) free block.
  fn extend_heap(
    &mut self,
    nbytes: u32,
  ) -> Result<u32, AllocatorError> {
    let nbytes = block::align8(nbytes.max(MIN_BLOCK));
    let base = self.base();
    let bp = self.heap.break_offset();
    let prev_alloc_bit = block::prev_alloc(base, bp);

    let extended_at = self.heap.extend(nbytes)?;
    debug_assert_eq!(extended_at, bp);

    block::set_header(base, bp, nbytes, false, prev_alloc_bit);
    block::set_footer(base, bp, nbytes, false);
    block::set_pred(base, bp, None);
    block::set_succ(base, bp, None);
    let new_epilogue = bp + nbytes;
    block::write_raw_word(base, block::header_offset(new_epilogue), block::pack(0, true, false));

    debug!(bp, nbytes, "extended heap with a fresh free block");
    Ok(coalesce(base, &mut self.lists, bp))
  }

  /// `asize = max(MIN_BLOCK, align8(n + header_word))`: an allocated
  /// block reserves no footer (§4.1's space optimization), so only one
  /// header word is overhead.
  fn adjust_request_size(n: usize) -> Option<u32> {
    let n = u32::try_from(n).ok()?;
    let with_header = n.checked_add(WORD)?;
    Some(block::align8(with_header).max(MIN_BLOCK))
  }

  /// Allocates `n` bytes. Returns `None` for `n == 0` (defined, not an
  /// error) or if the arena cannot grow enough to satisfy the request.
  #[instrument(skip(self))]
  pub fn alloc(
    &mut self,
    n: usize,
  ) -> Option<NonNull<u8>> {
    if n == 0 {
      return None;
    }
    let asize = Self::adjust_request_size(n)?;
    let base = self.base();

    let bp = match find_fit(base, &self.lists, asize, &self.cfg) {
      Some(bp) => bp,
      None => {
        let grow_by = asize.max(self.cfg.chunk_hint);
        self.extend_heap(grow_by).ok()?
      }
    };
    self.build(bp, asize);

    let ptr = unsafe { block::payload_ptr(base, bp) };
    debug!(bp, asize, "alloc satisfied");
    Some(unsafe { NonNull::new_unchecked(ptr) })
  }

  /// Consumes the free block `bp` for a request of `asize` bytes:
  /// unlinks it, splits off a remainder if that remainder would be
  /// usefully sized, and marks the head allocated.
  fn build(
    &mut self,
    bp: u32,
    asize: u32,
  ) {
    let base = self.base();
    self.lists.unlink(base, bp);
    match split(base, bp, asize) {
      Some(remainder_bp) => {
        coalesce(base, &mut self.lists, remainder_bp);
      }
      None => {}
    }
  }

  /// Frees `p`. A `None` (nil) pointer is a no-op.
  #[instrument(skip(self))]
  pub fn free(
    &mut self,
    p: Option<NonNull<u8>>,
  ) {
    let Some(p) = p else { return };
    let base = self.base();
    let bp = unsafe { block::offset_of_payload(base, p.as_ptr()) };
    let size = block::size_of(base, bp);
    let prev_alloc = block::prev_alloc(base, bp);
    block::set_header(base, bp, size, false, prev_alloc);
    block::set_footer(base, bp, size, false);
    coalesce(base, &mut self.lists, bp);
    debug!(bp, size, "freed");
  }

  /// Resizes the allocation at `p` to `n` bytes, preserving the
  /// shared prefix of old and new contents.
  ///
  /// `p == None` behaves like `alloc(n)`; `n == 0` behaves like
  /// `free(p)` and returns `None`. Otherwise a fresh block is
  /// allocated, the lesser of the old and new *usable* sizes is
  /// copied from the old block, and the old block is freed.
  #[instrument(skip(self))]
  pub fn realloc(
    &mut self,
    p: Option<NonNull<u8>>,
    n: usize,
  ) -> Option<NonNull<u8>> {
    let Some(p) = p else {
      return self.alloc(n);
    };
    if n == 0 {
      self.free(Some(p));
      return None;
    }

    let base = self.base();
    let old_bp = unsafe { block::offset_of_payload(base, p.as_ptr()) };
    let old_block_size = block::size_of(base, old_bp);

    let new_ptr = self.alloc(n)?;
    let new_bp = unsafe { block::offset_of_payload(base, new_ptr.as_ptr()) };
    let new_block_size = block::size_of(base, new_bp);

    // Allocated blocks carry no footer, so the whole block minus one
    // header word is usable payload; see the crate's resolved open
    // question on this exact subtraction.
    let copy_len = old_block_size.min(new_block_size) - WORD;
    unsafe {
      ptr::copy_nonoverlapping(p.as_ptr(), new_ptr.as_ptr(), copy_len as usize);
    }
    self.free(Some(p));
    Some(new_ptr)
  }

  /// Allocates space for `m * n` bytes and zeroes it.
  #[instrument(skip(self))]
  pub fn calloc(
    &mut self,
    m: usize,
    n: usize,
  ) -> Option<NonNull<u8>> {
    let bytes = m.checked_mul(n)?;
    let ptr = self.alloc(bytes)?;
    unsafe { ptr::write_bytes(ptr.as_ptr(), 0, bytes) };
    Some(ptr)
  }

  /// Walks the arena and the free lists, checking every invariant in
  /// the allocator's data model. Never called on the hot path; meant
  /// for tests and debug builds.
  #[instrument(skip(self))]
  pub fn check(
    &self,
    verbose: bool,
  ) -> Result<(), AllocatorError> {
    let base = self.base();
    let arena_end = self.heap.break_offset();
    let mut bp = PROLOGUE_AND_EPILOGUE_BYTES; // first real block, right after the prologue
    let mut prev_was_free = false;
    let mut free_in_arena_order = Vec::new();

    while bp < arena_end {
      let size = block::size_of(base, bp);
      if size == 0 {
        break; // reached the epilogue
      }
      if size % 8 != 0 || size < MIN_BLOCK {
        return invariant_violation(format!(
          "block at {bp} has invalid size {size}"
        ));
      }
      let alloc = block::is_allocated(base, bp);
      if !alloc {
        let footer = unsafe {
          (base.add(block::footer_offset(base, bp) as usize) as *mut u32).read()
        };
        if footer & !0x7 != size {
          return invariant_violation(format!(
            "free block at {bp} has mismatched header/footer size"
          ));
        }
        if prev_was_free {
          return invariant_violation(format!(
            "two physically adjacent free blocks at/around {bp}"
          ));
        }
        free_in_arena_order.push(bp);
      }
      let next_bp = block::next_block(base, bp);
      if next_bp <= arena_end && next_bp != bp {
        let next_prev_alloc = block::prev_alloc(base, next_bp);
        if next_prev_alloc != alloc {
          return invariant_violation(format!(
            "block at {next_bp} has a stale P bit relative to predecessor at {bp}"
          ));
        }
      }
      prev_was_free = !alloc;
      bp = next_bp;
      if verbose {
        debug!(bp, size, alloc, "check: visited block");
      }
    }

    let mut via_lists = Vec::new();
    for class in 0..NUM_CLASSES {
      let mut cursor = self.lists.head(class);
      while let Some(list_bp) = cursor {
        if class_of(block::size_of(base, list_bp)) != class {
          return invariant_violation(format!(
            "block at {list_bp} is on class {class} but belongs elsewhere"
          ));
        }
        via_lists.push(list_bp);
        cursor = block::get_succ(base, list_bp);
      }
    }
    via_lists.sort_unstable();
    let mut sorted_free = free_in_arena_order.clone();
    sorted_free.sort_unstable();
    if via_lists != sorted_free {
      return invariant_violation(
        "free-list membership does not match the set of free blocks in the arena".into(),
      );
    }

    Ok(())
  }
}

fn invariant_violation(message: String) -> Result<(), AllocatorError> {
  error!(message, "check failed");
  Err(AllocatorError::InvariantViolation(message))
}
