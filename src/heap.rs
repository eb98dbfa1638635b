//! Heap provider adapter: a thin wrapper over `sbrk` that tracks the
//! arena's base and current break.
//!
//! Grounded in `rallocator::bump::BumpAllocator::allocate`, which calls
//! `libc::sbrk` directly inline; here the call is pulled into its own
//! type so the placement and coalescing engines can extend the arena
//! without also knowing how to build a block.
//!
//! ```text
//!   base                         break_offset        (after extend)
//!    │                                │                    │
//!    ▼                                ▼                    ▼
//!   ┌────────────────────────────────┐
//!   │         committed arena         │ ── sbrk(nbytes) ──► grows here
//!   └────────────────────────────────┘
//! ```

use libc::{c_void, intptr_t, sbrk};
use tracing::debug;

use crate::error::AllocatorError;

/// Owns the raw arena pointer and the offset of the current break
/// relative to it. `base` is fixed once `init` runs; `sbrk` on this
/// process must not be called by anything else for the lifetime of the
/// allocator (the same non-reentrancy assumption the teacher's
/// `BumpAllocator` makes).
pub struct HeapProvider {
  base: *mut u8,
  break_offset: u32,
}

impl HeapProvider {
  /// Calls `sbrk` once to establish `base`, returning the raw start
  /// address of the first `nbytes` of arena.
  pub fn bootstrap(nbytes: u32) -> Result<Self, AllocatorError> {
    let raw = unsafe { sbrk(nbytes as intptr_t) };
    if raw == usize::MAX as *mut c_void {
      return Err(AllocatorError::OutOfArena { requested: nbytes });
    }
    debug!(bytes = nbytes, base = ?raw, "bootstrapped arena");
    Ok(Self {
      base: raw as *mut u8,
      break_offset: nbytes,
    })
  }

  #[inline]
  pub fn base(&self) -> *mut u8 {
    self.base
  }

  #[inline]
  pub fn break_offset(&self) -> u32 {
    self.break_offset
  }

  /// Grows the arena by `nbytes` (caller guarantees 8-alignment and
  /// non-zero), returning the offset of the first new byte.
  pub fn extend(
    &mut self,
    nbytes: u32,
  ) -> Result<u32, AllocatorError> {
    debug_assert!(nbytes > 0 && nbytes % 8 == 0);
    let raw = unsafe { sbrk(nbytes as intptr_t) };
    if raw == usize::MAX as *mut c_void {
      debug!(bytes = nbytes, "sbrk refused to extend the arena");
      return Err(AllocatorError::OutOfArena { requested: nbytes });
    }
    let new_block_offset = self.break_offset;
    debug_assert_eq!(
      raw as usize,
      self.base as usize + new_block_offset as usize,
      "sbrk returned a non-contiguous address; something else is touching the break"
    );
    self.break_offset += nbytes;
    debug!(
      offset = new_block_offset,
      bytes = nbytes,
      new_break = self.break_offset,
      "extended arena"
    );
    Ok(new_block_offset)
  }
}
