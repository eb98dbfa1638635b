//! Allocator error kinds.
//!
//! Public pointer-returning operations (`alloc`, `free`, `realloc`,
//! `calloc`) keep the C-shaped nil-sentinel contract: they return
//! `Option<NonNull<u8>>`, not `Result`, because a nil result is a defined
//! outcome, not an exceptional one. `AllocatorError` exists for the two
//! cases that are genuinely exceptional: the heap provider refusing to
//! grow the arena, and `check` finding a broken invariant.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AllocatorError {
  /// `sbrk` (or whatever the heap provider wraps) declined to extend
  /// the arena.
  #[error("heap provider refused to extend the arena by {requested} bytes")]
  OutOfArena { requested: u32 },

  /// Raised only by `check`: the arena or free lists violate one of
  /// the invariants in the allocator's data model. Indicates a bug in
  /// the allocator itself, not in a caller.
  #[error("allocator invariant violated: {0}")]
  InvariantViolation(String),
}
