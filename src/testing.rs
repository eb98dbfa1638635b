//! Test-only serialization helper.
//!
//! The arena lives in real process break space (`sbrk`), which is
//! process-wide state. Since the allocator itself does no locking (by
//! design — see the crate's concurrency notes), anything that exercises
//! more than one `Allocator` instance in the same test binary must
//! serialize manually or two tests racing on `sbrk` will corrupt each
//! other's arena. This mirrors the `TEST_MUTEX` guard pattern used by the
//! free-list allocator test suite this crate's tests are modeled on.

use std::sync::{Mutex, MutexGuard};

static TEST_MUTEX: Mutex<()> = Mutex::new(());

/// Acquires the process-wide test lock. Hold the guard for the duration
/// of any test that calls into the real `sbrk`-backed `Allocator`.
pub fn serialize() -> MutexGuard<'static, ()> {
  match TEST_MUTEX.lock() {
    Ok(guard) => guard,
    Err(poisoned) => poisoned.into_inner(),
  }
}
