//! # segmalloc — a segregated-fit explicit free-list allocator
//!
//! This crate is a single-threaded, general-purpose dynamic storage
//! allocator that manages one contiguous, monotonically growable region
//! of raw bytes obtained from `sbrk` — the kind of allocator built for a
//! CS:APP-style malloc lab, not a production system allocator: no thread
//! safety, no `mmap` fallback, no large-object path, everything lives in
//! one arena.
//!
//! ## Crate structure
//!
//! ```text
//!   segmalloc
//!   ├── block      - header/footer encoding, the P bit, free-block links
//!   ├── heap       - the sbrk-backed heap provider adapter
//!   ├── freelist   - segregated size-class free lists (offset-encoded)
//!   ├── coalesce   - the four-case neighbor-merge engine
//!   ├── placement  - size-class lookup, bounded best-fit search, splitting
//!   ├── allocator  - the public init/alloc/free/realloc/calloc/check API
//!   ├── error      - AllocatorError
//!   └── testing    - a process-wide mutex for tests that touch real sbrk
//! ```
//!
//! ## The block layout
//!
//! Every block is 8-byte aligned and at least 16 bytes. It carries a
//! 4-byte header one word before the payload (size in its top bits, an
//! `A` allocated bit, and a `P` bit recording whether the *physically
//! preceding* block is allocated) and, only while free, a 4-byte footer
//! replicating size and `A`. Because a block's `P` bit already tells its
//! successor whether *it* is allocated, an allocated block never needs a
//! footer at all — that word becomes ordinary payload instead, which is
//! the main space optimization this design makes over a plain boundary-tag
//! allocator. Free blocks additionally store two 32-bit offsets (`pred`,
//! `succ`) in their first two payload words, encoding free-list links
//! relative to the arena base rather than as native pointers, so a link
//! pair still fits inside the 16-byte minimum block on a 64-bit host.
//!
//! ## Placement policy
//!
//! Free blocks are indexed by size class (`freelist::CLASS_THRESHOLDS`,
//! 18 geometric buckets). `alloc` scans outward from the requested size's
//! own class for a bounded number of fitting candidates
//! (`PlacementConfig::k`, default 6) before giving up and extending the
//! arena — a deliberate best-fit/first-fit tradeoff that bounds worst-case
//! search latency at the cost of perfect packing.
//!
//! ## Concurrency
//!
//! Single-threaded by design: no internal locking, no reentrancy (do not
//! call into an `Allocator` from a signal handler or from within another
//! of its own operations). A caller that wants concurrent access must
//! serialize calls to a shared `Allocator` itself, e.g. behind a mutex.

mod allocator;
mod block;
mod coalesce;
mod error;
mod freelist;
mod heap;
mod placement;

pub mod testing;

pub use allocator::Allocator;
pub use error::AllocatorError;
pub use freelist::{class_of, CLASS_THRESHOLDS};
pub use placement::PlacementConfig;
