//! # Epoch Counter (counter.rs)
//!
//! The shared byte counter at the heart of the governor. The
//! receive-completion handler increments it; the epoch-tick handler
//! drains it. Both run in contexts that may interleave arbitrarily,
//! so the counter's whole public surface is two atomic operations.
//!
//! ## Why Only Two Operations
//!
//! ```text
//!     Receive path                    Tick path
//!     ────────────                    ─────────
//!     increment(unit) ──┐
//!     increment(unit) ──┤
//!                       ├──► AtomicU64 ◄── sample_and_reset()
//!     increment(unit) ──┘         │
//!                                 └─► every byte lands in exactly
//!                                     one sample, never two, never none
//! ```
//!
//! `increment` is a fetch-add and `sample_and_reset` is a swap-to-zero.
//! Because both are single atomic read-modify-writes on the same word,
//! an increment concurrent with a sample is attributed to exactly one
//! epoch: either the swap sees it (this epoch) or the add lands on the
//! fresh zero (next epoch). There is no window in which a count can be
//! lost or doubled.

use std::sync::atomic::AtomicU64;

use crate::governor::config::MemoryOrdering;
use crate::governor::utils::CacheAligned;

/// Atomic per-epoch byte counter.
///
/// Tracks how many bytes arrived since the last epoch tick. The public
/// contract is deliberately minimal: [`increment`](Self::increment) for
/// the receive path and [`sample_and_reset`](Self::sample_and_reset)
/// for the tick path. Anything richer (read-then-write sequences,
/// separate clear calls) would reopen the lost-update races this type
/// exists to close.
///
/// The counter lives on its own cache line so the receive path's
/// stream of read-modify-writes does not invalidate neighboring state.
///
/// # Example
///
/// ```rust
/// use weir::{EpochCounter, MemoryOrdering};
///
/// let counter = EpochCounter::new(MemoryOrdering::AcquireRelease);
///
/// assert_eq!(counter.increment(1), 1);
/// assert_eq!(counter.increment(1), 2);
///
/// // The tick drains the count in one shot
/// assert_eq!(counter.sample_and_reset(), 2);
/// assert_eq!(counter.sample_and_reset(), 0);
/// ```
pub struct EpochCounter {
    /// Bytes received since the last sample (hot, own cache line)
    bytes: CacheAligned<AtomicU64>,
    /// Ordering strategy shared with the owning governor
    ordering: MemoryOrdering,
}

impl EpochCounter {
    /// Creates a counter starting at zero.
    pub fn new(ordering: MemoryOrdering) -> Self {
        Self {
            bytes: CacheAligned::new(AtomicU64::new(0)),
            ordering,
        }
    }

    /// Adds `n` bytes and returns the count after the addition.
    ///
    /// Returning the post-increment value lets the caller compare
    /// against its threshold without a second load that could see a
    /// count some other completion already advanced.
    ///
    /// Saturation is not handled here: one epoch cannot realistically
    /// accumulate anywhere near `u64::MAX` bytes between two ticks.
    #[inline(always)]
    pub fn increment(&self, n: u64) -> u64 {
        self.bytes.0.fetch_add(n, self.ordering.rmw()) + n
    }

    /// Atomically takes the current count, leaving zero behind.
    ///
    /// This is the tick handler's read-and-reset: one swap, so a
    /// concurrent [`increment`](Self::increment) lands either in the
    /// returned sample or in the next epoch's count, never both.
    #[inline(always)]
    pub fn sample_and_reset(&self) -> u64 {
        self.bytes.0.swap(0, self.ordering.rmw())
    }

    /// Reads the count without disturbing it.
    ///
    /// Metrics-only peek; the governed logic itself never needs it.
    #[inline(always)]
    pub(crate) fn current(&self) -> u64 {
        self.bytes.0.load(self.ordering.load())
    }
}

impl std::fmt::Debug for EpochCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochCounter")
            .field("bytes", &self.current())
            .field("ordering", &self.ordering)
            .finish()
    }
}
