//! # Utility Functions (utils.rs)
//!
//! Platform-specific helpers shared by the governor hot path and the
//! registry. This module provides the monotonic clock used for idle-port
//! tracking and the cache-line alignment wrapper that keeps the receive
//! path and the tick path from fighting over a cache line.
//!
//! ## Platform Layout
//!
//! ```text
//!     Cache line sizes by architecture:
//!
//!     x86_64 (Intel/AMD):
//!     └─ Cache line: 64 bytes
//!
//!     AArch64 (ARM):
//!     └─ Cache line: 128 bytes
//!
//!     Generic (Fallback):
//!     └─ Cache line: 64 bytes (assumed)
//! ```

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

// Architecture-specific cache line sizes
// These values are critical for preventing false sharing between CPU cores

/// Cache line size for x86_64 processors (Intel/AMD).
///
/// Most modern x86_64 CPUs use 64-byte cache lines.
#[cfg(target_arch = "x86_64")]
pub const CACHE_LINE_SIZE: usize = 64;

/// Cache line size for ARM64 processors.
///
/// Many ARM processors use 128-byte cache lines for better performance.
#[cfg(target_arch = "aarch64")]
pub const CACHE_LINE_SIZE: usize = 128;

/// Default cache line size for other architectures.
///
/// We assume 64 bytes as a reasonable default.
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub const CACHE_LINE_SIZE: usize = 64;

// Monotonic time base to prevent issues when the system clock jumps.
// We capture the wall-clock epoch milliseconds at process start,
// then advance using a monotonic Instant to compute 'now'.
static START_TIME_BASE: OnceLock<(Instant, u64)> = OnceLock::new();

/// Returns the current time in milliseconds since UNIX epoch.
///
/// Used for tracking when a port last saw a completion, which drives
/// idle-port cleanup in the registry. Millisecond precision is
/// sufficient for epoch-scale bookkeeping.
///
/// # Example
///
/// ```rust
/// use weir::current_time_ms;
///
/// let now = current_time_ms();
/// println!("Current timestamp: {} ms", now);
/// ```
#[inline(always)]
pub fn current_time_ms() -> u64 {
    let (start, base_ms) = START_TIME_BASE.get_or_init(|| {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        (Instant::now(), epoch_ms)
    });
    base_ms.saturating_add(start.elapsed().as_millis() as u64)
}

/// Cache-aligned wrapper for values to prevent false sharing.
///
/// The per-epoch byte counter is hammered by the receive-completion
/// handler while the armed flag is read by the tick handler; putting
/// each on its own cache line keeps one handler's writes from
/// invalidating the other's reads.
///
/// ## How It Works
///
/// ```text
///     Without Cache Alignment:
///     ┌─────────────────────────┐
///     │ epoch count │ armed flag │ ← Same cache line
///     └─────────────────────────┘
///     Problem: Every increment invalidates the flag's cache
///
///     With Cache Alignment:
///     ┌─────────────────────────┐
///     │       epoch count        │ ← Own cache line
///     └─────────────────────────┘
///     ┌─────────────────────────┐
///     │       armed flag         │ ← Own cache line
///     └─────────────────────────┘
///     Result: No false sharing!
/// ```
///
#[cfg(target_arch = "x86_64")]
#[repr(C, align(64))]
pub(crate) struct CacheAligned<T>(pub T);
#[cfg(target_arch = "aarch64")]
#[repr(C, align(128))]
pub(crate) struct CacheAligned<T>(pub T);
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[repr(C, align(64))]
pub(crate) struct CacheAligned<T>(pub T);

impl<T> CacheAligned<T> {
    /// Creates a new cache-aligned value.
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        Self(value)
    }

    /// Gets a reference to the inner value.
    #[inline(always)]
    pub fn get(&self) -> &T {
        &self.0
    }
}

impl<T: Default> Default for CacheAligned<T> {
    fn default() -> Self {
        Self(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for CacheAligned<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_line_size() {
        assert!(CACHE_LINE_SIZE >= 32);
        assert!(CACHE_LINE_SIZE <= 256);
        assert!(CACHE_LINE_SIZE.is_power_of_two());
    }

    #[test]
    fn test_time_monotonicity() {
        let mut last_ms = 0;

        for _ in 0..10 {
            let ms = current_time_ms();
            assert!(ms >= last_ms);
            last_ms = ms;

            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }

    #[test]
    fn test_cache_aligned() {
        use std::sync::atomic::AtomicU64;

        let aligned = CacheAligned::new(AtomicU64::new(42));

        // Verify the value is accessible
        assert_eq!(aligned.0.load(std::sync::atomic::Ordering::Relaxed), 42);
    }

    #[test]
    fn test_cache_aligned_alignment() {
        let aligned = CacheAligned::new(0u64);
        let addr = &aligned as *const _ as usize;
        assert_eq!(addr % CACHE_LINE_SIZE, 0);
    }

    #[test]
    fn test_cache_aligned_default() {
        let aligned: CacheAligned<u64> = CacheAligned::default();
        assert_eq!(*aligned.get(), 0);
    }

    #[test]
    fn test_cache_aligned_debug() {
        let aligned = CacheAligned::new(42u64);
        let debug_str = format!("{:?}", aligned);
        assert_eq!(debug_str, "42");
    }
}
