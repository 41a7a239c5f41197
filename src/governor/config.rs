//! # Governor Configuration
//!
//! This module provides configuration structures and enums for customizing governor behavior.
//! Think of this as the "settings panel" for an inbound link governor.
//!
//! ## Key Concepts
//!
//! ### Epoch Budget Parameters
//!
//! ```text
//!     Epoch Budget Configuration:
//!
//!     ┌──────────────────────────────┐
//!     │   Rate Threshold (bytes)     │ ← Intake budget per epoch
//!     │   ┌─────────────────────┐    │
//!     │   │ ▒▒▒▒▒▒▒▒▒▒░░░░░░░░ │    │ ← Bytes received so far
//!     │   └─────────────────────┘    │
//!     │                              │
//!     │   Transfer Unit: 1 byte      │ ← Bytes per arm request
//!     │   Epoch Interval: 1000ms     │ ← How often the count resets
//!     └──────────────────────────────┘
//! ```
//!
//! ### Memory Ordering
//!
//! Memory ordering controls how atomic operations synchronize between threads:
//!
//! ```text
//!     Relaxed ──────► Fast but minimal guarantees
//!        │
//!     AcquireRelease ► Balanced (recommended)
//!        │
//!     Sequential ───► Slow but strongest guarantees
//! ```

use std::sync::atomic::Ordering;

/// Memory ordering strategy for atomic operations.
///
/// This controls the synchronization guarantees between the
/// receive-completion handler and the epoch-tick handler.
/// Choose based on your performance vs correctness requirements.
///
/// ## Quick Guide
///
/// - Use `Relaxed` when you need maximum speed and don't care about exact ordering
/// - Use `AcquireRelease` (default) for most use cases - good balance
/// - Use `Sequential` when you need strict ordering guarantees (e.g., for debugging)
///
/// ## Example
///
/// ```rust
/// use weir::{GovernorConfig, MemoryOrdering};
///
/// // For high-throughput links where report timing jitter doesn't matter
/// let fast_config = GovernorConfig::new(1, 500, 1000)
///     .with_ordering(MemoryOrdering::Relaxed);
///
/// // For normal use (default)
/// let balanced_config = GovernorConfig::new(1, 500, 1000)
///     .with_ordering(MemoryOrdering::AcquireRelease);
///
/// // For scenarios requiring strict ordering
/// let strict_config = GovernorConfig::new(1, 500, 1000)
///     .with_ordering(MemoryOrdering::Sequential);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOrdering {
    /// Relaxed ordering - fastest but provides minimal guarantees.
    ///
    /// Use when:
    /// - You need maximum performance
    /// - A report attributing a byte to a neighboring epoch is acceptable
    /// - You're OK with some operations appearing out of order
    Relaxed,

    /// Acquire-Release ordering - balanced performance and correctness.
    ///
    /// Use when:
    /// - You want good performance with reasonable guarantees (default)
    /// - You need synchronization between the two handlers
    /// - This is the recommended setting for most applications
    AcquireRelease,

    /// Sequential consistency - strongest guarantees but slower.
    ///
    /// Use when:
    /// - You need strict ordering guarantees
    /// - You're debugging synchronization issues
    /// - Correctness is more important than performance
    Sequential,
}

impl MemoryOrdering {
    /// Returns the appropriate `Ordering` for load (read) operations.
    ///
    /// Used when reading the armed flag and the counters.
    #[inline(always)]
    pub(crate) fn load(&self) -> Ordering {
        match self {
            Self::Relaxed => Ordering::Relaxed,
            Self::AcquireRelease => Ordering::Acquire,
            Self::Sequential => Ordering::SeqCst,
        }
    }

    /// Returns the appropriate `Ordering` for store (write) operations.
    ///
    /// Used when flipping the armed flag.
    #[inline(always)]
    pub(crate) fn store(&self) -> Ordering {
        match self {
            Self::Relaxed => Ordering::Relaxed,
            Self::AcquireRelease => Ordering::Release,
            Self::Sequential => Ordering::SeqCst,
        }
    }

    /// Returns the appropriate `Ordering` for read-modify-write operations.
    ///
    /// Used for the epoch counter's increment and sample-and-reset.
    #[inline(always)]
    pub(crate) fn rmw(&self) -> Ordering {
        match self {
            Self::Relaxed => Ordering::Relaxed,
            Self::AcquireRelease => Ordering::AcqRel,
            Self::Sequential => Ordering::SeqCst,
        }
    }
}

impl Default for MemoryOrdering {
    /// Returns the default memory ordering (AcquireRelease).
    ///
    /// This provides a good balance between performance and correctness.
    fn default() -> Self {
        Self::AcquireRelease
    }
}

/// Configuration for governor instances.
///
/// This struct defines all the parameters that control how a governor behaves.
/// You can create configurations manually or use the convenient factory methods.
///
/// The defaults reproduce the classic hardware-handshake reference setup:
/// single-byte transfers, a 500-byte budget, one-second epochs.
///
/// ## Epoch Budget Model
///
/// ```text
///     Configuration Example:
///     ┌────────────────────────────────────┐
///     │ transfer_unit: 1                   │
///     │ rate_threshold: 500                │
///     │ epoch_interval_ms: 1000            │
///     │                                    │
///     │ Result: intake pauses at 500 B     │
///     │         and resumes every second   │
///     └────────────────────────────────────┘
/// ```
///
/// ## Examples
///
/// ```rust
/// use weir::GovernorConfig;
///
/// // Simple per-second byte budget
/// let config = GovernorConfig::bytes_per_second(500);  // 500 B/sec
///
/// // Per-minute byte budget
/// let config = GovernorConfig::bytes_per_minute(30_000);  // 30 kB/min
///
/// // Custom configuration
/// let config = GovernorConfig::new(
///     16,     // bytes per arm request
///     4096,   // byte budget per epoch
///     250     // epoch every 250ms
/// );
///
/// // With a larger transfer unit
/// let config = GovernorConfig::bytes_per_second(500)
///     .with_transfer_unit(8);  // Arm 8 bytes at a time
/// ```
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Number of bytes requested by each arm of the receiver.
    ///
    /// The link delivers exactly this many bytes per completion event,
    /// so the epoch count always advances in `transfer_unit` steps.
    /// The reference setup uses 1 (byte-at-a-time reception).
    pub transfer_unit: u32,

    /// Maximum bytes accepted within one epoch before intake pauses.
    ///
    /// Once the epoch count reaches this value the governor stops
    /// re-arming the receiver and asserts flow control until the next
    /// epoch tick. When `transfer_unit` does not divide this evenly,
    /// the final transfer may overshoot by up to `transfer_unit - 1`
    /// bytes; see [`max_epoch_bytes`](Self::max_epoch_bytes).
    pub rate_threshold: u64,

    /// Interval between epoch ticks in milliseconds.
    ///
    /// How often the epoch count is sampled, reported, and reset.
    /// Common values:
    /// - 1000 ms (1 second) for the classic Bps report
    /// - 100 ms for fine-grained throttling
    pub epoch_interval_ms: u64,

    /// Memory ordering strategy for atomic operations.
    ///
    /// Controls the synchronization guarantees. Default is AcquireRelease
    /// which provides good balance. Only change if you have specific needs.
    pub ordering: MemoryOrdering,
}

impl Default for GovernorConfig {
    /// Creates a default configuration.
    ///
    /// Default values:
    /// - 1 byte transfer unit
    /// - 500 bytes rate threshold
    /// - 1000ms (1 second) epoch interval
    /// - AcquireRelease memory ordering
    ///
    /// This reproduces the reference setup: 500 B/s with per-byte arming.
    fn default() -> Self {
        Self {
            transfer_unit: 1,
            rate_threshold: 500,
            epoch_interval_ms: 1000,
            ordering: MemoryOrdering::AcquireRelease,
        }
    }
}

impl GovernorConfig {
    /// Creates a new configuration with specified parameters.
    ///
    /// # Arguments
    ///
    /// * `transfer_unit` - Bytes per arm request
    /// * `rate_threshold` - Byte budget per epoch
    /// * `epoch_interval_ms` - Milliseconds between epoch ticks
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::GovernorConfig;
    ///
    /// // 4 KiB/second accepted in 64-byte chunks
    /// let config = GovernorConfig::new(64, 4096, 1000);
    /// ```
    pub fn new(transfer_unit: u32, rate_threshold: u64, epoch_interval_ms: u64) -> Self {
        Self {
            transfer_unit,
            rate_threshold,
            epoch_interval_ms,
            ordering: MemoryOrdering::default(),
        }
    }

    /// Creates a configuration with a per-second byte budget.
    ///
    /// Convenience method that sets up governing by bytes per second
    /// with single-byte transfers.
    ///
    /// # Arguments
    ///
    /// * `bytes_per_second` - Maximum sustained bytes per second
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::GovernorConfig;
    ///
    /// // Accept at most 500 bytes each second
    /// let config = GovernorConfig::bytes_per_second(500);
    /// ```
    pub fn bytes_per_second(bytes_per_second: u64) -> Self {
        Self {
            transfer_unit: 1,
            rate_threshold: bytes_per_second,
            epoch_interval_ms: 1000,
            ordering: MemoryOrdering::default(),
        }
    }

    /// Creates a configuration with a per-minute byte budget.
    ///
    /// Convenience method for links metered by the minute.
    ///
    /// # Arguments
    ///
    /// * `bytes_per_minute` - Maximum bytes per minute
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::GovernorConfig;
    ///
    /// // Allow 30 kB every minute
    /// let config = GovernorConfig::bytes_per_minute(30_000);
    /// ```
    pub fn bytes_per_minute(bytes_per_minute: u64) -> Self {
        Self {
            transfer_unit: 1,
            rate_threshold: bytes_per_minute,
            epoch_interval_ms: 60_000,
            ordering: MemoryOrdering::default(),
        }
    }

    /// Sets the memory ordering strategy.
    ///
    /// Builder method to customize memory ordering if needed.
    /// Most applications should use the default (AcquireRelease).
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::{GovernorConfig, MemoryOrdering};
    ///
    /// let config = GovernorConfig::bytes_per_second(500)
    ///     .with_ordering(MemoryOrdering::Relaxed);  // Maximum speed
    /// ```
    pub fn with_ordering(mut self, ordering: MemoryOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Sets the number of bytes armed per receive request.
    ///
    /// Larger units amortize per-completion overhead at the cost of a
    /// coarser cutoff: the epoch total may overshoot the threshold by
    /// up to `transfer_unit - 1` bytes.
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::GovernorConfig;
    ///
    /// // 500 B/sec budget, armed 8 bytes at a time
    /// let config = GovernorConfig::bytes_per_second(500)
    ///     .with_transfer_unit(8);
    /// ```
    pub fn with_transfer_unit(mut self, transfer_unit: u32) -> Self {
        self.transfer_unit = transfer_unit;
        self
    }

    /// Validates the configuration for correctness.
    ///
    /// Checks that all parameters are valid and consistent.
    /// This is automatically called when creating a governor.
    ///
    /// # Errors
    ///
    /// Returns an error message if:
    /// - `transfer_unit` is 0
    /// - `rate_threshold` is 0
    /// - `epoch_interval_ms` is 0
    /// - `transfer_unit` exceeds `rate_threshold`
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::GovernorConfig;
    ///
    /// let config = GovernorConfig::new(0, 500, 1000);  // Invalid!
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.transfer_unit == 0 {
            return Err("transfer_unit must be greater than 0");
        }

        if self.rate_threshold == 0 {
            return Err("rate_threshold must be greater than 0");
        }

        if self.epoch_interval_ms == 0 {
            return Err("epoch_interval_ms must be greater than 0");
        }

        // A single completion must never blow the whole budget
        if self.transfer_unit as u64 > self.rate_threshold {
            return Err("transfer_unit should not exceed rate_threshold");
        }

        Ok(())
    }

    /// Returns the effective byte budget per second.
    ///
    /// Calculates the sustained intake rate from the threshold and the
    /// epoch interval. Useful for displaying the configured rate.
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::GovernorConfig;
    ///
    /// let config = GovernorConfig::new(1, 250, 500);  // 250 bytes per 500ms
    /// assert_eq!(config.effective_rate_per_second(), 500.0);  // 500 B/sec
    /// ```
    pub fn effective_rate_per_second(&self) -> f64 {
        if self.epoch_interval_ms == 0 {
            0.0
        } else {
            (self.rate_threshold as f64 * 1000.0) / self.epoch_interval_ms as f64
        }
    }

    /// Returns the worst-case bytes accepted in one epoch.
    ///
    /// The cutoff check runs after each completed transfer, so when
    /// `transfer_unit` does not divide `rate_threshold` the last
    /// transfer before the pause may carry the count past the
    /// threshold. The bound is `rate_threshold + transfer_unit - 1`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::GovernorConfig;
    ///
    /// let config = GovernorConfig::new(7, 500, 1000);
    /// assert_eq!(config.max_epoch_bytes(), 506);
    /// ```
    pub fn max_epoch_bytes(&self) -> u64 {
        self.rate_threshold
            .saturating_add(self.transfer_unit as u64 - 1)
    }
}
