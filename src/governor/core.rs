//! # Core Rate Governor Implementation
//!
//! This module implements the heart of the inbound governing system: the
//! receive-completion handler and the shared state it coordinates through
//! with the epoch-tick handler. It's designed so the two handlers can run
//! in any contexts that interleave (interrupt-style callbacks, threads, an
//! event loop) without locks.
//!
//! ## The Epoch Budget Algorithm
//!
//! ```text
//!     How Epoch Governing Works:
//!
//!     Epoch start (t=0):
//!     ┌──────────────────┐
//!     │ ░░░░░░░░░░░░░░░░ │ 0/500 bytes, armed
//!     └──────────────────┘
//!
//!     Sender bursts (t=0.3):
//!     ┌──────────────────┐
//!     │ ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓ │ 500/500 bytes, PAUSED
//!     └──────────────────┘   flow control asserted
//!
//!     Tick (t=1.0):
//!     ┌──────────────────┐
//!     │ ░░░░░░░░░░░░░░░░ │ 0/500 bytes, armed again
//!     └──────────────────┘   report emitted: "Bps:  500; ..."
//! ```
//!
//! ## Lock-Free Design
//!
//! The per-epoch count is a single atomic word shared by both handlers.
//! The completion handler's increment and the tick handler's drain are
//! each one read-modify-write, so a byte arriving during the drain lands
//! in exactly one epoch.
//!
//! ```text
//!     Handler Coordination:
//!
//!     Completion ──┐
//!     Completion ──┼──► EpochCounter ◄── sample_and_reset ── Tick
//!     Completion ──┘         │
//!                            ▼
//!                      armed flag (AtomicBool)
//!     written on suspension ─┘ └─ read on tick for resumption
//! ```
//!
//! ## Performance Notes
//!
//! 1. **Cache Alignment**: counter and flag live on separate cache lines
//! 2. **No Retry Loops**: the hot path is one fetch-add plus a compare
//! 3. **Throttled Timestamps**: idle tracking updates at most every 100ms

use super::{
    config::{GovernorConfig, MemoryOrdering},
    counter::EpochCounter,
    link::{HardwareFault, LinkDriver},
    metrics::GovernorMetrics,
    utils::{current_time_ms, CacheAligned},
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Minimum interval between last_event timestamp updates (milliseconds).
///
/// We don't update the last event time on every completion to reduce
/// contention on the atomic variable. 100ms granularity is sufficient
/// for idle-port detection.
const LAST_EVENT_UPDATE_INTERVAL_MS: u64 = 100;

/// Inbound rate governor for one serial link.
///
/// Reacts to receive-completion events: counts the bytes of each epoch,
/// re-arms the receiver while the epoch budget lasts, and pauses the
/// peer with hardware flow control once the budget is spent. The paired
/// [`EpochReporter`](crate::EpochReporter) drains the count every tick
/// and resumes a paused link.
///
/// The governor never invokes the reporter (or vice versa); the two
/// communicate only through the epoch counter and the armed flag.
///
/// ## Internal Structure
///
/// The struct is laid out to optimize CPU cache usage:
/// - Hot path fields (touched per completion) are cache-aligned
/// - Cold path fields (configuration, lifetime counters) are grouped
///   separately
///
/// ## Thread Safety
///
/// All shared state is atomic. The completion handler and the tick
/// handler may interleave arbitrarily without data races.
///
/// ## Example
///
/// ```rust
/// use weir::{RateGovernor, SimLink};
///
/// let governor = RateGovernor::new(1, 500);
/// let link = SimLink::new();
///
/// governor.start(&link).unwrap();
///
/// // Play the sending peer: every delivered unit comes back
/// // as a completion event
/// while link.try_deliver().is_some() {
///     governor.on_receive_complete(&link);
/// }
///
/// // The epoch budget is spent and the peer is paused
/// assert!(!governor.is_armed());
/// assert!(link.is_flow_asserted());
/// assert_eq!(link.delivered_bytes(), 500);
/// ```
#[repr(C)]
pub struct RateGovernor {
    // Hot path fields - accessed on every completion
    // These are cache-aligned to prevent false sharing between CPU cores
    /// Bytes received in the current epoch (owns its own cache line)
    pub(crate) epoch_bytes: EpochCounter,

    /// Whether a receive is currently armed (cache-aligned)
    /// Written here on suspension, written by the reporter on resumption
    pub(crate) armed: CacheAligned<AtomicBool>,

    /// Timestamp of last completion in milliseconds (cache-aligned)
    /// Used for cleanup of idle governors
    pub(crate) last_event_ms: CacheAligned<AtomicU64>,

    // Configuration fields (cold path - read-only after construction)
    /// Bytes per arm request
    pub(crate) transfer_unit: u32,

    /// Byte budget per epoch
    pub(crate) rate_threshold: u64,

    /// Milliseconds between epoch ticks
    pub(crate) epoch_interval_ms: u64,

    /// Memory ordering strategy for atomic operations
    pub(crate) ordering: MemoryOrdering,

    // Accumulated state (cold path - written once per epoch or rarely)
    /// Running byte total; written only by the tick handler, saturating
    pub(crate) total_bytes: AtomicU64,

    /// Number of ticks processed; written only by the tick handler
    pub(crate) total_epochs: AtomicU64,

    /// What the previous epoch's report carried
    pub(crate) last_epoch_bytes: AtomicU64,

    /// Number of times the tick handler resumed a paused link
    pub(crate) total_resumptions: AtomicU64,

    // Metrics fields (cold path - accessed for monitoring)
    /// Total completed transfers handled
    total_completions: AtomicU64,

    /// Total times intake was suspended at the threshold
    total_suspensions: AtomicU64,
}

impl RateGovernor {
    /// Creates a new governor with default epoch timing.
    ///
    /// This is the simplest way to create a governor when the default
    /// one-second epoch is what you want.
    ///
    /// # Arguments
    ///
    /// * `transfer_unit` - Bytes per arm request
    /// * `rate_threshold` - Byte budget per epoch
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::RateGovernor;
    ///
    /// // Accept at most 500 bytes per second, one byte at a time
    /// let governor = RateGovernor::new(1, 500);
    /// ```
    #[inline]
    pub fn new(transfer_unit: u32, rate_threshold: u64) -> Self {
        Self::with_config(GovernorConfig {
            transfer_unit,
            rate_threshold,
            ..Default::default()
        })
    }

    /// Creates a new governor with custom configuration.
    ///
    /// Use this when you need control over the epoch interval or the
    /// memory ordering.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid (see `GovernorConfig::validate`).
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::{GovernorConfig, RateGovernor};
    ///
    /// let config = GovernorConfig::bytes_per_minute(30_000);
    /// let governor = RateGovernor::with_config(config);
    /// ```
    pub fn with_config(config: GovernorConfig) -> Self {
        config.validate().expect("Invalid governor configuration");

        let now_ms = current_time_ms();

        Self {
            epoch_bytes: EpochCounter::new(config.ordering),
            armed: CacheAligned::new(AtomicBool::new(false)),
            last_event_ms: CacheAligned::new(AtomicU64::new(now_ms)),
            transfer_unit: config.transfer_unit,
            rate_threshold: config.rate_threshold,
            epoch_interval_ms: config.epoch_interval_ms,
            ordering: config.ordering,
            total_bytes: AtomicU64::new(0),
            total_epochs: AtomicU64::new(0),
            last_epoch_bytes: AtomicU64::new(0),
            total_resumptions: AtomicU64::new(0),
            total_completions: AtomicU64::new(0),
            total_suspensions: AtomicU64::new(0),
        }
    }

    /// Opens the intake: releases flow control and arms the first unit.
    ///
    /// Call once before driving completion and tick events. A link that
    /// refuses this first arm is misconfigured, and the error surfaces
    /// here rather than inside an event handler.
    ///
    /// # Errors
    ///
    /// Propagates the [`HardwareFault`] from the link. The governor is
    /// left unarmed; fix the link and call `start` again.
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::{RateGovernor, SimLink};
    ///
    /// let governor = RateGovernor::new(1, 500);
    /// let link = SimLink::new();
    ///
    /// governor.start(&link).unwrap();
    /// assert!(governor.is_armed());
    /// ```
    pub fn start<L: LinkDriver>(&self, link: &L) -> Result<(), HardwareFault> {
        link.set_flow_control(false);
        link.arm_receive(self.transfer_unit)?;
        self.armed.0.store(true, self.ordering.store());

        debug!(
            "Governor started: unit={} threshold={} interval={}ms",
            self.transfer_unit, self.rate_threshold, self.epoch_interval_ms
        );
        Ok(())
    }

    /// Handles one receive-completion event.
    ///
    /// The link calls this every time an armed transfer finishes. The
    /// handler runs to completion without blocking.
    ///
    /// ## How it Works
    ///
    /// ```text
    ///     on_receive_complete() flow:
    ///
    ///     count += unit ──► count < threshold? ──Yes──► re-arm unit
    ///          │                                         (armed stays true)
    ///          │                No
    ///          │                ▼
    ///          └────► assert flow control ──► armed = false
    ///                        (paused until the next epoch tick)
    /// ```
    ///
    /// The cutoff runs after the completed transfer is counted, so with
    /// a transfer unit that does not divide the threshold the epoch can
    /// overshoot by up to `transfer_unit - 1` bytes. That slack is part
    /// of the contract, not an error.
    ///
    /// ## Panics
    ///
    /// Panics if the link refuses the re-arm. A completion means the
    /// receive slot just freed up, so a refusal here is a driver bug;
    /// continuing would leave the armed flag lying about the hardware
    /// state.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use weir::{RateGovernor, SimLink};
    ///
    /// let governor = RateGovernor::new(1, 500);
    /// let link = SimLink::new();
    /// governor.start(&link).unwrap();
    ///
    /// if link.try_deliver().is_some() {
    ///     governor.on_receive_complete(&link);
    /// }
    /// assert_eq!(governor.metrics().epoch_bytes, 1);
    /// ```
    #[inline(always)]
    pub fn on_receive_complete<L: LinkDriver>(&self, link: &L) {
        let now_ms = current_time_ms();

        // Optimization: Only update last_event periodically to reduce contention
        // This atomic variable is used for cleanup detection, not the cutoff
        let last = self.last_event_ms.0.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) > LAST_EVENT_UPDATE_INTERVAL_MS {
            self.last_event_ms.0.store(now_ms, Ordering::Relaxed);
        }

        self.total_completions.fetch_add(1, self.ordering.rmw());

        let count = self.epoch_bytes.increment(self.transfer_unit as u64);

        if count < self.rate_threshold {
            // Budget left: keep the stream coming
            link.arm_receive(self.transfer_unit)
                .expect("re-arm refused after completion; receive slot must be free");
        } else {
            // Budget spent: pause the peer until the next epoch tick.
            // Flow control first, flag second: a tick racing this path
            // sees armed=true and delays resumption one epoch, which
            // is harmless; the reverse order could resume intake and
            // then assert flow against an armed receive.
            link.set_flow_control(true);
            self.armed.0.store(false, self.ordering.store());
            self.total_suspensions.fetch_add(1, self.ordering.rmw());

            debug!("Epoch budget reached at {} bytes; intake paused", count);
        }
    }

    /// Whether a receive is currently armed.
    ///
    /// `false` means the governor has suspended intake and the next
    /// epoch tick will resume it.
    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed.0.load(self.ordering.load())
    }

    /// The configured bytes per arm request.
    #[inline]
    pub fn transfer_unit(&self) -> u32 {
        self.transfer_unit
    }

    /// The configured byte budget per epoch.
    #[inline]
    pub fn rate_threshold(&self) -> u64 {
        self.rate_threshold
    }

    /// The configured epoch tick interval.
    ///
    /// Clock implementations (see
    /// [`spawn_epoch_clock`](crate::spawn_epoch_clock)) read their
    /// cadence from here.
    #[inline]
    pub fn epoch_interval(&self) -> Duration {
        Duration::from_millis(self.epoch_interval_ms)
    }

    /// Checks if the governor has seen no completions for a duration.
    ///
    /// This is useful for cleanup operations to identify and detach
    /// ports that haven't carried traffic recently.
    ///
    /// # Arguments
    ///
    /// * `inactive_duration_ms` - Milliseconds of inactivity to check for
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::RateGovernor;
    ///
    /// let governor = RateGovernor::new(1, 500);
    ///
    /// // Check if quiet for more than 5 minutes
    /// if governor.is_inactive(5 * 60 * 1000) {
    ///     println!("Port has been quiet");
    /// }
    /// ```
    #[inline]
    pub fn is_inactive(&self, inactive_duration_ms: u64) -> bool {
        let now_ms = current_time_ms();
        let last_ms = self.last_event_ms.0.load(self.ordering.load());
        now_ms.saturating_sub(last_ms) > inactive_duration_ms
    }

    /// Returns a snapshot of the governor's counters and link state.
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::RateGovernor;
    ///
    /// let governor = RateGovernor::new(1, 500);
    /// // ... drive the governor ...
    ///
    /// let metrics = governor.metrics();
    /// println!("Budget used: {:.0}%", metrics.utilization() * 100.0);
    /// println!("Total: {} bytes over {} epochs", metrics.total_bytes, metrics.total_epochs);
    /// ```
    pub fn metrics(&self) -> GovernorMetrics {
        // Use consistent ordering for all reads to get a coherent snapshot
        let ordering = self.ordering.load();
        GovernorMetrics {
            epoch_bytes: self.epoch_bytes.current(),
            last_epoch_bytes: self.last_epoch_bytes.load(ordering),
            total_bytes: self.total_bytes.load(ordering),
            total_epochs: self.total_epochs.load(ordering),
            total_completions: self.total_completions.load(ordering),
            total_suspensions: self.total_suspensions.load(ordering),
            total_resumptions: self.total_resumptions.load(ordering),
            reception_armed: self.armed.0.load(ordering),
            rate_threshold: self.rate_threshold,
            transfer_unit: self.transfer_unit,
        }
    }

    /// Resets the counters and metrics to their initial state.
    ///
    /// This operation:
    /// - Discards any bytes counted in the current epoch
    /// - Zeroes the running total and all lifetime counters
    ///
    /// It does NOT touch the armed flag, the flow-control line, or any
    /// outstanding receive; link state belongs to the handlers.
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::RateGovernor;
    ///
    /// let governor = RateGovernor::new(1, 500);
    /// // ... heavy usage ...
    ///
    /// governor.reset();
    /// assert_eq!(governor.metrics().total_bytes, 0);
    /// ```
    pub fn reset(&self) {
        let now_ms = current_time_ms();

        self.epoch_bytes.sample_and_reset();
        self.last_event_ms.0.store(now_ms, Ordering::Relaxed);
        self.total_bytes.store(0, self.ordering.store());
        self.total_epochs.store(0, self.ordering.store());
        self.last_epoch_bytes.store(0, self.ordering.store());
        self.total_resumptions.store(0, self.ordering.store());
        self.total_completions.store(0, self.ordering.store());
        self.total_suspensions.store(0, self.ordering.store());
    }
}

impl std::fmt::Debug for RateGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGovernor")
            .field("transfer_unit", &self.transfer_unit)
            .field("rate_threshold", &self.rate_threshold)
            .field("epoch_interval_ms", &self.epoch_interval_ms)
            .field("epoch_bytes", &self.epoch_bytes.current())
            .field("armed", &self.is_armed())
            .finish()
    }
}

// Safety: RateGovernor can be safely shared between threads
// All shared state uses atomic instructions with proper memory ordering
unsafe impl Send for RateGovernor {}
unsafe impl Sync for RateGovernor {}
