//! # Weir - Inbound Rate Governor for Serial Links
//!
//! A lock-free governor that caps how fast a peer may push bytes into your
//! process over a serial-style link. Think of it as a weir across a stream:
//! water flows freely until the level reaches the crest, then the excess is
//! held back until the next measuring interval.
//!
//! ## What is Inbound Governing?
//!
//! Serial links have no admission control of their own - a fast sender will
//! happily overrun a slow consumer. Inbound governing counts every received
//! byte against a per-epoch budget and uses the link's hardware flow control
//! to pause the sender the moment the budget is spent. When the next epoch
//! begins, the pause is lifted and the count starts over.
//!
//! ## The Epoch Budget Algorithm
//!
//! ```text
//!     Epoch Budget Visualization (500-byte budget):
//!
//!     Tick:       count reset to 0, intake open
//!     Byte 1:     [499 left] ✅ receive re-armed
//!     Byte 2:     [498 left] ✅ receive re-armed
//!     ...
//!     Byte 500:   [0 left]   ⛔ flow control asserted, intake paused
//!     Next tick:  "Bps:  500; Tot:    500" reported, intake resumed
//! ```
//!
//! - **Budget** = Bytes the peer may deliver within one epoch
//! - **Epoch** = Fixed measuring interval, driven by a timer tick
//! - **Flow control** = Hardware signal that tells the peer to stop sending
//!
//! ## Features
//!
//! - 🔒 **Lock-free Handlers** - Completion and tick handlers never block each other
//! - ⚡ **Interrupt-Shaped** - Both handlers run to completion in bounded time
//! - 🚦 **Hardware Flow Control** - Asserts and releases the pause signal at the budget edge
//! - 🌐 **Per-Port Governing** - Different budgets for different serial ports
//! - 📊 **Real-time Metrics** - Monitor throughput, suspensions, and link health
//! - 🛡️ **Thread-Safe** - Safe to share across threads without extra synchronization
//!
//! ## Quick Start
//!
//! ### Basic Governing
//!
//! ```rust
//! use weir::{EpochReporter, MemorySink, RateGovernor, SimLink};
//! use std::sync::Arc;
//!
//! // Create a governor:
//! // - 1-byte transfer unit (one completion per byte)
//! // - 500-byte budget per epoch
//! let governor = Arc::new(RateGovernor::new(1, 500));
//!
//! let link = SimLink::new();
//! governor.start(&link).unwrap();
//!
//! // In the receive path: feed every completion back to the governor
//! while link.try_deliver().is_some() {
//!     governor.on_receive_complete(&link);
//! }
//!
//! // 500 bytes went through, the 501st receive was never armed
//! assert!(link.is_flow_asserted());
//!
//! // In the timer path: drain the epoch and resume intake
//! let mut reporter = EpochReporter::new(governor);
//! let mut sink = MemorySink::new();
//! reporter.on_tick(&link, &mut sink);
//!
//! assert_eq!(sink.last().unwrap().format_line(), "Bps:  500; Tot:    500");
//! assert!(!link.is_flow_asserted());
//! ```
//!
//! ### Advanced Usage with Builder Pattern
//!
//! ```rust
//! use weir::{GovernorBuilder, MemoryOrdering};
//!
//! let governor = GovernorBuilder::new()
//!     .transfer_unit(16)          // Bytes per receive request
//!     .rate_threshold(4096)       // Budget per epoch
//!     .epoch_interval_ms(1000)    // Tick every second
//!     .memory_ordering(MemoryOrdering::AcquireRelease)  // Memory consistency
//!     .build();
//!
//! assert_eq!(governor.rate_threshold(), 4096);
//! ```
//!
//! ### Per-Port Governing
//!
//! ```rust
//! use weir::{GovernorConfig, PortGovernorManager, SimLink};
//!
//! // Create a manager that governs each port independently
//! let config = GovernorConfig::new(1, 500, 1000);  // 500 bytes/second per port
//! let manager = PortGovernorManager::new(config);
//!
//! let link = SimLink::new();
//! manager.attach("ttyS0", &link).unwrap();
//!
//! // In the receive path:
//! if link.try_deliver().is_some() {
//!     manager.on_receive_complete("ttyS0", &link);
//! }
//! ```
//!
//! ## Architecture Overview
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │   Serial Link Driver    │
//!                    └──────────┬──────────────┘
//!                               │ receive completions
//!                    ┌──────────▼──────────────┐      ┌─────────────┐
//!                    │     Governor API        │      │ Epoch Clock │
//!                    ├─────────────────────────┤      └──────┬──────┘
//!                    │  • on_receive_complete()│             │ ticks
//!                    │  • on_tick()            │◄────────────┘
//!                    │  • metrics()            │
//!                    └──────────┬──────────────┘
//!                               │
//!                ┌──────────────┴───────────────┐
//!                │                              │
//!     ┌──────────▼──────────┐       ┌───────────▼──────────┐
//!     │   Rate Governor     │       │   Port Manager       │
//!     ├─────────────────────┤       ├──────────────────────┤
//!     │ • Atomic byte count │       │ • Per-port governors │
//!     │ • Epoch budget      │       │ • Idle reclamation   │
//!     │ • Flow control      │       │ • Bounded table      │
//!     └─────────────────────┘       └──────────────────────┘
//! ```
//!
//! ## Performance Characteristics
//!
//! | Operation | Time Complexity | Space Complexity |
//! |-----------|----------------|------------------|
//! | on_receive_complete() | O(1) | O(1) |
//! | on_tick() | O(1) | O(1) |
//! | metrics() | O(1) | O(1) |
//! | attach/detach | O(1) | O(1) |
//!
//! ## Common Use Cases
//!
//! 1. **Hardware Handshaking** - Drive RTS/CTS from a byte budget instead of buffer depth
//! 2. **Modem and Radio Links** - Keep a slow downstream consumer from being flooded
//! 3. **Telemetry Intake** - Cap per-device inbound rates at a gateway host
//! 4. **Virtual Ports** - Exercise flow-control behavior against a PTY without hardware
//! 5. **Protocol Bridges** - Match a fast producer to a slow drain at a fixed rate
//!
//! ## Thread Safety
//!
//! All types are thread-safe and can be shared across threads:
//! - `RateGovernor` - Safe to share via `Arc<RateGovernor>`
//! - `EpochReporter` - Owns the tick path; one per governor
//! - `PortGovernorManager` - Safe to share via `Arc<PortGovernorManager>`
//!
//! ## Memory Ordering
//!
//! Choose the right memory ordering for your use case:
//! - `Relaxed` - Fastest, use when exact ordering doesn't matter
//! - `AcquireRelease` - Balanced (default), ensures proper synchronization
//! - `Sequential` - Strongest guarantees, use when strict ordering is critical
//!
//! ## Examples
//!
//! See the `demos/` directory for complete examples:
//! - `basic.rs` - Governing a single simulated link
//! - `hard_handshake.rs` - The classic hardware-handshaking loop with reports
//!
//! ## Safety
//!
//! This crate uses `unsafe` code only for the manual `Send`/`Sync`
//! implementations on the governor, whose shared state is entirely atomic.
//! Both impls are documented at the declaration site.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    missing_debug_implementations
)]
#![forbid(unsafe_op_in_unsafe_fn)]

// Internal module
mod governor;

// Public re-exports
pub use governor::{
    current_time_ms, spawn_epoch_clock, spawn_stoppable_epoch_clock, Banner, EpochCounter,
    EpochReport, EpochReporter, GovernorConfig, GovernorMetrics, HardwareFault, LinkDriver,
    LinkHealth, LinkParams, ManagerStats, MemoryOrdering, MemorySink, Parity,
    PortGovernorManager, PortState, RateGovernor, ReportSink, SimLink, TextSink,
};

/// A governor wrapped in `Arc` for convenient thread-safe sharing.
///
/// # Example
/// ```rust
/// use weir::{RateGovernor, SharedGovernor};
/// use std::sync::Arc;
///
/// let governor = RateGovernor::new(1, 500);
/// let shared: SharedGovernor = Arc::new(governor);
///
/// // Now you can clone and share across threads
/// let governor_clone = shared.clone();
/// std::thread::spawn(move || {
///     governor_clone.metrics();
/// });
/// ```
pub type SharedGovernor = std::sync::Arc<RateGovernor>;

/// A port governor manager wrapped in `Arc` for convenient thread-safe sharing.
///
/// This is useful when the receive path and the tick path live on
/// different threads but route through the same port table.
pub type SharedPortManager = std::sync::Arc<PortGovernorManager>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum supported Rust version.
///
/// This crate requires at least Rust 1.70.0 due to:
/// - `std::sync::OnceLock` for the monotonic time base
/// - Stable atomic operations
/// - Edition 2021 features
pub const MSRV: &str = "1.70.0";

/// Prelude module for convenient imports.
///
/// Import everything you need with a single line:
/// ```rust
/// use weir::prelude::*;
/// ```
pub mod prelude {
    //! Common imports for typical governing use cases.
    //!
    //! # Example
    //! ```rust
    //! use weir::prelude::*;
    //!
    //! let governor = RateGovernor::new(1, 500);
    //! let config = GovernorConfig::default();
    //! let health = LinkHealth::Flowing;
    //! ```

    pub use crate::{
        EpochReporter, GovernorConfig, GovernorMetrics, LinkDriver, LinkHealth, ManagerStats,
        MemoryOrdering, MemorySink, PortGovernorManager, RateGovernor, ReportSink,
        SharedGovernor, SharedPortManager, SimLink, TextSink,
    };
}

/// Builder pattern for creating governors with custom configuration.
///
/// The builder pattern provides a fluent API for constructing governors
/// with validated configuration. This is the recommended way to create
/// governors with non-default settings.
///
/// # Example
///
/// ```rust
/// use weir::{GovernorBuilder, MemoryOrdering};
///
/// // Build a governor for 4 KiB per second in 16-byte receives
/// let governor = GovernorBuilder::new()
///     .transfer_unit(16)           // Bytes per receive
///     .rate_threshold(4096)        // Budget per epoch
///     .epoch_interval_ms(1000)     // Every second
///     .memory_ordering(MemoryOrdering::Relaxed)  // Fast mode
///     .build();
///
/// // Or use try_build() for error handling
/// let result = GovernorBuilder::new()
///     .rate_threshold(0)  // Invalid!
///     .try_build();
///
/// assert!(result.is_err());
/// ```
#[derive(Debug, Clone)]
pub struct GovernorBuilder {
    config: GovernorConfig,
}

impl GovernorBuilder {
    /// Creates a new builder with default configuration.
    ///
    /// Default configuration:
    /// - 1-byte transfer unit
    /// - 500-byte budget per epoch
    /// - 1000ms (1 second) epoch interval
    /// - AcquireRelease memory ordering
    pub fn new() -> Self {
        Self {
            config: GovernorConfig::default(),
        }
    }

    /// Sets the number of bytes requested by each receive.
    ///
    /// Completions are counted in whole units, so the epoch total can
    /// overshoot the budget by at most `unit - 1` bytes.
    ///
    /// # Arguments
    ///
    /// * `unit` - Bytes per receive (must be > 0 and no more than the threshold)
    pub fn transfer_unit(mut self, unit: u32) -> Self {
        self.config.transfer_unit = unit;
        self
    }

    /// Sets the byte budget for one epoch.
    ///
    /// This determines the sustained inbound rate. For example, with a
    /// rate_threshold of 500 and epoch_interval_ms of 1000, the peer
    /// can deliver at most ~500 bytes per second.
    ///
    /// # Arguments
    ///
    /// * `bytes` - Budget per epoch (must be > 0)
    pub fn rate_threshold(mut self, bytes: u64) -> Self {
        self.config.rate_threshold = bytes;
        self
    }

    /// Sets the epoch interval in milliseconds.
    ///
    /// How often the epoch counter is drained and intake resumed.
    /// Common values:
    /// - 1000 ms = per second
    /// - 60000 ms = per minute
    /// - 100 ms = 10 times per second
    ///
    /// # Arguments
    ///
    /// * `ms` - Interval between epoch ticks (must be > 0)
    pub fn epoch_interval_ms(mut self, ms: u64) -> Self {
        self.config.epoch_interval_ms = ms;
        self
    }

    /// Sets the memory ordering strategy for atomic operations.
    ///
    /// - `Relaxed`: Fastest but weakest guarantees
    /// - `AcquireRelease`: Balanced performance and correctness (default)
    /// - `Sequential`: Strongest guarantees but slower
    ///
    /// Unless you have specific requirements, use the default.
    pub fn memory_ordering(mut self, ordering: MemoryOrdering) -> Self {
        self.config.ordering = ordering;
        self
    }

    /// Builds the governor with the configured settings.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid:
    /// - `transfer_unit` is 0
    /// - `rate_threshold` is 0
    /// - `epoch_interval_ms` is 0
    /// - `transfer_unit` exceeds `rate_threshold`
    ///
    /// Use `try_build()` if you want to handle errors.
    pub fn build(self) -> RateGovernor {
        RateGovernor::with_config(self.config)
    }

    /// Attempts to build the governor, returning an error if invalid.
    ///
    /// This is the safe version that returns a `Result` instead of panicking.
    ///
    /// # Errors
    ///
    /// Returns an error message if configuration is invalid.
    pub fn try_build(self) -> Result<RateGovernor, &'static str> {
        self.config.validate()?;
        Ok(RateGovernor::with_config(self.config))
    }
}

impl Default for GovernorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_basic_functionality() {
        let governor = RateGovernor::new(1, 10);
        let link = SimLink::new();
        governor.start(&link).unwrap();

        while link.try_deliver().is_some() {
            governor.on_receive_complete(&link);
        }

        assert!(link.is_flow_asserted());

        let metrics = governor.metrics();
        assert_eq!(metrics.total_completions, 10);
        assert_eq!(metrics.total_suspensions, 1);
    }

    #[test]
    fn test_builder() {
        let governor = GovernorBuilder::new()
            .transfer_unit(4)
            .rate_threshold(100)
            .epoch_interval_ms(1000)
            .build();

        assert_eq!(governor.transfer_unit(), 4);
        assert_eq!(governor.rate_threshold(), 100);
    }

    #[test]
    fn test_builder_validation() {
        let result = GovernorBuilder::new().rate_threshold(0).try_build();

        assert!(result.is_err());
    }

    #[test]
    fn test_thread_safety() {
        struct OpenLink;

        impl LinkDriver for OpenLink {
            fn arm_receive(&self, _unit: u32) -> Result<(), HardwareFault> {
                Ok(())
            }

            fn set_flow_control(&self, _asserted: bool) {}
        }

        let governor = Arc::new(RateGovernor::new(1, 1_000_000));
        let link = Arc::new(OpenLink);
        governor.start(&link).unwrap();

        let mut handles = vec![];
        for _ in 0..10 {
            let governor_clone = governor.clone();
            let link_clone = link.clone();
            let handle = thread::spawn(move || {
                for _ in 0..200 {
                    governor_clone.on_receive_complete(&link_clone);
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let metrics = governor.metrics();
        assert_eq!(metrics.total_completions, 2000);
        assert_eq!(metrics.epoch_bytes, 2000);
        assert!(metrics.reception_armed);
    }

    #[test]
    fn test_prelude_imports() {
        // Test that prelude exports work
        use crate::prelude::*;

        let _governor = RateGovernor::new(10, 500);
        let _config = GovernorConfig::default();
        let _ordering = MemoryOrdering::AcquireRelease;
        let _health = LinkHealth::Flowing;
    }

    #[test]
    fn test_shared_types() {
        let governor = RateGovernor::new(1, 500);
        let _shared: SharedGovernor = std::sync::Arc::new(governor);

        let manager = PortGovernorManager::new(GovernorConfig::default());
        let _shared_manager: SharedPortManager = std::sync::Arc::new(manager);
    }

    #[test]
    fn test_constants() {
        assert!(!VERSION.is_empty());
        assert_eq!(MSRV, "1.70.0");
    }

    #[test]
    fn test_builder_default() {
        let builder = GovernorBuilder::default();
        let governor = builder.build();
        assert_eq!(governor.transfer_unit(), 1);
        assert_eq!(governor.rate_threshold(), 500);
    }

    #[test]
    fn test_builder_chain() {
        let governor = GovernorBuilder::new()
            .transfer_unit(8)
            .rate_threshold(800)
            .epoch_interval_ms(500)
            .memory_ordering(MemoryOrdering::Sequential)
            .build();

        assert_eq!(
            governor.epoch_interval(),
            std::time::Duration::from_millis(500)
        );
    }
}
