//! # Governor Module
//!
//! This module provides the internal implementation of the inbound rate
//! governing functionality. It's organized into several submodules, each
//! responsible for a specific aspect of the system.
//!
//! ## Module Structure
//!
//! ```text
//!     governor/
//!     ├── mod.rs          (You are here - Module organization)
//!     ├── clock.rs        (Epoch tick threads)
//!     ├── config.rs       (Configuration and settings)
//!     ├── core.rs         (Completion handler and cutoff decision)
//!     ├── counter.rs      (Shared epoch byte counter)
//!     ├── link.rs         (Link driver trait, faults, simulated link)
//!     ├── manager.rs      (Multi-port governor management)
//!     ├── metrics.rs      (Counter snapshots and link health)
//!     ├── report.rs       (Epoch reports, sinks, startup banner)
//!     ├── reporter.rs     (Epoch tick handler)
//!     └── utils.rs        (Platform-specific helpers)
//! ```
//!
//! ## Architecture Flow
//!
//! ```text
//!     Receive Completion              Epoch Tick
//!           │                             │
//!           ▼                             ▼
//!     ┌──────────┐                 ┌──────────┐
//!     │   Core   │                 │ Reporter │
//!     └────┬─────┘                 └────┬─────┘
//!          │ count & compare            │ sample & report
//!          └─────────┬──────────────────┘
//!                    ▼
//!              ┌──────────┐
//!              │ Counter  │ ◄── shared epoch byte count
//!              └────┬─────┘
//!                   │
//!                   ▼
//!              ┌──────────┐
//!              │   Link   │ ◄── arm receives, flow control
//!              └──────────┘
//! ```
//!
//! ## Component Responsibilities
//!
//! - **clock**: Drives the reporter from a dedicated thread
//! - **config**: Defines how the governor behaves (unit, threshold, epoch)
//! - **core**: Counts completions and pauses intake at the threshold
//! - **counter**: The cache-aligned atomic both handlers share
//! - **link**: The seam to the hardware, plus a simulated link for tests
//! - **manager**: Manages governors for several ports at once
//! - **metrics**: Tracks counters and link health for observability
//! - **report**: Formats and delivers the per-epoch rate line
//! - **reporter**: Drains the epoch counter and resumes paused intake
//! - **utils**: Provides time and cache-alignment helpers

// Declare submodules (internal organization)
mod clock;
mod config;
mod core;
mod counter;
mod link;
mod manager;
mod metrics;
mod report;
mod reporter;
mod utils;

// Re-export public types for external use
// These are the types that users of the library will interact with

/// Epoch clock threads that drive the reporter
pub use clock::{spawn_epoch_clock, spawn_stoppable_epoch_clock};

/// Configuration types for customizing governor behavior
pub use config::{GovernorConfig, MemoryOrdering};

/// Core governor implementing the per-epoch cutoff
pub use self::core::RateGovernor;

/// The shared epoch byte counter
pub use counter::EpochCounter;

/// Link-facing trait, fault type, and the simulated link
pub use link::{HardwareFault, LinkDriver, LinkParams, Parity, SimLink};

/// Multi-port governor management
pub use manager::{ManagerStats, PortGovernorManager, PortState};

/// Metrics and health monitoring for observability
pub use metrics::{GovernorMetrics, LinkHealth};

/// Epoch report records, sinks, and the startup banner
pub use report::{Banner, EpochReport, MemorySink, ReportSink, TextSink};

/// The epoch tick handler
pub use reporter::EpochReporter;

/// Utility functions for time measurement
pub use utils::current_time_ms;
