//! This module provides performance monitoring and link-state analysis
//! for governors. It helps you see how much of each epoch's budget a
//! link is consuming and whether the peer is currently being paused.
//!
//! ## Metrics Overview
//!
//! ```text
//!     Metrics Dashboard:
//!     ┌─────────────────────────────────────┐
//!     │  Budget Used: 85%                   │
//!     │  ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓░░░  (425/500)     │
//!     │                                     │
//!     │  Link: ✅ Flowing                   │
//!     │  Epochs: 42                         │
//!     │  Suspensions: 3                     │
//!     └─────────────────────────────────────┘
//! ```

use std::fmt;

/// Snapshot of a governor's counters and link state.
///
/// This struct provides a point-in-time view of everything the governor
/// tracks, for monitoring, debugging, and tuning the rate threshold.
///
/// ## Key Metrics Explained
///
/// ### Epoch Metrics
/// - **epoch_bytes**: Bytes accepted so far in the current epoch
/// - **last_epoch_bytes**: What the previous epoch's report carried
/// - **rate_threshold**: The configured per-epoch budget
///
/// ### Lifetime Metrics
/// - **total_bytes**: Every byte accepted since start
/// - **total_epochs**: Ticks seen so far
/// - **total_suspensions / total_resumptions**: How often intake was
///   paused and resumed
///
/// ## Example Usage
///
/// ```rust
/// use weir::RateGovernor;
///
/// let governor = RateGovernor::new(1, 500);
/// // ... drive the governor ...
///
/// let metrics = governor.metrics();
///
/// if metrics.is_suspended() {
///     println!("⚠️ Peer is being paused this epoch");
/// }
///
/// // Display comprehensive report
/// println!("{}", metrics.summary());
/// ```
#[derive(Debug, Clone)]
pub struct GovernorMetrics {
    /// Bytes accepted so far in the current (unfinished) epoch.
    pub epoch_bytes: u64,

    /// Bytes the previous epoch ended with (what its report carried).
    pub last_epoch_bytes: u64,

    /// Total bytes accepted since the governor started.
    /// Saturates at `u64::MAX` instead of wrapping.
    pub total_bytes: u64,

    /// Number of epoch ticks processed so far.
    pub total_epochs: u64,

    /// Number of completed transfers the governor has handled.
    pub total_completions: u64,

    /// Number of times intake was suspended at the threshold.
    pub total_suspensions: u64,

    /// Number of times the tick handler resumed a suspended link.
    pub total_resumptions: u64,

    /// Whether a receive is currently armed.
    /// `false` means the governor is withholding intake.
    pub reception_armed: bool,

    /// The configured per-epoch byte budget.
    pub rate_threshold: u64,

    /// The configured bytes per arm request.
    pub transfer_unit: u32,
}

impl GovernorMetrics {
    /// Fraction of the current epoch's budget already spent.
    ///
    /// # Returns
    ///
    /// A value between 0.0 and 1.0, where:
    /// - 0.0 = fresh epoch, nothing received yet
    /// - 0.5 = half the budget used
    /// - 1.0 = budget spent (intake paused until the next tick)
    ///
    /// Overshoot from a coarse transfer unit is clamped to 1.0.
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::RateGovernor;
    ///
    /// let governor = RateGovernor::new(1, 500);
    /// let metrics = governor.metrics();
    /// if metrics.utilization() > 0.9 {
    ///     println!("Epoch budget nearly spent!");
    /// }
    /// ```
    #[inline]
    pub fn utilization(&self) -> f64 {
        if self.rate_threshold == 0 {
            0.0
        } else {
            (self.epoch_bytes as f64 / self.rate_threshold as f64).min(1.0)
        }
    }

    /// Bytes still acceptable this epoch before intake pauses.
    #[inline]
    pub fn budget_remaining(&self) -> u64 {
        self.rate_threshold.saturating_sub(self.epoch_bytes)
    }

    /// Whether the governor is currently withholding intake.
    ///
    /// A suspended link has flow control asserted and nothing armed;
    /// it stays that way until the next epoch tick resumes it.
    #[inline]
    pub fn is_suspended(&self) -> bool {
        !self.reception_armed
    }

    /// Average bytes per completed epoch.
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::RateGovernor;
    ///
    /// let governor = RateGovernor::new(1, 500);
    /// let metrics = governor.metrics();
    /// println!("Average: {:.1} B/epoch", metrics.average_epoch_bytes());
    /// ```
    #[inline]
    pub fn average_epoch_bytes(&self) -> f64 {
        if self.total_epochs == 0 {
            0.0
        } else {
            self.total_bytes as f64 / self.total_epochs as f64
        }
    }

    /// Fraction of epochs that hit the threshold (0.0 to 1.0).
    ///
    /// Values near 1.0 mean the sender is persistently faster than the
    /// budget and spends most of every epoch paused.
    #[inline]
    pub fn suspension_rate(&self) -> f64 {
        if self.total_epochs == 0 {
            0.0
        } else {
            (self.total_suspensions as f64 / self.total_epochs as f64).min(1.0)
        }
    }

    /// Classifies the link's current state.
    ///
    /// - **Flowing**: armed and traffic moving normally
    /// - **Idle**: armed but nothing arriving
    /// - **Throttled**: budget spent, peer is being paused
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::{LinkHealth, RateGovernor};
    ///
    /// let governor = RateGovernor::new(1, 500);
    /// let metrics = governor.metrics();
    /// match metrics.link_health() {
    ///     LinkHealth::Flowing => println!("✅ All good"),
    ///     LinkHealth::Idle => println!("💤 Nothing arriving"),
    ///     LinkHealth::Throttled => println!("⚠️ Peer paused"),
    /// }
    /// ```
    pub fn link_health(&self) -> LinkHealth {
        if self.is_suspended() {
            LinkHealth::Throttled
        } else if self.epoch_bytes == 0 && self.last_epoch_bytes == 0 {
            LinkHealth::Idle
        } else {
            LinkHealth::Flowing
        }
    }

    /// Generates a human-readable summary of the metrics.
    ///
    /// This provides a comprehensive report suitable for logging or display.
    ///
    /// # Example Output
    ///
    /// ```text
    /// RateGovernor Metrics:
    /// ├─ Epoch:
    /// │  ├─ Bytes This Epoch: 425/500
    /// │  ├─ Budget Used: 85.00%
    /// │  └─ Last Epoch: 500 bytes
    /// ├─ Lifetime:
    /// │  ├─ Total Bytes: 12500
    /// │  ├─ Epochs: 25
    /// │  ├─ Completions: 12500
    /// │  ├─ Suspensions: 3
    /// │  └─ Resumptions: 3
    /// └─ Link:
    ///    ├─ Status: Flowing
    ///    ├─ Reception Armed: true
    ///    └─ Average Epoch: 500.0 bytes
    /// ```
    pub fn summary(&self) -> String {
        format!(
            "RateGovernor Metrics:\n\
             ├─ Epoch:\n\
             │  ├─ Bytes This Epoch: {}/{}\n\
             │  ├─ Budget Used: {:.2}%\n\
             │  └─ Last Epoch: {} bytes\n\
             ├─ Lifetime:\n\
             │  ├─ Total Bytes: {}\n\
             │  ├─ Epochs: {}\n\
             │  ├─ Completions: {}\n\
             │  ├─ Suspensions: {}\n\
             │  └─ Resumptions: {}\n\
             └─ Link:\n\
                ├─ Status: {:?}\n\
                ├─ Reception Armed: {}\n\
                └─ Average Epoch: {:.1} bytes",
            self.epoch_bytes,
            self.rate_threshold,
            self.utilization() * 100.0,
            self.last_epoch_bytes,
            self.total_bytes,
            self.total_epochs,
            self.total_completions,
            self.total_suspensions,
            self.total_resumptions,
            self.link_health(),
            self.reception_armed,
            self.average_epoch_bytes()
        )
    }
}

impl fmt::Display for GovernorMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Link-state indicator derived from a metrics snapshot.
///
/// Provides a simple three-level view of what the governed link is
/// doing right now, convenient for dashboards and log lines.
///
/// ## States
///
/// ```text
///     Flowing ──────► Armed, bytes moving within budget
///        │
///     Idle ─────────► Armed, nothing arriving
///        │
///     Throttled ────► Budget spent, peer paused until next tick
/// ```
///
/// ## Example Usage
///
/// ```rust
/// use tracing::debug;
/// use weir::{LinkHealth, RateGovernor};
///
/// let governor = RateGovernor::new(1, 500);
/// // ... drive the governor ...
///
/// let health = governor.metrics().link_health();
///
/// match health {
///     LinkHealth::Flowing | LinkHealth::Idle => {
///         // Normal operation
///     }
///     LinkHealth::Throttled => {
///         debug!("Link throttled: {}", health.describe());
///     }
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkHealth {
    /// Reception armed and traffic moving within the budget.
    Flowing,

    /// Reception armed but no bytes seen this epoch or the last.
    ///
    /// Not an error; the sender simply has nothing to say. Worth a
    /// look if traffic is expected.
    Idle,

    /// The epoch budget is spent and the peer is being paused.
    ///
    /// This is the governor doing its job. Persistent throttling
    /// means the sender is consistently faster than the threshold.
    Throttled,
}

impl LinkHealth {
    /// Returns true while the governor is withholding intake.
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::RateGovernor;
    ///
    /// let governor = RateGovernor::new(1, 500);
    /// let health = governor.metrics().link_health();
    /// assert!(!health.is_throttled());
    /// ```
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled)
    }

    /// Returns a short description of what the state means.
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::RateGovernor;
    ///
    /// let governor = RateGovernor::new(1, 500);
    /// let health = governor.metrics().link_health();
    /// println!("Link state: {}", health.describe());
    /// ```
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Flowing => "Traffic moving within the epoch budget",
            Self::Idle => "Armed but quiet; check the sender if traffic is expected",
            Self::Throttled => "Budget spent; peer paused until the next epoch tick",
        }
    }
}

impl fmt::Display for LinkHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flowing => write!(f, "✅ Flowing"),
            Self::Idle => write!(f, "💤 Idle"),
            Self::Throttled => write!(f, "⚠️ Throttled"),
        }
    }
}
